use eframe::egui::Vec2;

use super::engine::SubgraphEngine;
use super::state::{StateUpdate, ViewState};

/// What the pointer is over: a rendered subgraph node or one of the member
/// circles inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeTarget<'a> {
    Node(&'a str),
    Member(&'a str),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub pos: Vec2,
    pub primary_down: bool,
    /// Ctrl on most platforms, Cmd on macOS.
    pub command: bool,
}

/// Tooltip content for a hovered node.
#[derive(Clone, Debug, PartialEq)]
pub struct TooltipInfo {
    pub node_id: String,
    pub label: String,
    pub layer: String,
    pub ctx_index: f64,
}

pub trait TooltipHost {
    fn show_tooltip(&mut self, pointer: Vec2, info: &TooltipInfo);
    fn hide_tooltip(&mut self);
}

struct Resolved {
    node_id: String,
    feature_id: String,
    ctx_index: i64,
    tooltip: TooltipInfo,
}

impl SubgraphEngine {
    fn resolve(&self, target: NodeTarget<'_>) -> Option<Resolved> {
        match target {
            NodeTarget::Node(id) => {
                let node = self.reduced().node(id)?;
                Some(Resolved {
                    node_id: node.node_id.clone(),
                    feature_id: node.feature_id.clone(),
                    ctx_index: node.ctx_index.round() as i64,
                    tooltip: TooltipInfo {
                        node_id: node.node_id.clone(),
                        label: node.label.clone(),
                        layer: node.layer.clone(),
                        ctx_index: node.ctx_index,
                    },
                })
            }
            NodeTarget::Member(id) => {
                let member = self.reduced().member(id)?;
                let node = &self.graph().nodes[member.graph_index];
                Some(Resolved {
                    node_id: member.node_id.clone(),
                    feature_id: member.feature_id.clone(),
                    ctx_index: node.ctx_index,
                    tooltip: TooltipInfo {
                        node_id: member.node_id.clone(),
                        label: member.display_label.clone(),
                        layer: node.layer.clone(),
                        ctx_index: node.ctx_index as f64,
                    },
                })
            }
        }
    }

    pub fn hover_enter(
        &self,
        state: &mut ViewState,
        target: NodeTarget<'_>,
        pointer: PointerState,
        tooltip: &mut impl TooltipHost,
    ) {
        if pointer.primary_down || pointer.command || state.subgraph.active_grouping.is_active {
            return;
        }
        let Some(resolved) = self.resolve(target) else {
            return;
        };

        if state.hovered_id.as_deref() != Some(resolved.feature_id.as_str())
            || state.hovered_ctx_idx != Some(resolved.ctx_index)
        {
            state.apply(StateUpdate::Hovered {
                feature_id: Some(resolved.feature_id),
                ctx_idx: Some(resolved.ctx_index),
            });
        }
        tooltip.show_tooltip(pointer.pos, &resolved.tooltip);
    }

    pub fn hover_leave(
        &self,
        state: &mut ViewState,
        pointer: PointerState,
        tooltip: &mut impl TooltipHost,
    ) {
        if pointer.primary_down {
            return;
        }
        if state.hovered_id.is_some() || state.hovered_ctx_idx.is_some() {
            state.apply(StateUpdate::Hovered {
                feature_id: None,
                ctx_idx: None,
            });
        }
        tooltip.hide_tooltip();
    }

    /// Grouping mode swallows node clicks into the pending selection, a member
    /// circle selecting the node that owns it. Otherwise
    /// the command modifier toggles the pin and a plain click toggles the
    /// clicked selection.
    pub fn click(&self, state: &mut ViewState, target: NodeTarget<'_>, pointer: PointerState) {
        if state.subgraph.active_grouping.is_active {
            let owner = match target {
                NodeTarget::Node(id) => self.reduced().node(id).map(|node| node.node_id.as_str()),
                NodeTarget::Member(id) => self.reduced().owner_of(id),
            };
            if let Some(id) = owner {
                state.update_subgraph(|subgraph| subgraph.active_grouping.toggle(id));
            }
            return;
        }

        let Some(resolved) = self.resolve(target) else {
            return;
        };

        if pointer.command {
            let is_supernode = matches!(target, NodeTarget::Node(id)
                if self.reduced().node(id).is_some_and(|node| node.is_supernode()));
            if is_supernode {
                tracing::debug!(node_id = %resolved.node_id, "supernodes cannot be pinned");
                return;
            }
            state.toggle_pin(&resolved.node_id);
            return;
        }

        let update = if state.clicked_id.as_deref() == Some(resolved.node_id.as_str()) {
            StateUpdate::Clicked {
                node_id: None,
                ctx_idx: None,
            }
        } else {
            StateUpdate::Clicked {
                node_id: Some(resolved.node_id),
                ctx_idx: Some(resolved.ctx_index),
            }
        };
        state.apply(update);
    }

    pub fn drag_start(&mut self, node_id: &str) {
        if self.simulation().and_then(|sim| sim.node(node_id)).is_some() {
            self.dragging = Some(node_id.to_owned());
        }
    }

    /// Moves the dragged node with the pointer and holds the simulation warm
    /// so neighbours follow.
    pub fn drag_move(&mut self, node_id: &str, pos: Vec2) {
        self.dragging = Some(node_id.to_owned());
        let Some(simulation) = self.simulation_mut() else {
            return;
        };
        let Some(node) = simulation.node_mut(node_id) else {
            return;
        };

        node.dagre_positioned = false;
        node.anchor(pos);
        simulation.reheat();
    }

    pub fn drag_end(&mut self, state: &ViewState, node_id: &str) {
        self.dragging = None;
        let Some(simulation) = self.simulation_mut() else {
            return;
        };
        simulation.set_alpha_target(0.0);
        if let Some(node) = simulation.node_mut(node_id)
            && !state.subgraph.sticky
            && !node.dagre_positioned
        {
            node.release();
        }
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }
}
