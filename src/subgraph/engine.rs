use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::vec2;

use crate::graph::AttributionGraph;
use crate::layout::{
    LayoutLink, LayoutNode, Simulation, SimulationConfig, SimulationStatus, Viewport,
};

use super::grouping::{self, GroupingOutcome};
use super::positions::{export_positions, parse_positions};
use super::reduce::{ReducedGraph, reduce};
use super::state::{StateUpdate, SupernodeGroup, ViewState};

/// Inputs whose change forces a full rebuild of the reduced graph and
/// simulation.
#[derive(Clone, Debug, PartialEq)]
struct RebuildKey {
    pinned_ids: Vec<String>,
    supernodes: Vec<SupernodeGroup>,
    sticky: bool,
    dagrefy: bool,
    hide_layer: bool,
    viewport: Viewport,
}

impl RebuildKey {
    fn from_state(state: &ViewState, viewport: Viewport) -> Self {
        Self {
            pinned_ids: state.effective_pinned_ids().to_vec(),
            supernodes: state.subgraph.supernodes.clone(),
            sticky: state.subgraph.sticky,
            dagrefy: state.subgraph.dagrefy,
            hide_layer: state.is_hide_layer,
            viewport,
        }
    }
}

/// Owns the reduced graph and the single live simulation built from it.
pub struct SubgraphEngine {
    graph: Arc<AttributionGraph>,
    config: SimulationConfig,
    viewport: Viewport,
    reduced: ReducedGraph,
    simulation: Option<Simulation>,
    pending_layout: Option<String>,
    applied_layout: Option<String>,
    last_key: Option<RebuildKey>,
    generation: u64,
    pub(super) dragging: Option<String>,
}

impl SubgraphEngine {
    pub fn new(graph: Arc<AttributionGraph>, config: SimulationConfig, viewport: Viewport) -> Self {
        Self {
            graph,
            config,
            viewport,
            reduced: ReducedGraph::default(),
            simulation: None,
            pending_layout: None,
            applied_layout: None,
            last_key: None,
            generation: 0,
            dragging: None,
        }
    }

    pub fn graph(&self) -> &AttributionGraph {
        &self.graph
    }

    pub fn reduced(&self) -> &ReducedGraph {
        &self.reduced
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }

    pub(super) fn simulation_mut(&mut self) -> Option<&mut Simulation> {
        self.simulation.as_mut()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_layout(&self) -> bool {
        self.pending_layout.is_some()
    }

    /// Queues a shared layout. It is consumed by the next rebuild that runs
    /// with dagrefy enabled.
    pub fn apply_layout(&mut self, payload: impl Into<String>) {
        let payload = payload.into();
        if payload.trim().is_empty() {
            return;
        }
        self.pending_layout = Some(payload);
    }

    /// Brings the engine in line with `state`, rebuilding when any rebuild
    /// input changed or a queued layout can be consumed. Returns whether a
    /// rebuild happened.
    pub fn sync(&mut self, state: &mut ViewState) -> bool {
        if !state.sg_pos.is_empty() {
            let already_applied = state.sg_pos == state.og_sg_pos
                && self.applied_layout.as_deref() == Some(state.sg_pos.as_str());
            if already_applied {
                state.apply(StateUpdate::SgPos(String::new()));
            } else if self.pending_layout.as_deref() != Some(state.sg_pos.as_str()) {
                self.pending_layout = Some(state.sg_pos.clone());
            }
        }

        let key = RebuildKey::from_state(state, self.viewport);
        let layout_ready = self.pending_layout.is_some() && key.dagrefy;
        if self.last_key.as_ref() == Some(&key) && !layout_ready {
            return false;
        }

        self.rebuild(state, key);
        true
    }

    fn rebuild(&mut self, state: &mut ViewState, key: RebuildKey) {
        let prior = self.simulation.take().map(|mut previous| {
            previous.dispose();
            previous
                .nodes()
                .iter()
                .map(|node| (node.node_id.clone(), node.clone()))
                .collect::<HashMap<_, _>>()
        });
        let prior = prior.unwrap_or_default();

        self.reduced = reduce(
            &self.graph,
            &key.pinned_ids,
            &key.supernodes,
            key.hide_layer,
        );

        let (x_scale, y_scale) = self.viewport.placement_scales(
            self.reduced.nodes.iter().map(|node| node.ctx_index),
            self.reduced.nodes.iter().map(|node| node.stream_index),
        );

        let mut nodes = self
            .reduced
            .nodes
            .iter()
            .enumerate()
            .map(|(index, reduced)| {
                let home = vec2(
                    x_scale.apply(reduced.ctx_index),
                    y_scale.apply(reduced.stream_index),
                );
                let mut node = LayoutNode::new(reduced.node_id.clone(), index, home, home);
                node.feature_id = reduced.feature_id.clone();
                node.member_count = reduced.members.len();
                node.sorted_slug = self.sorted_slug(reduced.members.iter().map(|m| m.graph_index));
                if let Some(existing) = prior.get(&reduced.node_id) {
                    node.pos = existing.pos;
                    node.fx = existing.fx;
                    node.fy = existing.fy;
                }
                node
            })
            .collect::<Vec<_>>();
        nodes.sort_by(|a, b| a.sorted_slug.cmp(&b.sorted_slug));

        let mut slot_by_reduced = vec![0usize; nodes.len()];
        for (slot, node) in nodes.iter().enumerate() {
            slot_by_reduced[node.reduced_index] = slot;
        }
        let links = self
            .reduced
            .links
            .iter()
            .map(|link| LayoutLink {
                source: slot_by_reduced[link.source_index],
                target: slot_by_reduced[link.target_index],
            })
            .collect::<Vec<_>>();

        let mut simulation = Simulation::new(
            nodes,
            links,
            self.viewport.container_bounds(),
            self.config,
        );
        simulation.start();

        if !key.sticky {
            for node in simulation.nodes_mut() {
                node.release();
            }
            simulation.reheat();
        }

        if key.dagrefy
            && let Some(payload) = self.pending_layout.take()
        {
            self.import_layout(&mut simulation, state, payload);
        }

        self.install(simulation);
        self.generation += 1;
        self.last_key = Some(key);
        self.dragging = None;

        tracing::info!(
            generation = self.generation,
            pinned = state.effective_pinned_ids().len(),
            supernodes = state.subgraph.supernodes.len(),
            nodes = self.reduced.nodes.len(),
            links = self.reduced.links.len(),
            width = self.viewport.width,
            height = self.viewport.height,
            "rebuilt subgraph"
        );
    }

    fn install(&mut self, simulation: Simulation) {
        debug_assert!(
            self.simulation
                .as_ref()
                .is_none_or(|live| live.status() == SimulationStatus::Disposed),
            "a second simulation started while one was live"
        );
        if let Some(previous) = self.simulation.as_mut() {
            previous.dispose();
        }
        self.simulation = Some(simulation);
    }

    fn import_layout(&mut self, simulation: &mut Simulation, state: &mut ViewState, payload: String) {
        let node_count = simulation.nodes().len();
        match parse_positions(&payload, node_count, self.viewport) {
            Ok(positions) => {
                for (node, pos) in simulation.nodes_mut().iter_mut().zip(positions) {
                    node.anchor(pos);
                    node.dagre_positioned = true;
                }
                tracing::debug!(nodes = node_count, "applied shared layout");
                self.applied_layout = Some(payload.clone());
                state.apply(StateUpdate::OgSgPos(payload));
            }
            Err(error) => {
                tracing::warn!(%error, "ignoring shared layout");
            }
        }

        if !state.sg_pos.is_empty() {
            state.apply(StateUpdate::SgPos(String::new()));
        }
    }

    fn sorted_slug(&self, members: impl Iterator<Item = usize>) -> String {
        let joined = members
            .map(|index| self.graph.nodes[index].feature_index.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let mut chars = joined.chars().collect::<Vec<_>>();
        chars.sort_unstable();
        chars.into_iter().collect()
    }

    /// Advances the live simulation by one tick when it is running.
    pub fn tick(&mut self) -> bool {
        self.simulation.as_mut().is_some_and(Simulation::step)
    }

    pub fn is_animating(&self) -> bool {
        self.simulation.as_ref().is_some_and(Simulation::is_running)
    }

    /// Teardown: the live simulation never ticks again.
    pub fn stop(&mut self) {
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.dispose();
        }
    }

    /// Current positions on the shared normalized scale, in simulation order.
    pub fn export_positions(&self) -> String {
        self.simulation
            .as_ref()
            .map(|simulation| {
                export_positions(simulation.nodes().iter().map(|node| node.pos), self.viewport)
            })
            .unwrap_or_default()
    }

    pub fn set_sticky(&self, state: &mut ViewState, sticky: bool) {
        state.update_subgraph(|subgraph| subgraph.sticky = sticky);
    }

    pub fn set_dagrefy(&self, state: &mut ViewState, dagrefy: bool) {
        state.update_subgraph(|subgraph| subgraph.dagrefy = dagrefy);
    }

    pub fn begin_grouping(&self, state: &mut ViewState) {
        if !state.is_edit_mode || state.subgraph.active_grouping.is_active {
            return;
        }
        state.update_subgraph(|subgraph| subgraph.active_grouping.begin());
    }

    /// Releases the grouping modifier, committing a merge when more than one
    /// node is selected.
    pub fn end_grouping(&self, state: &mut ViewState) {
        if !state.subgraph.active_grouping.is_active {
            return;
        }

        let outcome = grouping::commit_selection(
            &state.subgraph.active_grouping.selected_node_ids,
            &state.subgraph.supernodes,
            &self.reduced,
        );
        match outcome {
            GroupingOutcome::Committed { supernodes, label } => {
                tracing::info!(%label, supernodes = supernodes.len(), "committed supernode");
                state.update_subgraph(|subgraph| {
                    subgraph.supernodes = supernodes;
                    subgraph.active_grouping.reset();
                });
            }
            GroupingOutcome::Discarded => self.cancel_grouping(state),
        }
    }

    pub fn cancel_grouping(&self, state: &mut ViewState) {
        tracing::debug!("grouping cancelled");
        state.update_subgraph(|subgraph| subgraph.active_grouping.reset());
    }

    /// Removes the tuple behind a supernode. Only available in edit mode.
    pub fn ungroup(&self, state: &mut ViewState, supernode_id: &str) -> bool {
        let Some(declared) = self.declared_members(state, supernode_id) else {
            return false;
        };
        let remaining = grouping::ungroup(&state.subgraph.supernodes, &declared);
        state.update_subgraph(|subgraph| subgraph.supernodes = remaining);
        true
    }

    /// Relabels a supernode; an empty label falls back to the default.
    pub fn rename(&self, state: &mut ViewState, supernode_id: &str, label: &str) -> bool {
        let Some(declared) = self.declared_members(state, supernode_id) else {
            return false;
        };
        let Some(renamed) = grouping::rename(&state.subgraph.supernodes, &declared, label) else {
            tracing::warn!(supernode_id, "no grouping tuple matches supernode");
            return false;
        };
        state.update_subgraph(|subgraph| subgraph.supernodes = renamed);
        true
    }

    fn declared_members(&self, state: &ViewState, supernode_id: &str) -> Option<Vec<String>> {
        if !state.is_edit_mode {
            tracing::debug!(supernode_id, "supernode edits require edit mode");
            return None;
        }
        self.reduced
            .node(supernode_id)?
            .supernode
            .as_ref()
            .map(|info| info.declared_member_ids.clone())
    }

    /// Empties the pinned set and the grouping definition.
    pub fn clear_subgraph(&self, state: &mut ViewState) {
        state.apply(StateUpdate::PinnedIds(Vec::new()));
        state.update_subgraph(|subgraph| {
            subgraph.supernodes.clear();
            subgraph.active_grouping.reset();
        });
    }
}

impl Drop for SubgraphEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
