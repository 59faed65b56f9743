use eframe::egui::{self, Key, Pos2, Rect, Ui, Vec2};

use crate::subgraph::{NodeTarget, PointerState};

use super::super::render_utils::screen_to_canvas;
use super::super::{HoverKey, ViewModel};
use super::view::{member_centers, member_radius, node_rect};

impl HoverKey {
    fn as_target(&self) -> NodeTarget<'_> {
        match self {
            Self::Node(id) => NodeTarget::Node(id),
            Self::Member(id) => NodeTarget::Member(id),
        }
    }
}

impl ViewModel {
    /// Topmost node box under `pointer`, preferring a member circle inside it.
    pub(in crate::app) fn hit_test(&self, rect: Rect, pointer: Pos2) -> Option<HoverKey> {
        let simulation = self.engine.simulation()?;
        let reduced = self.engine.reduced();

        simulation.nodes().iter().rev().find_map(|node| {
            let node_box = node_rect(rect, node.pos);
            if !node_box.contains(pointer) {
                return None;
            }
            let reduced_node = reduced.nodes.get(node.reduced_index)?;
            let member = reduced_node
                .members
                .iter()
                .zip(member_centers(node_box, reduced_node.members.len()))
                .find(|(_, center)| center.distance(pointer) <= member_radius() + 1.0)
                .map(|(member, _)| HoverKey::Member(member.node_id.clone()));
            Some(member.unwrap_or_else(|| HoverKey::Node(node.node_id.clone())))
        })
    }

    fn owning_node(&self, key: &HoverKey) -> Option<String> {
        match key {
            HoverKey::Node(id) => Some(id.clone()),
            HoverKey::Member(id) => self.engine.reduced().owner_of(id).map(str::to_owned),
        }
    }

    pub(in crate::app) fn handle_canvas_input(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        let (hover_pos, press_origin, primary_down, command) = ui.input(|input| {
            (
                input.pointer.hover_pos(),
                input.pointer.press_origin(),
                input.pointer.primary_down(),
                input.modifiers.command,
            )
        });
        let pointer = PointerState {
            pos: hover_pos
                .map(|pos| screen_to_canvas(rect, pos))
                .unwrap_or(Vec2::ZERO),
            primary_down,
            command,
        };
        let hit = hover_pos
            .filter(|pos| rect.contains(*pos))
            .and_then(|pos| self.hit_test(rect, pos));

        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(origin) = press_origin
            && let Some(key) = self.hit_test(rect, origin)
            && let Some(node_id) = self.owning_node(&key)
        {
            let grab = screen_to_canvas(rect, origin);
            self.drag_offset = self
                .engine
                .simulation()
                .and_then(|simulation| simulation.node(&node_id))
                .map(|node| node.pos - grab)
                .unwrap_or(Vec2::ZERO);
            self.engine.drag_start(&node_id);
        }

        if response.dragged_by(egui::PointerButton::Primary)
            && let Some(node_id) = self.engine.dragging().map(str::to_owned)
        {
            self.engine.drag_move(&node_id, pointer.pos + self.drag_offset);
        }

        if response.drag_stopped()
            && let Some(node_id) = self.engine.dragging().map(str::to_owned)
        {
            self.engine.drag_end(&self.view, &node_id);
        }

        if response.clicked()
            && let Some(key) = &hit
        {
            self.engine.click(&mut self.view, key.as_target(), pointer);
        }

        if primary_down {
            return;
        }
        if hit != self.hovered && self.hovered.is_some() {
            self.engine
                .hover_leave(&mut self.view, pointer, &mut self.tooltip);
        }
        if let Some(key) = &hit {
            self.engine
                .hover_enter(&mut self.view, key.as_target(), pointer, &mut self.tooltip);
        }
        self.hovered = hit;
    }

    /// Holding `G` in edit mode collects clicked nodes; releasing it merges
    /// them. `Escape` abandons the selection.
    pub(in crate::app) fn handle_grouping_keys(&mut self, ui: &Ui) {
        if ui.ctx().wants_keyboard_input() {
            return;
        }

        let (pressed, released, escape) = ui.input(|input| {
            (
                input.key_pressed(Key::G),
                input.key_released(Key::G),
                input.key_pressed(Key::Escape),
            )
        });

        if pressed && !self.grouping_key_held {
            self.grouping_key_held = true;
            self.engine.begin_grouping(&mut self.view);
        }
        if released && self.grouping_key_held {
            self.grouping_key_held = false;
            self.engine.end_grouping(&mut self.view);
        }
        if escape && self.view.subgraph.active_grouping.is_active {
            self.grouping_key_held = false;
            self.engine.cancel_grouping(&mut self.view);
        }
    }
}
