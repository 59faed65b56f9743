use eframe::egui::{
    self, Align2, Color32, CornerRadius, FontId, Pos2, Rect, Sense, Shape, Stroke, StrokeKind, Ui,
    Vec2, vec2,
};

use crate::layout::{NODE_HEIGHT, NODE_WIDTH, Viewport, link_port_offsets};
use crate::util::truncate_label;

use super::super::ViewModel;
use super::super::render_utils::{
    blend_color, canvas_to_screen, draw_background, link_width, pct_color, text_color_for,
};

const MEMBER_RADIUS: f32 = 3.5;
const LABEL_CHARS: usize = 12;

const NODE_FILL: Color32 = Color32::from_rgb(226, 232, 240);
const SUPERNODE_FILL: Color32 = Color32::from_rgb(203, 213, 225);
const GROUPING_FILL: Color32 = Color32::from_rgb(251, 191, 36);
const HOVER_STROKE: Color32 = Color32::from_rgb(236, 72, 153);
const CLICKED_STROKE: Color32 = Color32::from_rgb(14, 165, 233);

/// Screen box of a node whose layout position is its top-left corner.
pub(in crate::app) fn node_rect(rect: Rect, pos: Vec2) -> Rect {
    Rect::from_min_size(canvas_to_screen(rect, pos), vec2(NODE_WIDTH, NODE_HEIGHT))
}

/// Centres of the member circles along the bottom edge of a node box.
pub(in crate::app) fn member_centers(node_rect: Rect, count: usize) -> impl Iterator<Item = Pos2> {
    let step = node_rect.width() / (count as f32 + 1.0);
    let y = node_rect.bottom() - MEMBER_RADIUS - 2.0;
    (1..=count).map(move |slot| Pos2::new(node_rect.left() + step * slot as f32, y))
}

pub(in crate::app) fn member_radius() -> f32 {
    MEMBER_RADIUS
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.engine
            .set_viewport(Viewport::new(rect.width().round(), rect.height().round()));
        self.engine.sync(&mut self.view);

        self.handle_canvas_input(ui, rect, &response);
        self.handle_grouping_keys(ui);
        self.engine.sync(&mut self.view);

        self.engine.tick();
        if self.engine.is_animating() || self.engine.dragging().is_some() {
            ui.ctx().request_repaint();
        }

        draw_background(&painter, rect);

        let Some(simulation) = self.engine.simulation() else {
            return;
        };
        if simulation.nodes().is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Pin nodes from the search panel to build a subgraph",
                FontId::proportional(15.0),
                Color32::from_gray(170),
            );
            return;
        }

        let reduced = self.engine.reduced();
        let nodes = simulation.nodes();
        let links = simulation.links();
        let ports = link_port_offsets(nodes, links);

        let clicked = self.view.clicked_id.as_deref().and_then(|id| {
            reduced
                .node(id)
                .map(|node| node.node_id.as_str())
                .or_else(|| reduced.owner_of(id))
        });
        let highlights = clicked
            .map(|id| reduced.click_highlights(self.engine.graph(), id))
            .unwrap_or_default();

        for (index, (link, port)) in links.iter().zip(&ports).enumerate() {
            let Some(reduced_link) = reduced.links.get(index) else {
                continue;
            };
            let source = node_rect(rect, nodes[link.source].pos);
            let target = node_rect(rect, nodes[link.target].pos);
            let start = Pos2::new(source.center().x + port.source_x, source.top());
            let end = Pos2::new(target.center().x + port.target_x, target.bottom());

            let mut color = pct_color(reduced_link.pct_input);
            if clicked.is_some() {
                let touches_clicked = highlights
                    .neighbor_links
                    .values()
                    .any(|&neighbor_link| neighbor_link == index);
                if !touches_clicked {
                    color = blend_color(color, Color32::from_rgb(19, 23, 29), 0.7);
                }
            }

            let width = link_width(reduced_link.weight);
            painter.line_segment([start, end], Stroke::new(width, color));
            draw_link_marker(&painter, start, end, reduced_link.weight, color);
        }

        let grouping = &self.view.subgraph.active_grouping;
        for node in nodes {
            let Some(reduced_node) = reduced.nodes.get(node.reduced_index) else {
                continue;
            };
            let node_box = node_rect(rect, node.pos);

            let mut fill = if reduced_node.is_supernode() {
                SUPERNODE_FILL
            } else {
                NODE_FILL
            };
            if grouping.is_active && grouping.is_selected(&reduced_node.node_id) {
                fill = GROUPING_FILL;
            }
            if let Some(&link_index) = highlights.neighbor_links.get(&reduced_node.node_id)
                && let Some(link) = reduced.links.get(link_index)
            {
                fill = blend_color(fill, pct_color(link.pct_input), 0.6);
            }

            let stroke = if clicked == Some(reduced_node.node_id.as_str()) {
                Stroke::new(2.5, CLICKED_STROKE)
            } else if self.view.hovered_id.as_deref() == Some(reduced_node.feature_id.as_str()) {
                Stroke::new(2.0, HOVER_STROKE)
            } else if node.is_anchored() {
                Stroke::new(1.0, Color32::from_gray(90))
            } else {
                Stroke::new(1.0, Color32::from_gray(150))
            };

            painter.rect(
                node_box,
                CornerRadius::same(4),
                fill,
                stroke,
                StrokeKind::Inside,
            );
            painter.text(
                Pos2::new(node_box.center().x, node_box.top() + 8.0),
                Align2::CENTER_CENTER,
                truncate_label(&reduced_node.label, LABEL_CHARS),
                FontId::proportional(10.0),
                text_color_for(fill),
            );

            for (member, center) in reduced_node
                .members
                .iter()
                .zip(member_centers(node_box, reduced_node.members.len()))
            {
                let member_fill = highlights
                    .member_links
                    .get(&member.node_id)
                    .and_then(|&link_index| self.engine.graph().links.get(link_index))
                    .map(|link| pct_color(link.pct_input))
                    .unwrap_or(Color32::from_gray(120));
                let radius = MEMBER_RADIUS * (0.6 + 0.4 * member.input_weighting.sqrt() as f32);
                painter.circle_filled(center, radius.max(1.5), member_fill);
                if self.view.hovered_id.as_deref() == Some(member.feature_id.as_str()) {
                    painter.circle_stroke(center, MEMBER_RADIUS + 1.5, Stroke::new(1.5, HOVER_STROKE));
                }
            }
        }

        if grouping.is_active {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!(
                    "Grouping: {} selected (release G to merge)",
                    grouping.selected_node_ids.len()
                ),
                FontId::proportional(13.0),
                GROUPING_FILL,
            );
        }

        self.draw_tooltip(&painter, rect);
    }

    fn draw_tooltip(&self, painter: &egui::Painter, rect: Rect) {
        let Some((pointer, info)) = &self.tooltip.current else {
            return;
        };

        let text = format!(
            "{}\nlayer {}  ctx {:.1}\n{}",
            info.label, info.layer, info.ctx_index, info.node_id
        );
        let galley = painter.layout_no_wrap(text, FontId::proportional(12.0), Color32::WHITE);
        let origin = canvas_to_screen(rect, *pointer) + vec2(14.0, 14.0);
        let background = Rect::from_min_size(origin, galley.size()).expand(5.0);
        painter.rect_filled(
            background,
            CornerRadius::same(4),
            Color32::from_rgba_unmultiplied(10, 12, 16, 230),
        );
        painter.galley(origin, galley, Color32::WHITE);
    }
}

/// Arrowhead for excitatory links, a flat bar for inhibitory ones.
fn draw_link_marker(painter: &egui::Painter, start: Pos2, end: Pos2, weight: f64, color: Color32) {
    let direction = end - start;
    if direction.length_sq() <= f32::EPSILON {
        return;
    }
    let direction = direction.normalized();
    let normal = vec2(-direction.y, direction.x);
    let tip = end - direction * 2.0;

    if weight >= 0.0 {
        let base = tip - direction * 7.0;
        painter.add(Shape::convex_polygon(
            vec![tip, base + normal * 4.0, base - normal * 4.0],
            color,
            Stroke::NONE,
        ));
    } else {
        painter.line_segment([tip + normal * 5.0, tip - normal * 5.0], Stroke::new(2.0, color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Viewport;

    #[test]
    fn node_boxes_hang_from_their_layout_corner() {
        let canvas = Rect::from_min_size(Pos2::new(100.0, 100.0), vec2(800.0, 600.0));

        let origin = node_rect(canvas, Vec2::ZERO);
        assert_eq!(origin.min, canvas.min);
        assert_eq!(origin.size(), vec2(NODE_WIDTH, NODE_HEIGHT));

        let viewport = Viewport::new(canvas.width(), canvas.height());
        let lowest = node_rect(canvas, vec2(0.0, viewport.height - NODE_HEIGHT));
        assert!(canvas.contains_rect(lowest));
    }
}
