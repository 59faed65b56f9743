use eframe::egui::{self, RichText, Ui};

use crate::graph::Direction;
use crate::util::{display_token, format_pct, format_weight, truncate_label};

use super::super::ViewModel;

const NEIGHBOR_ROWS: usize = 6;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        self.draw_clicked_node(ui);
        self.draw_graph_neighbors(ui);
        ui.separator();
        self.draw_pinned_list(ui);
    }

    fn draw_clicked_node(&mut self, ui: &mut Ui) {
        let Some(clicked_id) = self.view.clicked_id.clone() else {
            ui.label("Click a node in the subgraph to inspect it.");
            return;
        };

        let graph = self.engine.graph();
        let reduced = self.engine.reduced();

        if let Some(node) = reduced.node(&clicked_id) {
            ui.label(RichText::new(node.label.as_str()).strong());
            ui.small(node.node_id.as_str());
            ui.add_space(6.0);
            ui.label(format!("Layer: {}", node.layer));
            ui.label(format!("Context index: {:.1}", node.ctx_index));
            ui.label(format!("Input |w| sum: {:.3}", node.input_abs_sum));
            if node.is_supernode() {
                ui.label(format!("External input |w| sum: {:.3}", node.input_abs_sum_external));
                ui.label(RichText::new("Members").strong());
                for member in &node.members {
                    ui.label(format!(
                        "{}  ({})",
                        truncate_label(&member.display_label, 36),
                        format_pct(member.input_weighting)
                    ))
                    .on_hover_text(member.node_id.as_str());
                }
            }

            ui.separator();
            ui.label(RichText::new("Links").strong());
            let mut any_link = false;
            for link in &reduced.links {
                let (direction, other) = if link.source == node.node_id {
                    ("→", &link.target)
                } else if link.target == node.node_id {
                    ("←", &link.source)
                } else {
                    continue;
                };
                any_link = true;
                let other_label = reduced.display_label(other).unwrap_or(other.as_str());
                ui.label(format!(
                    "{direction} {}  {}  ({} of input)",
                    truncate_label(other_label, 28),
                    format_weight(link.weight),
                    format_pct(link.pct_input)
                ));
            }
            if !any_link {
                ui.label("No links inside the subgraph.");
            }
        } else if let Some(node) = graph.find_node(&clicked_id) {
            ui.label(RichText::new(node.label.as_str()).strong());
            ui.small(node.node_id.as_str());
            ui.add_space(6.0);
            ui.label(format!("Kind: {}", node.kind.label()));
            ui.label(format!("Layer: {}", node.layer));
            let token = usize::try_from(node.ctx_index)
                .ok()
                .and_then(|index| graph.metadata.prompt_tokens.get(index))
                .map(|token| display_token(token))
                .unwrap_or_default();
            ui.label(format!("Context: {} {token}", node.ctx_index));
            ui.label(format!("Input |w| sum: {:.3}", node.input_abs_sum));
            if let Some(owner) = reduced.owner_of(&clicked_id) {
                ui.label(format!("Member of: {owner}"));
            }
        } else {
            ui.label("Clicked node is not part of this graph.");
        }
    }

    /// Strongest full-graph connections of the clicked node; clicking one
    /// toggles its pin.
    fn draw_graph_neighbors(&mut self, ui: &mut Ui) {
        let Some(clicked_id) = self.view.clicked_id.clone() else {
            return;
        };
        let graph = self.engine.graph();
        if graph.find_node(&clicked_id).is_none() {
            return;
        }

        let mut toggled = None;
        for (direction, heading) in [
            (Direction::Incoming, "Strongest inputs"),
            (Direction::Outgoing, "Strongest outputs"),
        ] {
            let mut neighbors = graph.neighbors_of(&clicked_id, direction).collect::<Vec<_>>();
            if neighbors.is_empty() {
                continue;
            }
            neighbors.sort_by(|a, b| b.0.weight.abs().total_cmp(&a.0.weight.abs()));

            ui.separator();
            ui.label(RichText::new(heading).strong());
            for (link, other) in neighbors.into_iter().take(NEIGHBOR_ROWS) {
                let pinned = self.view.is_pinned(&other.node_id);
                let text = format!(
                    "{}  {}",
                    truncate_label(&other.label, 28),
                    format_weight(link.weight)
                );
                if ui
                    .selectable_label(pinned, text)
                    .on_hover_text(other.node_id.as_str())
                    .clicked()
                {
                    toggled = Some(other.node_id.clone());
                }
            }
        }

        if let Some(node_id) = toggled {
            self.view.toggle_pin(&node_id);
        }
    }

    fn draw_pinned_list(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Pinned nodes").strong());
        if self.view.pinned_ids.is_empty() {
            ui.label("Nothing pinned yet.");
            return;
        }

        let mut unpin = None;
        egui::ScrollArea::vertical()
            .id_salt("pinned_nodes_scroll")
            .max_height(320.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for node_id in self.view.effective_pinned_ids() {
                    let label = self
                        .engine
                        .graph()
                        .find_node(node_id)
                        .map(|node| node.label.as_str())
                        .unwrap_or("(missing)");
                    ui.horizontal(|ui| {
                        if ui.small_button("✕").on_hover_text("Unpin").clicked() {
                            unpin = Some(node_id.clone());
                        }
                        ui.label(truncate_label(label, 32))
                            .on_hover_text(node_id.as_str());
                    });
                }
            });

        if let Some(node_id) = unpin {
            self.view.toggle_pin(&node_id);
        }
    }
}
