use eframe::egui::{self, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::graph::AttributionGraph;
use crate::subgraph::{MAX_PINNED_NODES, StateUpdate, parse_positions};
use crate::util::truncate_label;

use super::super::ViewModel;

const SEARCH_RESULT_LIMIT: usize = 40;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Best-scoring graph nodes for `query`, matched on label and node id.
fn search_nodes(graph: &AttributionGraph, query: &str, limit: usize) -> Vec<usize> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = graph
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let label_score = fuzzy_match_score(&matcher, &node.label, query);
            let id_score = fuzzy_match_score(&matcher, &node.node_id, query);
            label_score.max(id_score).map(|score| (index, score))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(limit);
    scored.into_iter().map(|(index, _)| index).collect()
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Subgraph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_toggles(ui);
        ui.separator();
        self.draw_layout_sharing(ui);
        ui.separator();
        self.draw_search(ui);
        ui.separator();
        self.draw_supernodes(ui);
    }

    fn draw_toggles(&mut self, ui: &mut Ui) {
        let mut sticky = self.view.subgraph.sticky;
        if ui
            .checkbox(&mut sticky, "Sticky")
            .on_hover_text("Keep dragged nodes where they are dropped.")
            .changed()
        {
            self.engine.set_sticky(&mut self.view, sticky);
        }

        let mut dagrefy = self.view.subgraph.dagrefy;
        if ui
            .checkbox(&mut dagrefy, "Apply shared layouts")
            .on_hover_text("Pin nodes to positions from a pasted layout string.")
            .changed()
        {
            self.engine.set_dagrefy(&mut self.view, dagrefy);
        }

        let mut edit_mode = self.view.is_edit_mode;
        if ui
            .checkbox(&mut edit_mode, "Edit mode")
            .on_hover_text("Hold G and click nodes to group them into a supernode.")
            .changed()
        {
            if !edit_mode {
                self.engine.cancel_grouping(&mut self.view);
            }
            self.view.apply(StateUpdate::EditMode(edit_mode));
        }

        let mut hide_layer = self.view.is_hide_layer;
        if ui
            .checkbox(&mut hide_layer, "Hide layer")
            .on_hover_text("Place nodes by stream rank instead of layer.")
            .changed()
        {
            self.view.apply(StateUpdate::HideLayer(hide_layer));
        }

        ui.add_space(4.0);
        if ui.button("Clear subgraph").clicked() {
            self.engine.clear_subgraph(&mut self.view);
            self.status = Some("Cleared pinned nodes and supernodes".to_owned());
        }
    }

    fn draw_layout_sharing(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Shared layout").strong());
        ui.horizontal(|ui| {
            if ui.button("Copy positions").clicked() {
                let payload = self.engine.export_positions();
                ui.ctx().copy_text(payload);
                self.status = Some("Copied node positions".to_owned());
            }
            let can_apply = !self.layout_input.trim().is_empty();
            if ui
                .add_enabled(can_apply, egui::Button::new("Apply pasted"))
                .clicked()
            {
                let node_count = self.engine.reduced().nodes.len();
                match parse_positions(&self.layout_input, node_count, self.engine.viewport()) {
                    Ok(_) => {
                        if !self.view.subgraph.dagrefy {
                            self.engine.set_dagrefy(&mut self.view, true);
                        }
                        self.engine.apply_layout(self.layout_input.trim());
                        self.status = Some(format!("Applied layout for {node_count} nodes"));
                    }
                    Err(error) => self.status = Some(error.to_string()),
                }
            }
        });
        ui.add(
            egui::TextEdit::singleline(&mut self.layout_input)
                .hint_text("x1,y1,x2,y2,...")
                .desired_width(f32::INFINITY),
        );
        if self.engine.has_pending_layout() && !self.view.subgraph.dagrefy {
            ui.small("A shared layout is queued until layouts are applied.");
        }
        if let Some(status) = &self.status {
            ui.small(status.as_str());
        }
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label(format!(
            "Pinned: {} / {MAX_PINNED_NODES}",
            self.view.effective_pinned_ids().len()
        ));
        ui.label("Search (label or node id)")
            .on_hover_text("Fuzzy-match nodes across the full graph and click to pin them.");
        ui.text_edit_singleline(&mut self.search);

        let matches = search_nodes(self.engine.graph(), &self.search, SEARCH_RESULT_LIMIT);
        if matches.is_empty() {
            return;
        }

        let mut toggled = None;
        egui::ScrollArea::vertical()
            .id_salt("search_results_scroll")
            .max_height(260.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for index in matches {
                    let node = &self.engine.graph().nodes[index];
                    let pinned = self.view.is_pinned(&node.node_id);
                    let text = format!(
                        "{}  L{} ctx {}",
                        truncate_label(&node.label, 28),
                        node.layer,
                        node.ctx_index
                    );
                    if ui
                        .selectable_label(pinned, text)
                        .on_hover_text(node.node_id.as_str())
                        .clicked()
                    {
                        toggled = Some(node.node_id.clone());
                    }
                }
            });

        if let Some(node_id) = toggled {
            self.view.toggle_pin(&node_id);
        }
    }

    fn draw_supernodes(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Supernodes").strong());

        let supernodes = self
            .engine
            .reduced()
            .nodes
            .iter()
            .filter(|node| node.is_supernode())
            .map(|node| (node.node_id.clone(), node.label.clone(), node.members.len()))
            .collect::<Vec<_>>();

        if supernodes.is_empty() {
            ui.label("No supernodes. Enable edit mode, hold G and click nodes to group them.");
            return;
        }

        let is_edit_mode = self.view.is_edit_mode;
        let mut ungroup = None;
        let mut rename = None;
        for (node_id, label, member_count) in supernodes {
            ui.horizontal(|ui| {
                ui.label(format!("{label} ({member_count})"));
                if !is_edit_mode {
                    return;
                }
                let draft = self
                    .rename_drafts
                    .entry(node_id.clone())
                    .or_insert_with(|| label.clone());
                ui.add(egui::TextEdit::singleline(draft).desired_width(110.0));
                if ui.button("Rename").clicked() {
                    rename = Some((node_id.clone(), draft.clone()));
                }
                if ui.button("Ungroup").clicked() {
                    ungroup = Some(node_id.clone());
                }
            });
        }

        if let Some((node_id, label)) = rename {
            self.rename_drafts.remove(&node_id);
            self.engine.rename(&mut self.view, &node_id, &label);
        }
        if let Some(node_id) = ungroup {
            self.rename_drafts.remove(&node_id);
            self.engine.ungroup(&mut self.view, &node_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::three_node_graph;

    #[test]
    fn search_ranks_label_and_id_matches() {
        let graph = three_node_graph();
        let hits = search_nodes(&graph, "beta", 10);
        assert_eq!(hits.first().map(|&index| graph.nodes[index].node_id.as_str()), Some("n2"));
        assert!(search_nodes(&graph, "   ", 10).is_empty());
        assert_eq!(search_nodes(&graph, "n", 2).len(), 2);
    }
}
