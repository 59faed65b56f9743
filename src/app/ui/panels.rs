use std::path::Path;

use eframe::egui::{self, Align, Context, Layout};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        graph_path: &Path,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("circuit-subgraph");
                    ui.separator();
                    let metadata = &self.engine.graph().metadata;
                    if !metadata.slug.is_empty() {
                        ui.label(format!("graph: {}", metadata.slug));
                    }
                    if !metadata.scan.is_empty() {
                        ui.label(format!("scan: {}", metadata.scan));
                    }
                    ui.label(format!("file: {}", graph_path.display()));
                    ui.label(format!("nodes: {}", self.engine.graph().node_count()));
                    ui.label(format!("links: {}", self.engine.graph().link_count()));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload graph"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let reduced = self.engine.reduced();
                        ui.label(format!(
                            "subgraph: {} nodes, {} links",
                            reduced.nodes.len(),
                            reduced.links.len()
                        ));
                        if let Some(simulation) = self.engine.simulation() {
                            ui.label(format!(
                                "alpha {:.3} (target {:.1}), tick {}, build #{}",
                                simulation.alpha(),
                                simulation.alpha_target(),
                                simulation.ticks(),
                                self.engine.generation()
                            ));
                        }
                    });
                });
                if !self.engine.graph().metadata.prompt.is_empty() {
                    ui.small(self.engine.graph().metadata.prompt.as_str());
                }
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if is_loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("Reloading attribution graph...");
                    ui.add_space(8.0);
                    ui.spinner();
                });
            } else {
                self.draw_graph(ui);
            }
        });

        self.drain_updates();
    }
}
