use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context, Vec2};

use crate::graph::{AttributionGraph, load_graph_file};
use crate::layout::{SimulationConfig, Viewport};
use crate::subgraph::{SubgraphEngine, TooltipHost, TooltipInfo, ViewState};

mod graph;
mod render_utils;
mod ui;

type LoadResult = Result<AttributionGraph, String>;

pub struct SubgraphApp {
    graph_path: PathBuf,
    initial_state: ViewState,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    engine: SubgraphEngine,
    view: ViewState,
    search: String,
    tooltip: CanvasTooltip,
    hovered: Option<HoverKey>,
    drag_offset: Vec2,
    grouping_key_held: bool,
    rename_drafts: HashMap<String, String>,
    layout_input: String,
    status: Option<String>,
}

/// Owned form of the pointer target, kept across frames to detect
/// enter/leave transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
enum HoverKey {
    Node(String),
    Member(String),
}

#[derive(Default)]
struct CanvasTooltip {
    current: Option<(Vec2, TooltipInfo)>,
}

impl TooltipHost for CanvasTooltip {
    fn show_tooltip(&mut self, pointer: Vec2, info: &TooltipInfo) {
        self.current = Some((pointer, info.clone()));
    }

    fn hide_tooltip(&mut self) {
        self.current = None;
    }
}

impl SubgraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        graph_path: PathBuf,
        initial_state: ViewState,
    ) -> Self {
        let state = Self::start_load(graph_path.clone());
        Self {
            graph_path,
            initial_state,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(graph_path: PathBuf) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_graph_file(&graph_path)
                .with_context(|| format!("loading {}", graph_path.display()))
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(graph_path: PathBuf) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(graph_path),
        }
    }

    fn ready(graph: AttributionGraph, view: ViewState) -> AppState {
        AppState::Ready(Box::new(ViewModel::new(graph, view)))
    }
}

impl eframe::App for SubgraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(result) => {
                        transition = Some(match result {
                            Ok(graph) => Self::ready(graph, self.initial_state.clone()),
                            Err(error) => AppState::Error(error),
                        });
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error(
                            "Background load worker disconnected".to_owned(),
                        ));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading attribution graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load attribution graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.graph_path.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &self.graph_path, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.graph_path.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => {
                            transition = Some(match result {
                                Ok(graph) => Self::ready(graph, model.view.clone()),
                                Err(error) => AppState::Error(error),
                            });
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition = Some(AppState::Error(
                                "Background load worker disconnected".to_owned(),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}

impl ViewModel {
    fn new(graph: AttributionGraph, view: ViewState) -> Self {
        let engine = SubgraphEngine::new(
            Arc::new(graph),
            SimulationConfig::default(),
            Viewport::default(),
        );
        Self {
            engine,
            view,
            search: String::new(),
            tooltip: CanvasTooltip::default(),
            hovered: None,
            drag_offset: Vec2::ZERO,
            grouping_key_held: false,
            rename_drafts: HashMap::new(),
            layout_input: String::new(),
            status: None,
        }
    }

    /// Logs every view-state write made during the frame.
    fn drain_updates(&mut self) {
        for update in self.view.take_updates() {
            tracing::debug!(
                field = update.field(),
                revision = self.view.revision(),
                ?update,
                "view state updated"
            );
        }
    }
}
