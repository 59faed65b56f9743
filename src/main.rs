mod app;
mod graph;
mod layout;
mod subgraph;
#[cfg(test)]
mod test_utils;
mod util;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::subgraph::{StateUpdate, ViewState};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Attribution graph JSON file.
    graph: PathBuf,
    /// Saved view state (JSON) to start from.
    #[arg(long)]
    view_state: Option<PathBuf>,
    /// Node id to pin; may be repeated.
    #[arg(long = "pin")]
    pins: Vec<String>,
    /// Shared layout string (`x1,y1,x2,y2,...`) to apply on first build.
    #[arg(long)]
    sg_pos: Option<String>,
    #[arg(long)]
    edit_mode: bool,
    #[arg(long)]
    hide_layer: bool,
    #[arg(long)]
    no_sticky: bool,
    #[arg(long)]
    no_dagrefy: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("circuit_subgraph={log_level}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_view_state(path: &Path) -> anyhow::Result<ViewState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read view state {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse view state {}", path.display()))
}

fn initial_view_state(args: &Args) -> anyhow::Result<ViewState> {
    let mut state = match &args.view_state {
        Some(path) => read_view_state(path)?,
        None => ViewState::default(),
    };

    for pin in &args.pins {
        if !state.is_pinned(pin) {
            state.toggle_pin(pin);
        }
    }
    if let Some(sg_pos) = &args.sg_pos {
        state.apply(StateUpdate::SgPos(sg_pos.clone()));
    }
    if args.edit_mode {
        state.apply(StateUpdate::EditMode(true));
    }
    if args.hide_layer {
        state.apply(StateUpdate::HideLayer(true));
    }
    if args.no_sticky {
        state.update_subgraph(|subgraph| subgraph.sticky = false);
    }
    if args.no_dagrefy {
        state.update_subgraph(|subgraph| subgraph.dagrefy = false);
    }
    state.take_updates();
    Ok(state)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let initial_state = initial_view_state(&args)?;
    tracing::info!(
        graph = %args.graph.display(),
        pinned = initial_state.pinned_ids.len(),
        supernodes = initial_state.subgraph.supernodes.len(),
        "starting circuit-subgraph v{}",
        env!("CARGO_PKG_VERSION")
    );

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let graph_path = args.graph;
    eframe::run_native(
        "circuit-subgraph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::SubgraphApp::new(
                cc,
                graph_path.clone(),
                initial_state.clone(),
            )))
        }),
    )
    .map_err(|error| anyhow::anyhow!("failed to run viewer: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_shape_initial_state() {
        let args = Args::parse_from([
            "circuit-subgraph",
            "graph.json",
            "--pin",
            "a",
            "--pin",
            "b",
            "--pin",
            "a",
            "--sg-pos",
            "1,2,3,4",
            "--edit-mode",
            "--no-sticky",
        ]);
        let state = initial_view_state(&args).expect("state");

        assert_eq!(state.pinned_ids, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(state.sg_pos, "1,2,3,4");
        assert!(state.is_edit_mode);
        assert!(!state.is_hide_layer);
        assert!(!state.subgraph.sticky);
        assert!(state.subgraph.dagrefy);
    }
}
