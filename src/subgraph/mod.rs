mod engine;
mod grouping;
mod interaction;
mod positions;
mod reduce;
mod state;

pub use engine::SubgraphEngine;
pub use interaction::{NodeTarget, PointerState, TooltipHost, TooltipInfo};
pub use positions::parse_positions;
pub use state::{MAX_PINNED_NODES, StateUpdate, ViewState};
