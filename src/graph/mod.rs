mod load;
mod model;
mod parse;

#[cfg(test)]
pub(crate) use load::build_graph;
pub use load::load_graph_file;
pub use model::{AttributionGraph, Direction};
