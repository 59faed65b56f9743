use crate::graph::{AttributionGraph, build_graph};

/// `n1 -> n2 (0.5)`, `n2 -> n3 (-0.3)`, `n1 -> n3 (0.1)`.
pub(crate) const THREE_NODE_GRAPH_JSON: &str = r#"{
    "metadata": {"slug": "three", "scan": "toy", "prompt": "a b c", "prompt_tokens": ["a", "b", "c"]},
    "nodes": [
        {"node_id": "n1", "feature": 11, "layer": "0", "ctx_idx": 0, "feature_type": "cross layer transcoder", "clerp": "alpha"},
        {"node_id": "n2", "feature": 12, "layer": "1", "ctx_idx": 1, "feature_type": "cross layer transcoder", "clerp": "beta"},
        {"node_id": "n3", "feature": 13, "layer": "0", "ctx_idx": 2, "feature_type": "cross layer transcoder", "clerp": "gamma"}
    ],
    "links": [
        {"source": "n1", "target": "n2", "weight": 0.5},
        {"source": "n2", "target": "n3", "weight": -0.3},
        {"source": "n1", "target": "n3", "weight": 0.1}
    ]
}"#;

pub(crate) fn three_node_graph() -> AttributionGraph {
    build_graph(THREE_NODE_GRAPH_JSON).expect("fixture graph is valid")
}

pub(crate) fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}
