use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::model::{AttributionGraph, GraphMetadata, Link, Node, NodeKind};
use super::parse::{RawGraph, layer_to_string, numeric_layer, parse_graph_json};

#[derive(Debug, thiserror::Error)]
pub enum GraphLoadError {
    #[error("failed to read attribution graph {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid attribution graph JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("attribution graph contains no nodes")]
    Empty,
    #[error("attribution graph has no numeric layer outside the logits")]
    NoLayer,
}

pub fn load_graph_file(path: &Path) -> Result<AttributionGraph, GraphLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| GraphLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let graph = build_graph(&raw)?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        links = graph.link_count(),
        "loaded attribution graph"
    );
    Ok(graph)
}

fn token_at(tokens: &[String], ctx: i64) -> &str {
    usize::try_from(ctx)
        .ok()
        .and_then(|index| tokens.get(index))
        .map(String::as_str)
        .unwrap_or("")
}

/// Sort key placing embeddings below every numbered layer.
fn layer_order(layer: &str) -> f64 {
    if layer == "E" {
        -1.0
    } else {
        numeric_layer(layer).unwrap_or(0.0)
    }
}

pub fn build_graph(raw: &str) -> Result<AttributionGraph, GraphLoadError> {
    let RawGraph {
        metadata,
        nodes: raw_nodes,
        links: raw_links,
    } = parse_graph_json(raw)?;

    if raw_nodes.is_empty() {
        return Err(GraphLoadError::Empty);
    }

    let max_layer = raw_nodes
        .iter()
        .filter(|node| NodeKind::from_feature_type(&node.feature_type) != NodeKind::Logit)
        .filter_map(|node| numeric_layer(&layer_to_string(&node.layer)))
        .fold(None, |max: Option<f64>, layer| {
            Some(max.map_or(layer, |current| current.max(layer)))
        })
        .ok_or(GraphLoadError::NoLayer)?;

    let prompt_len = metadata.prompt_tokens.len() as i64;

    let mut seen = HashSet::with_capacity(raw_nodes.len());
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for raw_node in raw_nodes {
        if !seen.insert(raw_node.node_id.clone()) {
            tracing::warn!(node_id = %raw_node.node_id, "skipping duplicate node id");
            continue;
        }

        let mut layer = layer_to_string(&raw_node.layer);
        let feature = raw_node.feature.map(|value| value.to_string()).unwrap_or_default();
        let mut feature_id = format!("{layer}_{feature}_{}", raw_node.ctx_idx);

        let mut feature_type = raw_node.feature_type;
        if feature_type == "unexplored node" && layer != "E" {
            feature_type = "cross layer transcoder".to_owned();
        }
        let kind = NodeKind::from_feature_type(&feature_type);
        if kind == NodeKind::Logit {
            layer = (max_layer + 1.0).to_string();
        }

        let ctx_from_end = prompt_len - raw_node.ctx_idx;
        let mut label = raw_node.clerp.unwrap_or_default();
        match kind {
            NodeKind::Error => {
                if !feature_id.contains("__err_idx_") {
                    feature_id = format!("{feature_id}__err_idx_{ctx_from_end}");
                }
                if feature_type == "mlp reconstruction error" {
                    let token = token_at(&metadata.prompt_tokens, raw_node.ctx_idx);
                    label = format!("Err: mlp \" {token}\"");
                }
            }
            NodeKind::Embedding => {
                let token = token_at(&metadata.prompt_tokens, raw_node.ctx_idx);
                label = format!("Emb: \" {token}\"");
            }
            NodeKind::Feature | NodeKind::Logit => {}
        }

        nodes.push(Node {
            node_id: raw_node.node_id,
            feature_id,
            feature_index: raw_node.feature.unwrap_or_default(),
            kind,
            feature_type,
            layer,
            ctx_index: raw_node.ctx_idx,
            ctx_from_end,
            probe_location_index: raw_node.probe_location_idx,
            layer_stream_index: 0.0,
            ranked_stream_index: 0.0,
            label,
            token_prob: raw_node.token_prob,
            is_target_logit: raw_node.is_target_logit,
            input_abs_sum: 0.0,
            input_error: 0.0,
            pct_input_error: 0.0,
        });
    }

    nodes.sort_by(|a, b| layer_order(&a.layer).total_cmp(&layer_order(&b.layer)));
    assign_stream_indices(&mut nodes);

    let index_by_id = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.node_id.clone(), index))
        .collect::<HashMap<_, _>>();

    let mut dropped_links = 0usize;
    let mut links = raw_links
        .into_iter()
        .filter_map(|raw_link| {
            match (
                index_by_id.get(&raw_link.source),
                index_by_id.get(&raw_link.target),
            ) {
                (Some(&source), Some(&target)) => Some(Link {
                    source,
                    target,
                    weight: raw_link.weight,
                    pct_input: 0.0,
                }),
                _ => {
                    dropped_links += 1;
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    if dropped_links > 0 {
        tracing::debug!(dropped_links, "dropped links with unknown endpoints");
    }

    links.sort_by(|a, b| a.weight.abs().total_cmp(&b.weight.abs()));

    for link in &links {
        let is_error_source = nodes[link.source].kind == NodeKind::Error;
        let target = &mut nodes[link.target];
        target.input_abs_sum += link.weight.abs();
        if is_error_source {
            target.input_error += link.weight.abs();
        }
    }

    for node in &mut nodes {
        node.pct_input_error = if node.input_abs_sum > 0.0 {
            node.input_error / node.input_abs_sum
        } else {
            0.0
        };
    }

    for link in &mut links {
        let input_abs_sum = nodes[link.target].input_abs_sum;
        link.pct_input = if input_abs_sum > 0.0 {
            link.weight / input_abs_sum
        } else {
            0.0
        };
    }

    let metadata = GraphMetadata {
        slug: metadata.slug,
        scan: metadata.scan,
        prompt: metadata.prompt,
        prompt_tokens: metadata.prompt_tokens,
    };

    Ok(AttributionGraph::from_parts(metadata, nodes, links))
}

fn assign_stream_indices(nodes: &mut [Node]) {
    let mut streams = nodes
        .iter()
        .map(|node| (node.layer.clone(), node.probe_location_index))
        .collect::<Vec<_>>();
    streams.sort_by(|a, b| {
        layer_order(&a.0)
            .total_cmp(&layer_order(&b.0))
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    streams.dedup();

    let rank_by_stream = streams
        .into_iter()
        .enumerate()
        .map(|(rank, stream)| (stream, rank))
        .collect::<HashMap<_, _>>();

    for node in nodes {
        let key = (node.layer.clone(), node.probe_location_index);
        node.ranked_stream_index = rank_by_stream.get(&key).copied().unwrap_or(0) as f64;
        node.layer_stream_index = numeric_layer(&node.layer).unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::three_node_graph;

    #[test]
    fn derives_input_sums_and_pct_input() {
        let graph = three_node_graph();
        let n1 = graph.find_node("n1").expect("n1");
        let n2 = graph.find_node("n2").expect("n2");
        let n3 = graph.find_node("n3").expect("n3");

        assert_eq!(n1.input_abs_sum, 0.0);
        assert!((n2.input_abs_sum - 0.5).abs() < 1e-12);
        assert!((n3.input_abs_sum - 0.4).abs() < 1e-12);

        let into_n3 = graph
            .links
            .iter()
            .filter(|link| link.target == graph.node_index("n3").expect("n3 index"))
            .map(|link| link.pct_input)
            .collect::<Vec<_>>();
        assert_eq!(into_n3.len(), 2);
        assert!(into_n3.iter().any(|pct| (pct - 0.25).abs() < 1e-12));
        assert!(into_n3.iter().any(|pct| (pct + 0.75).abs() < 1e-12));
    }

    #[test]
    fn links_sorted_by_absolute_weight() {
        let graph = three_node_graph();
        let weights = graph
            .links
            .iter()
            .map(|link| link.weight.abs())
            .collect::<Vec<_>>();
        assert!(weights.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn stream_index_follows_layer_or_rank() {
        let graph = three_node_graph();
        let n2 = graph.find_node("n2").expect("n2");
        assert_eq!(n2.stream_index(false), 1.0);
        assert_eq!(n2.stream_index(true), 1.0);
        assert_eq!(graph.find_node("n3").expect("n3").stream_index(false), 0.0);
    }

    #[test]
    fn synthesizes_labels_and_logit_layer() {
        let raw = r#"{
            "metadata": {"slug": "s", "scan": "m", "prompt_tokens": ["The", "cat"]},
            "nodes": [
                {"node_id": "emb", "layer": "E", "ctx_idx": 0, "feature_type": "embedding"},
                {"node_id": "f", "layer": "3", "feature": 7, "ctx_idx": 1, "feature_type": "cross layer transcoder", "clerp": "cats"},
                {"node_id": "err", "layer": "2", "ctx_idx": 1, "feature_type": "mlp reconstruction error"},
                {"node_id": "logit", "layer": "0", "ctx_idx": 1, "feature_type": "logit", "clerp": "sat"}
            ],
            "links": [
                {"source": "emb", "target": "f", "weight": 1.0},
                {"source": "err", "target": "f", "weight": -1.0},
                {"source": "f", "target": "logit", "weight": 0.5},
                {"source": "ghost", "target": "f", "weight": 9.0}
            ]
        }"#;
        let graph = build_graph(raw).expect("graph builds");

        assert_eq!(graph.link_count(), 3);
        assert_eq!(graph.find_node("emb").expect("emb").label, "Emb: \" The\"");
        assert_eq!(graph.find_node("err").expect("err").label, "Err: mlp \" cat\"");
        assert_eq!(graph.find_node("logit").expect("logit").layer, "4");
        assert_eq!(graph.find_node("f").expect("f").feature_id, "3_7_1");
        assert!(
            graph
                .find_node("err")
                .expect("err")
                .feature_id
                .ends_with("__err_idx_1")
        );

        let feature = graph.find_node("f").expect("f");
        assert!((feature.input_error - 1.0).abs() < 1e-12);
        assert!((feature.pct_input_error - 0.5).abs() < 1e-12);

        assert_eq!(graph.nodes[0].node_id, "emb");
        assert_eq!(graph.find_node("emb").expect("emb").stream_index(true), 0.0);
        assert_eq!(graph.find_node("logit").expect("logit").stream_index(false), 4.0);
    }

    #[test]
    fn rejects_empty_and_layerless_graphs() {
        assert!(matches!(
            build_graph(r#"{"nodes": [], "links": []}"#),
            Err(GraphLoadError::Empty)
        ));
        assert!(matches!(
            build_graph(r#"{"nodes": [{"node_id": "a", "layer": "E"}], "links": []}"#),
            Err(GraphLoadError::NoLayer)
        ));
        assert!(matches!(
            build_graph("not json"),
            Err(GraphLoadError::Json(_))
        ));
    }
}
