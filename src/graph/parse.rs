use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawGraph {
    #[serde(default)]
    pub(super) metadata: RawMetadata,
    #[serde(default)]
    pub(super) nodes: Vec<RawNode>,
    #[serde(default)]
    pub(super) links: Vec<RawLink>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(super) struct RawMetadata {
    #[serde(default)]
    pub(super) slug: String,
    #[serde(default)]
    pub(super) scan: String,
    #[serde(default)]
    pub(super) prompt: String,
    #[serde(default)]
    pub(super) prompt_tokens: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawNode {
    pub(super) node_id: String,
    #[serde(default)]
    pub(super) feature: Option<i64>,
    #[serde(default)]
    pub(super) layer: Value,
    #[serde(default)]
    pub(super) ctx_idx: i64,
    #[serde(default)]
    pub(super) feature_type: String,
    #[serde(default)]
    pub(super) clerp: Option<String>,
    #[serde(default)]
    pub(super) token_prob: f64,
    #[serde(default)]
    pub(super) is_target_logit: bool,
    #[serde(default)]
    pub(super) probe_location_idx: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawLink {
    pub(super) source: String,
    pub(super) target: String,
    #[serde(default)]
    pub(super) weight: f64,
}

pub(super) fn parse_graph_json(raw: &str) -> Result<RawGraph, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Layers arrive either as numbers or as strings such as `"E"`.
pub(super) fn layer_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(super) fn numeric_layer(layer: &str) -> Option<f64> {
    layer.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
