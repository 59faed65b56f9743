use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Feature,
    Embedding,
    Error,
    Logit,
}

impl NodeKind {
    pub fn from_feature_type(feature_type: &str) -> Self {
        if feature_type == "embedding" {
            Self::Embedding
        } else if feature_type == "logit" {
            Self::Logit
        } else if feature_type.contains("error") {
            Self::Error
        } else {
            Self::Feature
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Embedding => "embedding",
            Self::Error => "error",
            Self::Logit => "logit",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub node_id: String,
    /// Shared by occurrences of the same feature; includes the context index.
    pub feature_id: String,
    pub feature_index: i64,
    pub kind: NodeKind,
    pub feature_type: String,
    pub layer: String,
    pub ctx_index: i64,
    pub ctx_from_end: i64,
    pub probe_location_index: Option<i64>,
    pub layer_stream_index: f64,
    pub ranked_stream_index: f64,
    pub label: String,
    pub token_prob: f64,
    pub is_target_logit: bool,
    pub input_abs_sum: f64,
    pub input_error: f64,
    pub pct_input_error: f64,
}

impl Node {
    /// Vertical layout hint. Hidden-layer graphs use the ordinal stream rank.
    pub fn stream_index(&self, hide_layer: bool) -> f64 {
        if hide_layer {
            self.ranked_stream_index
        } else {
            self.layer_stream_index
        }
    }

    pub fn numeric_layer(&self) -> Option<f64> {
        super::parse::numeric_layer(&self.layer)
    }
}

#[derive(Clone, Debug)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    /// `weight / target.input_abs_sum`, or 0 when the target has no input.
    pub pct_input: f64,
}

#[derive(Clone, Debug, Default)]
pub struct GraphMetadata {
    pub slug: String,
    pub scan: String,
    pub prompt: String,
    pub prompt_tokens: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Clone, Debug)]
pub struct AttributionGraph {
    pub metadata: GraphMetadata,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    index_by_id: HashMap<String, usize>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
}

impl AttributionGraph {
    pub(super) fn from_parts(metadata: GraphMetadata, nodes: Vec<Node>, links: Vec<Link>) -> Self {
        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            index_by_id.entry(node.node_id.clone()).or_insert(index);
        }

        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (link_index, link) in links.iter().enumerate() {
            if link.source < nodes.len() && link.target < nodes.len() {
                outgoing[link.source].push(link_index);
                incoming[link.target].push(link_index);
            }
        }

        Self {
            metadata,
            nodes,
            links,
            index_by_id,
            incoming,
            outgoing,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.node_index(id).map(|index| &self.nodes[index])
    }

    /// Link indices entering `node_index`.
    pub fn incoming_links(&self, node_index: usize) -> &[usize] {
        self.incoming.get(node_index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn outgoing_links(&self, node_index: usize) -> &[usize] {
        self.outgoing.get(node_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Links touching `id` paired with the node on the other end.
    pub fn neighbors_of<'a>(
        &'a self,
        id: &str,
        direction: Direction,
    ) -> impl Iterator<Item = (&'a Link, &'a Node)> + use<'a> {
        let adjacency = match (self.node_index(id), direction) {
            (Some(index), Direction::Incoming) => self.incoming_links(index),
            (Some(index), Direction::Outgoing) => self.outgoing_links(index),
            (None, _) => &[],
        };

        adjacency.iter().map(move |&link_index| {
            let link = &self.links[link_index];
            let other = match direction {
                Direction::Incoming => link.source,
                Direction::Outgoing => link.target,
            };
            (link, &self.nodes[other])
        })
    }
}
