use std::collections::{HashMap, HashSet};

use crate::graph::AttributionGraph;

use super::state::{MAX_PINNED_NODES, SupernodeGroup};

/// Per-member view of a reduced node. Ungrouped nodes are their own single
/// member.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberInfo {
    pub graph_index: usize,
    pub node_id: String,
    pub feature_id: String,
    pub display_label: String,
    /// Incoming |weight| from sources outside this member's supernode.
    pub input_abs_sum_external: f64,
    /// Share of the reduced node's external input owed to this member.
    pub input_weighting: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SupernodeInfo {
    pub tuple_index: usize,
    /// Member ids exactly as written in the grouping tuple, dangling ones
    /// included.
    pub declared_member_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReducedNode {
    pub node_id: String,
    pub feature_id: String,
    pub label: String,
    pub layer: String,
    pub ctx_index: f64,
    pub stream_index: f64,
    pub input_abs_sum: f64,
    pub input_abs_sum_external: f64,
    pub members: Vec<MemberInfo>,
    pub supernode: Option<SupernodeInfo>,
}

impl ReducedNode {
    pub fn is_supernode(&self) -> bool {
        self.supernode.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReducedLink {
    pub source: String,
    pub target: String,
    pub source_index: usize,
    pub target_index: usize,
    pub weight: f64,
    pub pct_input: f64,
    /// Indices into the full graph's links folded into this one.
    pub original_links: Vec<usize>,
}

/// Links touching the clicked reduced node, keyed for member and neighbour
/// styling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClickHighlights {
    /// Member node id on the far side mapped to the original link index.
    pub member_links: HashMap<String, usize>,
    /// Neighbouring reduced node id mapped to the reduced link index.
    pub neighbor_links: HashMap<String, usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReducedGraph {
    pub nodes: Vec<ReducedNode>,
    pub links: Vec<ReducedLink>,
    index_by_id: HashMap<String, usize>,
    owner_by_member: HashMap<String, usize>,
}

impl ReducedGraph {
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&ReducedNode> {
        self.node_index(id).map(|index| &self.nodes[index])
    }

    /// Reduced node id that renders the given pinned graph node.
    pub fn owner_of(&self, member_id: &str) -> Option<&str> {
        self.owner_by_member
            .get(member_id)
            .map(|&index| self.nodes[index].node_id.as_str())
    }

    pub fn member(&self, member_id: &str) -> Option<&MemberInfo> {
        let owner = &self.nodes[*self.owner_by_member.get(member_id)?];
        owner.members.iter().find(|member| member.node_id == member_id)
    }

    /// Label shown for a pinned node or a reduced node id.
    pub fn display_label(&self, id: &str) -> Option<&str> {
        if let Some(member) = self.member(id) {
            return Some(member.display_label.as_str());
        }
        self.node(id).map(|node| node.label.as_str())
    }

    pub fn click_highlights(&self, graph: &AttributionGraph, clicked_id: &str) -> ClickHighlights {
        let mut highlights = ClickHighlights::default();
        for (link_index, link) in self.links.iter().enumerate() {
            let outgoing = link.source == clicked_id;
            let incoming = link.target == clicked_id;
            if !outgoing && !incoming {
                continue;
            }

            for &original in &link.original_links {
                let original_link = &graph.links[original];
                let far_side = if outgoing {
                    original_link.target
                } else {
                    original_link.source
                };
                highlights
                    .member_links
                    .insert(graph.nodes[far_side].node_id.clone(), original);
            }

            let neighbor = if outgoing { &link.target } else { &link.source };
            highlights.neighbor_links.insert(neighbor.clone(), link_index);
        }
        highlights
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator != 0.0 && denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

struct PendingSupernode {
    node_id: String,
    tuple_index: usize,
    label: String,
    declared_member_ids: Vec<String>,
    members: Vec<usize>,
}

/// Folds the pinned part of `graph` and the grouping definition into the
/// reduced node and link lists. Pure: identical inputs give identical output.
pub fn reduce(
    graph: &AttributionGraph,
    pinned_ids: &[String],
    supernodes: &[SupernodeGroup],
    hide_layer: bool,
) -> ReducedGraph {
    let pinned_set = pinned_ids
        .iter()
        .take(MAX_PINNED_NODES)
        .filter_map(|id| graph.node_index(id))
        .collect::<HashSet<_>>();
    let pinned = (0..graph.node_count())
        .filter(|index| pinned_set.contains(index))
        .collect::<Vec<_>>();

    let mut taken_ids = pinned
        .iter()
        .map(|&index| graph.nodes[index].node_id.clone())
        .collect::<HashSet<_>>();

    let mut supernode_of = HashMap::<usize, usize>::new();
    let mut pending = Vec::<PendingSupernode>::new();
    for (tuple_index, group) in supernodes.iter().enumerate() {
        let mut members = Vec::new();
        for member_id in &group.member_ids {
            let Some(index) = graph.node_index(member_id) else {
                continue;
            };
            if !pinned_set.contains(&index) || supernode_of.contains_key(&index) {
                continue;
            }
            supernode_of.insert(index, pending.len());
            members.push(index);
        }

        if members.is_empty() {
            tracing::debug!(label = %group.label, "dropping supernode without pinned members");
            continue;
        }

        let node_id = unique_supernode_id(&group.label, tuple_index, &taken_ids);
        taken_ids.insert(node_id.clone());
        pending.push(PendingSupernode {
            node_id,
            tuple_index,
            label: group.label.clone(),
            declared_member_ids: group.member_ids.clone(),
            members,
        });
    }

    let mut display_labels = pinned
        .iter()
        .map(|&index| (index, graph.nodes[index].label.clone()))
        .collect::<HashMap<_, _>>();
    for supernode in &pending {
        if let [only] = supernode.members.as_slice()
            && graph.nodes[*only].label == supernode.label
        {
            continue;
        }
        for &index in &supernode.members {
            let source_label = &graph.nodes[index].label;
            let display = if *source_label == supernode.label {
                format!("[{}]", supernode.label)
            } else {
                format!("[{}] {source_label}", supernode.label)
            };
            display_labels.insert(index, display);
        }
    }

    let mut external = HashMap::with_capacity(pinned.len());
    let mut weighting = HashMap::with_capacity(pinned.len());
    for &index in &pinned {
        let own_group = supernode_of.get(&index);
        let input_external = graph
            .incoming_links(index)
            .iter()
            .map(|&link_index| &graph.links[link_index])
            .filter(|link| match supernode_of.get(&link.source) {
                None => true,
                Some(group) => Some(group) != own_group,
            })
            .map(|link| link.weight.abs())
            .sum::<f64>();
        external.insert(index, input_external);
        weighting.insert(
            index,
            ratio(input_external, graph.nodes[index].input_abs_sum),
        );
    }

    let member_info = |index: usize, weighting: f64| {
        let node = &graph.nodes[index];
        MemberInfo {
            graph_index: index,
            node_id: node.node_id.clone(),
            feature_id: node.feature_id.clone(),
            display_label: display_labels.get(&index).cloned().unwrap_or_default(),
            input_abs_sum_external: external.get(&index).copied().unwrap_or(0.0),
            input_weighting: weighting,
        }
    };

    let mut nodes = Vec::with_capacity(pinned.len());
    for &index in pinned.iter().filter(|index| !supernode_of.contains_key(index)) {
        let node = &graph.nodes[index];
        let member = member_info(index, weighting.get(&index).copied().unwrap_or(0.0));
        nodes.push(ReducedNode {
            node_id: node.node_id.clone(),
            feature_id: node.feature_id.clone(),
            label: member.display_label.clone(),
            layer: node.layer.clone(),
            ctx_index: node.ctx_index as f64,
            stream_index: node.stream_index(hide_layer),
            input_abs_sum: node.input_abs_sum,
            input_abs_sum_external: member.input_abs_sum_external,
            members: vec![member],
            supernode: None,
        });
    }

    for supernode in pending {
        let members = supernode
            .members
            .iter()
            .map(|&index| member_info(index, weighting.get(&index).copied().unwrap_or(0.0)))
            .collect::<Vec<_>>();
        let member_nodes = || supernode.members.iter().map(|&index| &graph.nodes[index]);

        nodes.push(ReducedNode {
            node_id: supernode.node_id,
            feature_id: format!("supernode-{}", supernode.tuple_index),
            label: supernode.label,
            layer: mean(member_nodes().filter_map(|node| node.numeric_layer()))
                .map(|layer| layer.to_string())
                .unwrap_or_default(),
            ctx_index: mean(member_nodes().map(|node| node.ctx_index as f64)).unwrap_or(0.0),
            stream_index: mean(member_nodes().map(|node| node.stream_index(hide_layer)))
                .unwrap_or(0.0),
            input_abs_sum: member_nodes().map(|node| node.input_abs_sum).sum(),
            input_abs_sum_external: members
                .iter()
                .map(|member| member.input_abs_sum_external)
                .sum(),
            members,
            supernode: Some(SupernodeInfo {
                tuple_index: supernode.tuple_index,
                declared_member_ids: supernode.declared_member_ids,
            }),
        });
    }

    for node in &mut nodes {
        let total = node
            .members
            .iter()
            .map(|member| member.input_weighting)
            .sum::<f64>();
        if total > 0.0 {
            for member in &mut node.members {
                member.input_weighting /= total;
            }
        }
    }

    let index_by_id = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.node_id.clone(), index))
        .collect::<HashMap<_, _>>();
    let mut owner_by_member = HashMap::new();
    let mut member_weighting = HashMap::new();
    for (node_index, node) in nodes.iter().enumerate() {
        for member in &node.members {
            owner_by_member.insert(member.node_id.clone(), node_index);
            member_weighting.insert(member.graph_index, member.input_weighting);
        }
    }

    let links = reduce_links(graph, &pinned_set, &nodes, &owner_by_member, |target| {
        let external = external.get(&target).copied().unwrap_or(0.0);
        let weighting = member_weighting.get(&target).copied().unwrap_or(0.0);
        (external, weighting)
    });

    ReducedGraph {
        nodes,
        links,
        index_by_id,
        owner_by_member,
    }
}

fn unique_supernode_id(label: &str, tuple_index: usize, taken: &HashSet<String>) -> String {
    if !label.is_empty() && !taken.contains(label) {
        return label.to_owned();
    }

    let base = format!("supernode-{tuple_index}");
    let mut candidate = base.clone();
    let mut suffix = 1;
    while taken.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    candidate
}

fn reduce_links(
    graph: &AttributionGraph,
    pinned: &HashSet<usize>,
    nodes: &[ReducedNode],
    owner_by_member: &HashMap<String, usize>,
    target_terms: impl Fn(usize) -> (f64, f64),
) -> Vec<ReducedLink> {
    let mut grouped = Vec::<ReducedLink>::new();
    let mut slot_by_pair = HashMap::<(usize, usize), usize>::new();

    for (link_index, link) in graph.links.iter().enumerate() {
        if !pinned.contains(&link.source) || !pinned.contains(&link.target) {
            continue;
        }

        let owner = |index: usize| owner_by_member.get(&graph.nodes[index].node_id).copied();
        let (Some(source), Some(target)) = (owner(link.source), owner(link.target)) else {
            continue;
        };

        let (external, weighting) = target_terms(link.target);
        let contribution = if external != 0.0 {
            link.weight / external * weighting
        } else {
            0.0
        };

        let slot = *slot_by_pair.entry((source, target)).or_insert_with(|| {
            grouped.push(ReducedLink {
                source: nodes[source].node_id.clone(),
                target: nodes[target].node_id.clone(),
                source_index: source,
                target_index: target,
                weight: 0.0,
                pct_input: 0.0,
                original_links: Vec::new(),
            });
            grouped.len() - 1
        });
        let reduced = &mut grouped[slot];
        reduced.weight += contribution;
        reduced.original_links.push(link_index);
    }

    let mut links = grouped
        .into_iter()
        .filter(|link| link.source_index != link.target_index)
        .map(|mut link| {
            link.pct_input = link.weight;
            link
        })
        .collect::<Vec<_>>();
    links.sort_by(|a, b| a.weight.abs().total_cmp(&b.weight.abs()));
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::test_utils::{ids, three_node_graph};
    use proptest::prelude::*;

    fn link_weight(reduced: &ReducedGraph, source: &str, target: &str) -> Option<f64> {
        reduced
            .links
            .iter()
            .find(|link| link.source == source && link.target == target)
            .map(|link| link.weight)
    }

    #[test]
    fn ungrouped_pins_keep_every_link() {
        let graph = three_node_graph();
        let reduced = reduce(&graph, &ids(&["n1", "n2", "n3"]), &[], false);

        assert_eq!(reduced.nodes.len(), 3);
        assert_eq!(reduced.links.len(), 3);
        for link in &reduced.links {
            assert!(link.pct_input.is_finite());
        }

        let n1_n2 = link_weight(&reduced, "n1", "n2").expect("n1->n2");
        let n2_n3 = link_weight(&reduced, "n2", "n3").expect("n2->n3");
        let n1_n3 = link_weight(&reduced, "n1", "n3").expect("n1->n3");
        assert!((n1_n2 - 1.0).abs() < 1e-12);
        assert!((n2_n3 + 0.75).abs() < 1e-12);
        assert!((n1_n3 - 0.25).abs() < 1e-12);

        let order = reduced
            .links
            .iter()
            .map(|link| (link.source.as_str(), link.target.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![("n1", "n3"), ("n2", "n3"), ("n1", "n2")]);
    }

    #[test]
    fn grouped_pair_folds_into_one_link() {
        let graph = three_node_graph();
        let grouping = vec![SupernodeGroup::new("S", ids(&["n1", "n2"]))];
        let reduced = reduce(&graph, &ids(&["n1", "n2", "n3"]), &grouping, false);

        let node_ids = reduced
            .nodes
            .iter()
            .map(|node| node.node_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(node_ids, vec!["n3", "S"]);
        assert_eq!(reduced.links.len(), 1);

        let weight = link_weight(&reduced, "S", "n3").expect("S->n3");
        assert!((weight - (-0.3 / 0.4 + 0.1 / 0.4)).abs() < 1e-12);
        assert!(link_weight(&reduced, "S", "S").is_none());
        assert_eq!(reduced.links[0].original_links.len(), 2);

        let supernode = reduced.node("S").expect("S");
        assert_eq!(supernode.ctx_index, 0.5);
        assert_eq!(supernode.stream_index, 0.5);
        assert_eq!(supernode.layer, "0.5");
        assert!((supernode.input_abs_sum - 0.5).abs() < 1e-12);
        assert_eq!(supernode.input_abs_sum_external, 0.0);
        assert_eq!(reduced.owner_of("n2"), Some("S"));
        assert_eq!(reduced.display_label("n1"), Some("[S] alpha"));
    }

    #[test]
    fn label_colliding_with_node_id_gets_synthetic_id() {
        let graph = three_node_graph();
        let grouping = vec![
            SupernodeGroup::new("n3", ids(&["n1", "n2"])),
            SupernodeGroup::new("ghost", ids(&["missing"])),
        ];
        let reduced = reduce(&graph, &ids(&["n1", "n2", "n3"]), &grouping, false);

        assert!(reduced.node("supernode-0").is_some());
        assert!(reduced.node("ghost").is_none());
        assert_eq!(reduced.nodes.len(), 2);
    }

    #[test]
    fn members_belong_to_first_claiming_supernode() {
        let graph = three_node_graph();
        let grouping = vec![
            SupernodeGroup::new("A", ids(&["n1", "n2"])),
            SupernodeGroup::new("B", ids(&["n2", "n3"])),
        ];
        let reduced = reduce(&graph, &ids(&["n1", "n2", "n3"]), &grouping, false);

        assert_eq!(reduced.node("A").expect("A").members.len(), 2);
        let members = &reduced.node("B").expect("B").members;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].node_id, "n3");
        assert_eq!(
            reduced.node("B").expect("B").supernode.as_ref().map(|info| info.declared_member_ids.clone()),
            Some(ids(&["n2", "n3"]))
        );
    }

    #[test]
    fn single_member_with_same_label_keeps_plain_label() {
        let graph = three_node_graph();
        let grouping = vec![SupernodeGroup::new("gamma", ids(&["n3"]))];
        let reduced = reduce(&graph, &ids(&["n3"]), &grouping, false);
        assert_eq!(reduced.display_label("n3"), Some("gamma"));
    }

    #[test]
    fn unpinned_and_unknown_ids_are_ignored() {
        let graph = three_node_graph();
        let reduced = reduce(&graph, &ids(&["n1", "nope", "n3"]), &[], false);
        assert_eq!(reduced.nodes.len(), 2);
        assert_eq!(reduced.links.len(), 1);
        assert!(link_weight(&reduced, "n1", "n3").is_some());
    }

    #[test]
    fn click_highlights_reach_far_side_members() {
        let graph = three_node_graph();
        let grouping = vec![SupernodeGroup::new("S", ids(&["n1", "n2"]))];
        let reduced = reduce(&graph, &ids(&["n1", "n2", "n3"]), &grouping, false);

        let highlights = reduced.click_highlights(&graph, "n3");
        assert!(highlights.member_links.contains_key("n1"));
        assert!(highlights.member_links.contains_key("n2"));
        assert_eq!(highlights.neighbor_links.get("S"), Some(&0));

        assert_eq!(reduced.click_highlights(&graph, "n1"), ClickHighlights::default());
    }

    fn graph_json(node_count: usize, links: &[(usize, usize, f64)]) -> String {
        let nodes = (0..node_count)
            .map(|index| {
                serde_json::json!({
                    "node_id": format!("n{index}"),
                    "feature": index,
                    "layer": (index % 3).to_string(),
                    "ctx_idx": index % 4,
                    "feature_type": "cross layer transcoder",
                    "clerp": format!("f{index}"),
                })
            })
            .collect::<Vec<_>>();
        let links = links
            .iter()
            .filter(|(source, target, _)| source != target)
            .map(|(source, target, weight)| {
                serde_json::json!({
                    "source": format!("n{source}"),
                    "target": format!("n{target}"),
                    "weight": weight,
                })
            })
            .collect::<Vec<_>>();
        serde_json::json!({ "nodes": nodes, "links": links }).to_string()
    }

    fn reducer_inputs()
    -> impl Strategy<Value = (String, Vec<String>, Vec<SupernodeGroup>)> {
        (2usize..9).prop_flat_map(|node_count| {
            let links = prop::collection::vec(
                (0..node_count, 0..node_count, -2.0f64..2.0),
                0..20,
            );
            let pinned = prop::collection::vec(0..node_count, 0..node_count);
            let groups = prop::collection::vec(
                prop::collection::vec(0..node_count + 2, 0..4),
                0..3,
            );
            (Just(node_count), links, pinned, groups).prop_map(
                |(node_count, links, pinned, groups)| {
                    let pinned = pinned.into_iter().map(|index| format!("n{index}")).collect();
                    let groups = groups
                        .into_iter()
                        .enumerate()
                        .map(|(index, members)| {
                            SupernodeGroup::new(
                                format!("g{index}"),
                                members.into_iter().map(|member| format!("n{member}")).collect(),
                            )
                        })
                        .collect();
                    (graph_json(node_count, &links), pinned, groups)
                },
            )
        })
    }

    proptest! {
        #[test]
        fn reduction_is_idempotent((json, pinned, groups) in reducer_inputs()) {
            let graph = build_graph(&json).expect("generated graph is valid");
            let first = reduce(&graph, &pinned, &groups, false);
            let second = reduce(&graph, &pinned, &groups, false);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn reduction_has_no_self_links((json, pinned, groups) in reducer_inputs()) {
            let graph = build_graph(&json).expect("generated graph is valid");
            let reduced = reduce(&graph, &pinned, &groups, false);
            for link in &reduced.links {
                prop_assert_ne!(&link.source, &link.target);
                prop_assert!(link.weight.is_finite());
            }
        }

        #[test]
        fn member_weightings_normalize((json, pinned, groups) in reducer_inputs()) {
            let graph = build_graph(&json).expect("generated graph is valid");
            let reduced = reduce(&graph, &pinned, &groups, false);
            for node in &reduced.nodes {
                let total = node.members.iter().map(|member| member.input_weighting).sum::<f64>();
                prop_assert!(total == 0.0 || (total - 1.0).abs() < 1e-9, "weighting sum {}", total);
            }
        }

        #[test]
        fn each_member_has_one_owner((json, pinned, groups) in reducer_inputs()) {
            let graph = build_graph(&json).expect("generated graph is valid");
            let reduced = reduce(&graph, &pinned, &groups, false);
            let mut seen = HashSet::new();
            for node in &reduced.nodes {
                prop_assert!(!node.members.is_empty());
                for member in &node.members {
                    prop_assert!(seen.insert(member.node_id.clone()));
                    prop_assert!(pinned.contains(&member.node_id));
                }
            }
        }
    }
}
