use serde::{Deserialize, Serialize};

use super::reduce::ReducedGraph;
use super::state::{DEFAULT_SUPERNODE_LABEL, SupernodeGroup};

/// Pending selection while the grouping modifier is held.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingSession {
    pub is_active: bool,
    pub selected_node_ids: Vec<String>,
}

impl GroupingSession {
    pub fn begin(&mut self) {
        self.is_active = true;
        self.selected_node_ids.clear();
    }

    /// Adds or removes `id` from the pending selection.
    pub fn toggle(&mut self, id: &str) {
        self.is_active = true;
        if let Some(position) = self.selected_node_ids.iter().position(|selected| selected == id) {
            self.selected_node_ids.remove(position);
        } else {
            self.selected_node_ids.push(id.to_owned());
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_node_ids.iter().any(|selected| selected == id)
    }

    pub fn reset(&mut self) {
        self.is_active = false;
        self.selected_node_ids.clear();
    }
}

/// Outcome of releasing the grouping modifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupingOutcome {
    Committed {
        supernodes: Vec<SupernodeGroup>,
        label: String,
    },
    Discarded,
}

/// Folds the pending selection into the grouping definition.
///
/// Selected supernodes expand to their declared members and their tuples are
/// replaced by the merged one. Selections of one node or fewer are discarded.
pub fn commit_selection(
    selected: &[String],
    supernodes: &[SupernodeGroup],
    reduced: &ReducedGraph,
) -> GroupingOutcome {
    if selected.len() <= 1 {
        return GroupingOutcome::Discarded;
    }

    let mut member_ids = Vec::<String>::new();
    let mut replaced = Vec::<&SupernodeGroup>::new();
    let mut supernode_label = None;

    for id in selected {
        let Some(declared) = reduced
            .node(id)
            .and_then(|node| node.supernode.as_ref())
            .map(|supernode| supernode.declared_member_ids.as_slice())
        else {
            member_ids.push(id.clone());
            continue;
        };

        if let Some(node) = reduced.node(id) {
            supernode_label = Some(node.label.clone());
        }
        if let Some(group) = supernodes.iter().find(|group| group.members_within(declared)) {
            replaced.push(group);
        }
        member_ids.extend(declared.iter().cloned());
    }

    let label = supernode_label
        .filter(|label| !label.is_empty())
        .or_else(|| {
            member_ids
                .iter()
                .filter_map(|id| reduced.display_label(id))
                .find(|label| !label.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| DEFAULT_SUPERNODE_LABEL.to_owned());

    let mut unique = Vec::with_capacity(member_ids.len());
    for id in member_ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }

    let mut next = supernodes
        .iter()
        .filter(|group| {
            !replaced
                .iter()
                .any(|removed| group.members_within(&removed.member_ids))
        })
        .cloned()
        .collect::<Vec<_>>();
    next.push(SupernodeGroup::new(label.clone(), unique));

    GroupingOutcome::Committed {
        supernodes: next,
        label,
    }
}

/// Drops every tuple whose members all belong to `member_ids`.
pub fn ungroup(supernodes: &[SupernodeGroup], member_ids: &[String]) -> Vec<SupernodeGroup> {
    supernodes
        .iter()
        .filter(|group| !group.members_within(member_ids))
        .cloned()
        .collect()
}

/// Relabels the first tuple whose members all belong to `member_ids`.
/// Returns `None` when no tuple matches.
pub fn rename(
    supernodes: &[SupernodeGroup],
    member_ids: &[String],
    label: &str,
) -> Option<Vec<SupernodeGroup>> {
    let index = supernodes
        .iter()
        .position(|group| group.members_within(member_ids))?;
    let label = if label.trim().is_empty() {
        DEFAULT_SUPERNODE_LABEL
    } else {
        label
    };

    let mut next = supernodes.to_vec();
    next[index].label = label.to_owned();
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::reduce::reduce;
    use crate::test_utils::{ids, three_node_graph};

    fn committed(outcome: GroupingOutcome) -> Vec<SupernodeGroup> {
        match outcome {
            GroupingOutcome::Committed { supernodes, .. } => supernodes,
            GroupingOutcome::Discarded => panic!("expected a commit"),
        }
    }

    #[test]
    fn grouping_round_trip_replaces_merged_tuple() {
        let graph = three_node_graph();
        let pinned = ids(&["n1", "n2", "n3"]);

        let reduced = reduce(&graph, &pinned, &[], false);
        let first = committed(commit_selection(&ids(&["n1", "n2"]), &[], &reduced));
        assert_eq!(first, vec![SupernodeGroup::new("alpha", ids(&["n1", "n2"]))]);

        let reduced = reduce(&graph, &pinned, &first, false);
        let supernode_id = reduced.owner_of("n1").expect("n1 grouped").to_owned();
        let second = committed(commit_selection(
            &vec![supernode_id, "n3".to_owned()],
            &first,
            &reduced,
        ));
        assert_eq!(
            second,
            vec![SupernodeGroup::new("alpha", ids(&["n1", "n2", "n3"]))]
        );
    }

    #[test]
    fn small_selection_is_discarded() {
        let graph = three_node_graph();
        let reduced = reduce(&graph, &ids(&["n1", "n2"]), &[], false);
        assert_eq!(
            commit_selection(&ids(&["n1"]), &[], &reduced),
            GroupingOutcome::Discarded
        );
        assert_eq!(
            commit_selection(&[], &[], &reduced),
            GroupingOutcome::Discarded
        );
    }

    #[test]
    fn label_falls_back_to_default() {
        let graph = three_node_graph();
        let reduced = reduce(&graph, &[], &[], false);
        let supernodes = committed(commit_selection(&ids(&["x", "y"]), &[], &reduced));
        assert_eq!(supernodes[0].label, DEFAULT_SUPERNODE_LABEL);
        assert_eq!(supernodes[0].member_ids, ids(&["x", "y"]));
    }

    #[test]
    fn merged_ids_are_deduplicated() {
        let graph = three_node_graph();
        let pinned = ids(&["n1", "n2", "n3"]);
        let existing = vec![
            SupernodeGroup::new("left", ids(&["n1", "n2"])),
            SupernodeGroup::new("right", ids(&["n2", "n3"])),
        ];
        let reduced = reduce(&graph, &pinned, &existing, false);
        let merged = committed(commit_selection(&ids(&["left", "right"]), &existing, &reduced));

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].label, "right");
        assert_eq!(merged[0].member_ids, ids(&["n1", "n2", "n3"]));
    }

    #[test]
    fn ungroup_and_rename_match_by_members() {
        let supernodes = vec![
            SupernodeGroup::new("a", ids(&["n1", "n2"])),
            SupernodeGroup::new("b", ids(&["n3"])),
        ];

        let remaining = ungroup(&supernodes, &ids(&["n1", "n2"]));
        assert_eq!(remaining, vec![SupernodeGroup::new("b", ids(&["n3"]))]);

        let renamed = rename(&supernodes, &ids(&["n3"]), "").expect("tuple found");
        assert_eq!(renamed[1].label, DEFAULT_SUPERNODE_LABEL);
        let renamed = rename(&supernodes, &ids(&["n2", "n1"]), "pair").expect("tuple found");
        assert_eq!(renamed[0].label, "pair");
        assert!(rename(&supernodes, &ids(&["zzz"]), "x").is_none());
    }

    #[test]
    fn session_toggles_membership() {
        let mut session = GroupingSession::default();
        session.begin();
        session.toggle("a");
        session.toggle("b");
        session.toggle("a");
        assert!(session.is_active);
        assert_eq!(session.selected_node_ids, ids(&["b"]));

        session.reset();
        assert!(!session.is_active);
        assert!(session.selected_node_ids.is_empty());
    }
}
