use serde::{Deserialize, Serialize};

use super::grouping::GroupingSession;

pub const MAX_PINNED_NODES: usize = 200;
pub const DEFAULT_SUPERNODE_LABEL: &str = "supernode";

/// One grouping tuple, serialized as `[label, ...memberIds]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SupernodeGroup {
    pub label: String,
    pub member_ids: Vec<String>,
}

impl SupernodeGroup {
    pub fn new(label: impl Into<String>, member_ids: Vec<String>) -> Self {
        Self {
            label: label.into(),
            member_ids,
        }
    }

    /// True when every declared member is contained in `ids`.
    pub fn members_within(&self, ids: &[String]) -> bool {
        self.member_ids.iter().all(|member| ids.contains(member))
    }
}

impl From<Vec<String>> for SupernodeGroup {
    fn from(mut tuple: Vec<String>) -> Self {
        if tuple.is_empty() {
            return Self::default();
        }
        let label = tuple.remove(0);
        Self {
            label,
            member_ids: tuple,
        }
    }
}

impl From<SupernodeGroup> for Vec<String> {
    fn from(group: SupernodeGroup) -> Self {
        let mut tuple = Vec::with_capacity(group.member_ids.len() + 1);
        tuple.push(group.label);
        tuple.extend(group.member_ids);
        tuple
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubgraphState {
    pub sticky: bool,
    pub dagrefy: bool,
    pub supernodes: Vec<SupernodeGroup>,
    #[serde(skip)]
    pub active_grouping: GroupingSession,
}

impl Default for SubgraphState {
    fn default() -> Self {
        Self {
            sticky: true,
            dagrefy: true,
            supernodes: Vec::new(),
            active_grouping: GroupingSession::default(),
        }
    }
}

/// A single write to host-owned view state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateUpdate {
    PinnedIds(Vec<String>),
    Hovered {
        feature_id: Option<String>,
        ctx_idx: Option<i64>,
    },
    Clicked {
        node_id: Option<String>,
        ctx_idx: Option<i64>,
    },
    EditMode(bool),
    HideLayer(bool),
    Subgraph(SubgraphState),
    SgPos(String),
    OgSgPos(String),
}

impl StateUpdate {
    pub fn field(&self) -> &'static str {
        match self {
            Self::PinnedIds(_) => "pinnedIds",
            Self::Hovered { .. } => "hoveredId",
            Self::Clicked { .. } => "clickedId",
            Self::EditMode(_) => "isEditMode",
            Self::HideLayer(_) => "isHideLayer",
            Self::Subgraph(_) => "subgraph",
            Self::SgPos(_) => "sgPos",
            Self::OgSgPos(_) => "ogSgPos",
        }
    }
}

/// Host-owned view state. Every write goes through [`ViewState::apply`] so the
/// host can observe it via [`ViewState::take_updates`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    pub pinned_ids: Vec<String>,
    pub hovered_id: Option<String>,
    pub hovered_ctx_idx: Option<i64>,
    pub clicked_id: Option<String>,
    pub clicked_ctx_idx: Option<i64>,
    pub is_edit_mode: bool,
    pub is_hide_layer: bool,
    pub subgraph: SubgraphState,
    pub sg_pos: String,
    pub og_sg_pos: String,
    #[serde(skip)]
    revision: u64,
    #[serde(skip)]
    pending: Vec<StateUpdate>,
}

impl ViewState {
    pub fn apply(&mut self, update: StateUpdate) {
        match &update {
            StateUpdate::PinnedIds(ids) => self.pinned_ids = ids.clone(),
            StateUpdate::Hovered {
                feature_id,
                ctx_idx,
            } => {
                self.hovered_id = feature_id.clone();
                self.hovered_ctx_idx = *ctx_idx;
            }
            StateUpdate::Clicked { node_id, ctx_idx } => {
                self.clicked_id = node_id.clone();
                self.clicked_ctx_idx = *ctx_idx;
            }
            StateUpdate::EditMode(enabled) => self.is_edit_mode = *enabled,
            StateUpdate::HideLayer(enabled) => self.is_hide_layer = *enabled,
            StateUpdate::Subgraph(subgraph) => self.subgraph = subgraph.clone(),
            StateUpdate::SgPos(payload) => self.sg_pos = payload.clone(),
            StateUpdate::OgSgPos(payload) => self.og_sg_pos = payload.clone(),
        }
        self.revision = self.revision.wrapping_add(1);
        self.pending.push(update);
    }

    pub fn take_updates(&mut self) -> Vec<StateUpdate> {
        std::mem::take(&mut self.pending)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pinned ids the subgraph is built from; anything past the cap is ignored.
    pub fn effective_pinned_ids(&self) -> &[String] {
        let end = self.pinned_ids.len().min(MAX_PINNED_NODES);
        &self.pinned_ids[..end]
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.effective_pinned_ids().iter().any(|pinned| pinned == id)
    }

    /// Pinned list with `id` toggled, or `None` when adding would exceed the cap.
    pub fn toggled_pins(&self, id: &str) -> Option<Vec<String>> {
        let mut pinned = self.pinned_ids.clone();
        if let Some(position) = pinned.iter().position(|pinned_id| pinned_id == id) {
            pinned.remove(position);
            return Some(pinned);
        }

        if pinned.len() >= MAX_PINNED_NODES {
            tracing::debug!(node_id = id, "pin limit reached; ignoring pin");
            return None;
        }

        pinned.push(id.to_owned());
        Some(pinned)
    }

    pub fn toggle_pin(&mut self, id: &str) {
        if let Some(pinned) = self.toggled_pins(id) {
            self.apply(StateUpdate::PinnedIds(pinned));
        }
    }

    pub fn update_subgraph(&mut self, update: impl FnOnce(&mut SubgraphState)) {
        let mut subgraph = self.subgraph.clone();
        update(&mut subgraph);
        if subgraph != self.subgraph {
            self.apply(StateUpdate::Subgraph(subgraph));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ids;

    #[test]
    fn pin_cap_ignores_extra_pins() {
        let mut state = ViewState::default();
        for index in 0..MAX_PINNED_NODES {
            state.toggle_pin(&format!("node-{index}"));
        }
        assert_eq!(state.pinned_ids.len(), MAX_PINNED_NODES);

        state.toggle_pin("node-overflow");
        assert_eq!(state.pinned_ids.len(), MAX_PINNED_NODES);
        assert!(!state.is_pinned("node-overflow"));

        state.toggle_pin("node-0");
        assert_eq!(state.pinned_ids.len(), MAX_PINNED_NODES - 1);
    }

    #[test]
    fn effective_pins_truncate_oversized_lists() {
        let state = ViewState {
            pinned_ids: (0..250).map(|index| format!("n{index}")).collect(),
            ..ViewState::default()
        };
        assert_eq!(state.effective_pinned_ids().len(), MAX_PINNED_NODES);
        assert!(state.is_pinned("n199"));
        assert!(!state.is_pinned("n200"));
    }

    #[test]
    fn writes_are_observable() {
        let mut state = ViewState::default();
        state.toggle_pin("a");
        state.apply(StateUpdate::SgPos("1,2".to_owned()));
        state.update_subgraph(|subgraph| subgraph.sticky = subgraph.sticky);

        assert_eq!(state.revision(), 2);
        let updates = state.take_updates();
        assert_eq!(
            updates,
            vec![
                StateUpdate::PinnedIds(ids(&["a"])),
                StateUpdate::SgPos("1,2".to_owned()),
            ]
        );
        assert!(state.take_updates().is_empty());
    }

    #[test]
    fn serializes_host_shape() {
        let mut state = ViewState {
            pinned_ids: ids(&["a", "b"]),
            sg_pos: "10,20,30,40".to_owned(),
            ..ViewState::default()
        };
        state.subgraph.supernodes = vec![SupernodeGroup::new("S", ids(&["a", "b"]))];
        state.subgraph.active_grouping.toggle("a");

        let json = serde_json::to_value(&state).expect("serializes");
        assert_eq!(json["pinnedIds"], serde_json::json!(["a", "b"]));
        assert_eq!(json["sgPos"], "10,20,30,40");
        assert_eq!(json["subgraph"]["supernodes"], serde_json::json!([["S", "a", "b"]]));
        assert!(json["subgraph"].get("activeGrouping").is_none());

        let restored: ViewState = serde_json::from_value(json).expect("deserializes");
        assert_eq!(restored.subgraph.supernodes, state.subgraph.supernodes);
        assert!(restored.subgraph.sticky);
        assert!(!restored.subgraph.active_grouping.is_active);
    }

    #[test]
    fn empty_tuple_becomes_empty_group() {
        let group = SupernodeGroup::from(Vec::new());
        assert!(group.label.is_empty());
        assert!(group.member_ids.is_empty());
    }
}
