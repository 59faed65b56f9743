use std::collections::BTreeMap;

use super::{LayoutLink, LayoutNode};

const SOURCE_SLOT_WIDTH: f32 = 8.0;
const TARGET_SLOT_WIDTH: f32 = 3.0;
const MAX_VISIBLE_SLOTS: usize = 4;

/// Horizontal attachment offsets for one drawn link.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortOffsets {
    pub source_x: f32,
    pub target_x: f32,
}

/// Spreads links sharing an endpoint across that node's edge so parallel
/// strokes do not overlap. Outgoing links are ordered by angle towards their
/// target, incoming links by negated angle from their source.
pub fn link_port_offsets(nodes: &[LayoutNode], links: &[LayoutLink]) -> Vec<PortOffsets> {
    let mut offsets = vec![PortOffsets::default(); links.len()];

    let mut by_source = BTreeMap::<usize, Vec<usize>>::new();
    let mut by_target = BTreeMap::<usize, Vec<usize>>::new();
    for (index, link) in links.iter().enumerate() {
        by_source.entry(link.source).or_default().push(index);
        by_target.entry(link.target).or_default().push(index);
    }

    for (source, mut group) in by_source {
        let origin = nodes[source].pos;
        let slots = nodes[source].member_count.clamp(1, MAX_VISIBLE_SLOTS) as f32;
        let total_width = slots * SOURCE_SLOT_WIDTH;
        group.sort_by(|&a, &b| {
            let angle_a = (nodes[links[a].target].pos - origin).angle();
            let angle_b = (nodes[links[b].target].pos - origin).angle();
            angle_a.total_cmp(&angle_b)
        });
        for (slot, &link_index) in group.iter().enumerate() {
            offsets[link_index].source_x = spread(slot, group.len(), total_width);
        }
    }

    for (target, mut group) in by_target {
        let origin = nodes[target].pos;
        let slots = nodes[target].member_count.clamp(1, MAX_VISIBLE_SLOTS) as f32;
        let total_width = (slots + 1.0) * TARGET_SLOT_WIDTH;
        group.sort_by(|&a, &b| {
            let angle_a = -(nodes[links[a].source].pos - origin).angle();
            let angle_b = -(nodes[links[b].source].pos - origin).angle();
            angle_a.total_cmp(&angle_b)
        });
        for (slot, &link_index) in group.iter().enumerate() {
            offsets[link_index].target_x = spread(slot, group.len(), total_width);
        }
    }

    offsets
}

fn spread(slot: usize, count: usize, total_width: f32) -> f32 {
    let count = count as f32;
    (slot as f32 - count / 2.0) * total_width / count
}
