use eframe::egui::{Vec2, vec2};

const QUADTREE_LEAF_CAPACITY: usize = 12;
const QUADTREE_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    /// Smallest padded square around `points`, or `None` when any coordinate
    /// is not finite.
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), point| (min.min(*point), max.max(*point)),
        );
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }

        let span = (max - min).max(Vec2::splat(1.0));
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span.max_elem() * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half_extent && offset.y <= self.half_extent
    }

    /// True when the square overlaps the axis-aligned box of `radius` around `point`.
    pub(super) fn touches(self, point: Vec2, radius: f32) -> bool {
        let offset = (point - self.center).abs();
        let reach = self.half_extent + radius;
        offset.x <= reach && offset.y <= reach
    }

    /// Quadrants are numbered with bit 0 for the right half and bit 1 for the
    /// lower half.
    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let sign = |bit: usize| if quadrant & bit == 0 { -1.0 } else { 1.0 };
        Self {
            center: self.center + vec2(sign(1), sign(2)) * quarter,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }
}

/// Barnes-Hut cell. Every point carries unit mass, so a cell's charge is
/// `mass * strength` for a uniform per-node strength.
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions)?;
        let indices = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, positions, 0))
    }

    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        depth: usize,
    ) -> Self {
        let mass = indices.len() as f32;
        let sum = indices
            .iter()
            .fold(Vec2::ZERO, |sum, &index| sum + positions[index]);
        let center_of_mass = if mass > 0.0 { sum / mass } else { sum };

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            buckets[bounds.quadrant_for(positions[index])].push(index);
        }

        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }

            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }

    /// Indices stored in leaves whose cell lies within `radius` of `point`.
    pub(super) fn collect_near(&self, point: Vec2, radius: f32, out: &mut Vec<usize>) {
        if !self.bounds.touches(point, radius) {
            return;
        }

        if self.is_leaf() {
            out.extend_from_slice(&self.indices);
            return;
        }

        for child in self.children.iter().flatten() {
            child.collect_near(point, radius, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_past_leaf_capacity() {
        let positions = (0..40)
            .map(|index| vec2((index % 8) as f32 * 50.0, (index / 8) as f32 * 50.0))
            .collect::<Vec<_>>();
        let tree = QuadNode::build(&positions).expect("finite points");

        assert!(!tree.is_leaf());
        assert_eq!(tree.mass, 40.0);
        assert!(tree.bounds.contains(positions[39]));
    }

    #[test]
    fn near_query_prunes_distant_cells() {
        let mut positions = (0..20).map(|index| vec2(index as f32, 0.0)).collect::<Vec<_>>();
        positions.extend((0..20).map(|index| vec2(1_000.0 + index as f32, 1_000.0)));
        let tree = QuadNode::build(&positions).expect("finite points");

        let mut near = Vec::new();
        tree.collect_near(vec2(0.0, 0.0), 30.0, &mut near);
        assert!(near.contains(&0));
        assert!(!near.contains(&39));
    }

    #[test]
    fn rejects_non_finite_points() {
        assert!(QuadNode::build(&[vec2(f32::NAN, 0.0)]).is_none());
        assert!(QuadNode::build(&[]).is_none());
    }
}
