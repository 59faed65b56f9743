//! Individual forces. Each one reads positions and adds into node velocities;
//! [`integrate`] then moves every node that is not anchored.

use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;
use super::{Bounds, LayoutLink, LayoutNode};

/// Deterministic sub-pixel nudge used to separate coincident points.
#[derive(Clone, Debug)]
pub(super) struct Jiggle {
    state: u32,
}

impl Default for Jiggle {
    fn default() -> Self {
        Self { state: 1 }
    }
}

impl Jiggle {
    pub(super) fn next(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let unit = self.state as f32 / u32::MAX as f32;
        (unit - 0.5) * 1e-6
    }
}

/// Per-link spring parameters derived from endpoint degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct LinkSpring {
    pub(super) strength: f32,
    pub(super) bias: f32,
}

pub(super) fn link_springs(node_count: usize, links: &[LayoutLink]) -> Vec<LinkSpring> {
    let mut degree = vec![0usize; node_count];
    for link in links {
        degree[link.source] += 1;
        degree[link.target] += 1;
    }

    links
        .iter()
        .map(|link| {
            let source = degree[link.source] as f32;
            let target = degree[link.target] as f32;
            LinkSpring {
                strength: 1.0 / source.min(target).max(1.0),
                bias: source / (source + target),
            }
        })
        .collect()
}

pub(super) fn apply_links(
    nodes: &mut [LayoutNode],
    links: &[LayoutLink],
    springs: &[LinkSpring],
    distance: f32,
    alpha: f32,
    jiggle: &mut Jiggle,
) {
    for (link, spring) in links.iter().zip(springs) {
        if link.source == link.target {
            continue;
        }

        let source = nodes[link.source].predicted();
        let target = nodes[link.target].predicted();
        let mut delta = target - source;
        if delta.x == 0.0 {
            delta.x = jiggle.next();
        }
        if delta.y == 0.0 {
            delta.y = jiggle.next();
        }

        let length = delta.length();
        let correction = delta * ((length - distance) / length * alpha * spring.strength);

        nodes[link.target].velocity -= correction * spring.bias;
        nodes[link.source].velocity += correction * (1.0 - spring.bias);
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct ManyBody {
    pub(super) strength: f32,
    pub(super) theta: f32,
    pub(super) distance_min: f32,
}

pub(super) fn apply_many_body(
    nodes: &mut [LayoutNode],
    params: ManyBody,
    alpha: f32,
    jiggle: &mut Jiggle,
) {
    let positions = nodes.iter().map(|node| node.pos).collect::<Vec<_>>();
    let Some(tree) = QuadNode::build(&positions) else {
        return;
    };

    let theta_sq = params.theta * params.theta;
    let distance_min_sq = params.distance_min * params.distance_min;
    for (index, node) in nodes.iter_mut().enumerate() {
        let mut force = Vec2::ZERO;
        accumulate_charge(
            &tree,
            index,
            &positions,
            params.strength * alpha,
            theta_sq,
            distance_min_sq,
            jiggle,
            &mut force,
        );
        node.velocity += force;
    }
}

#[allow(clippy::too_many_arguments)]
fn accumulate_charge(
    cell: &QuadNode,
    index: usize,
    positions: &[Vec2],
    scaled_strength: f32,
    theta_sq: f32,
    distance_min_sq: f32,
    jiggle: &mut Jiggle,
    force: &mut Vec2,
) {
    if cell.mass <= 0.0 {
        return;
    }

    let point = positions[index];
    if !cell.is_leaf() {
        let delta = cell.center_of_mass - point;
        let distance_sq = delta.length_sq();
        let width = cell.bounds.side_length();
        if !cell.bounds.contains(point) && width * width / theta_sq < distance_sq {
            let distance_sq = soften(distance_sq, distance_min_sq);
            *force += delta * (scaled_strength * cell.mass / distance_sq);
            return;
        }

        for child in cell.children.iter().flatten() {
            accumulate_charge(
                child,
                index,
                positions,
                scaled_strength,
                theta_sq,
                distance_min_sq,
                jiggle,
                force,
            );
        }
        return;
    }

    for &other in &cell.indices {
        if other == index {
            continue;
        }

        let mut delta = positions[other] - point;
        if delta.x == 0.0 {
            delta.x = jiggle.next();
        }
        if delta.y == 0.0 {
            delta.y = jiggle.next();
        }
        let distance_sq = soften(delta.length_sq(), distance_min_sq);
        *force += delta * (scaled_strength / distance_sq);
    }
}

fn soften(distance_sq: f32, distance_min_sq: f32) -> f32 {
    if distance_sq < distance_min_sq {
        (distance_min_sq * distance_sq).sqrt()
    } else {
        distance_sq
    }
}

/// Circle collision on predicted positions. All nodes share one radius, so
/// each overlapping pair splits the correction evenly.
pub(super) fn apply_collide(
    nodes: &mut [LayoutNode],
    radius: f32,
    strength: f32,
    jiggle: &mut Jiggle,
) {
    let predicted = nodes.iter().map(LayoutNode::predicted).collect::<Vec<_>>();
    let Some(tree) = QuadNode::build(&predicted) else {
        return;
    };

    let reach = radius * 2.0;
    let mut candidates = Vec::new();
    for index in 0..nodes.len() {
        candidates.clear();
        let own = nodes[index].predicted();
        tree.collect_near(own, reach, &mut candidates);

        for &other in &candidates {
            if other <= index {
                continue;
            }

            let mut delta = own - nodes[other].predicted();
            let mut distance_sq = delta.length_sq();
            if distance_sq >= reach * reach {
                continue;
            }

            if delta.x == 0.0 {
                delta.x = jiggle.next();
                distance_sq += delta.x * delta.x;
            }
            if delta.y == 0.0 {
                delta.y = jiggle.next();
                distance_sq += delta.y * delta.y;
            }

            let distance = distance_sq.sqrt();
            let push = delta * ((reach - distance) / distance * strength);
            nodes[index].velocity += push * 0.5;
            nodes[other].velocity -= push * 0.5;
        }
    }
}

/// Pull towards each node's scale-derived home position, per axis.
pub(super) fn apply_position(nodes: &mut [LayoutNode], strength: Vec2, alpha: f32) {
    for node in nodes {
        let offset = node.home - node.pos;
        node.velocity += vec2(offset.x * strength.x, offset.y * strength.y) * alpha;
    }
}

/// Soft containment: nodes outside `bounds` get a velocity nudge of
/// `alpha * (edge - position)` on each violated side.
pub(super) fn apply_container(nodes: &mut [LayoutNode], bounds: Bounds, alpha: f32) {
    for node in nodes {
        let pos = node.pos;
        if pos.x < bounds.min.x {
            node.velocity.x += (bounds.min.x - pos.x) * alpha;
        }
        if pos.y < bounds.min.y {
            node.velocity.y += (bounds.min.y - pos.y) * alpha;
        }
        if pos.x > bounds.max.x {
            node.velocity.x += (bounds.max.x - pos.x) * alpha;
        }
        if pos.y > bounds.max.y {
            node.velocity.y += (bounds.max.y - pos.y) * alpha;
        }
    }
}

/// Anchored axes snap to their anchor with zero velocity; free axes decay
/// velocity and move.
pub(super) fn integrate(nodes: &mut [LayoutNode], velocity_decay: f32) {
    let keep = 1.0 - velocity_decay;
    for node in nodes {
        match node.fx {
            Some(fx) => {
                node.pos.x = fx;
                node.velocity.x = 0.0;
            }
            None => {
                node.velocity.x *= keep;
                node.pos.x += node.velocity.x;
            }
        }

        match node.fy {
            Some(fy) => {
                node.pos.y = fy;
                node.velocity.y = 0.0;
            }
            None => {
                node.velocity.y *= keep;
                node.pos.y += node.velocity.y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(id: &str, x: f32, y: f32) -> LayoutNode {
        LayoutNode::new(id, 0, vec2(x, y), vec2(x, y))
    }

    #[test]
    fn container_pushes_back_inside() {
        let bounds = Bounds {
            min: vec2(-10.0, 0.0),
            max: vec2(100.0, 50.0),
        };
        let mut nodes = vec![node_at("a", -30.0, 80.0), node_at("b", 10.0, 10.0)];
        apply_container(&mut nodes, bounds, 0.5);

        assert_eq!(nodes[0].velocity, vec2(10.0, -15.0));
        assert_eq!(nodes[1].velocity, Vec2::ZERO);
    }

    #[test]
    fn many_body_repels() {
        let mut nodes = vec![node_at("a", 0.0, 0.0), node_at("b", 10.0, 0.0)];
        let params = ManyBody {
            strength: -100.0,
            theta: 0.9,
            distance_min: 1.0,
        };
        apply_many_body(&mut nodes, params, 1.0, &mut Jiggle::default());

        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
        assert!((nodes[0].velocity.x + nodes[1].velocity.x).abs() < 1e-4);
    }

    #[test]
    fn link_pulls_distant_nodes_together() {
        let mut nodes = vec![node_at("a", 0.0, 0.0), node_at("b", 200.0, 0.0)];
        let links = vec![LayoutLink {
            source: 0,
            target: 1,
        }];
        let springs = link_springs(nodes.len(), &links);
        assert_eq!(
            springs[0],
            LinkSpring {
                strength: 1.0,
                bias: 0.5
            }
        );

        apply_links(&mut nodes, &links, &springs, 30.0, 1.0, &mut Jiggle::default());
        assert!(nodes[0].velocity.x > 0.0);
        assert!(nodes[1].velocity.x < 0.0);
    }

    #[test]
    fn collide_separates_overlapping_nodes() {
        let mut nodes = vec![node_at("a", 0.0, 0.0), node_at("b", 5.0, 0.0)];
        apply_collide(&mut nodes, 39.5, 1.0, &mut Jiggle::default());

        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
    }

    #[test]
    fn anchored_axes_ignore_velocity() {
        let mut nodes = vec![node_at("a", 0.0, 0.0)];
        nodes[0].velocity = vec2(10.0, 10.0);
        nodes[0].fx = Some(42.0);
        integrate(&mut nodes, 0.4);

        assert_eq!(nodes[0].pos.x, 42.0);
        assert_eq!(nodes[0].velocity.x, 0.0);
        assert!((nodes[0].pos.y - 6.0).abs() < 1e-5);
    }

    #[test]
    fn jiggle_is_tiny_and_deterministic() {
        let mut first = Jiggle::default();
        let mut second = Jiggle::default();
        for _ in 0..10 {
            let value = first.next();
            assert_eq!(value, second.next());
            assert!(value.abs() <= 5e-7);
        }
    }
}
