mod forces;
mod ports;
mod quadtree;
mod scale;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

use forces::{Jiggle, LinkSpring, ManyBody};
pub use ports::link_port_offsets;
use scale::LinearScale;

pub const NODE_WIDTH: f32 = 75.0;
pub const NODE_HEIGHT: f32 = 25.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Soft box the container force keeps node origins inside.
    pub fn container_bounds(self) -> Bounds {
        Bounds {
            min: vec2(-10.0, 0.0),
            max: vec2(self.width - NODE_HEIGHT, self.height - NODE_HEIGHT),
        }
    }

    /// Initial-placement scales: context index across the left three quarters,
    /// stream index top to bottom with the highest stream on top.
    pub fn placement_scales(
        self,
        ctx: impl IntoIterator<Item = f64>,
        stream: impl IntoIterator<Item = f64>,
    ) -> (LinearScale, LinearScale) {
        let x = LinearScale::from_extent(ctx, (0.0, self.width * 3.0 / 4.0));
        let y = LinearScale::from_extent_reversed(stream, (0.0, self.height - NODE_HEIGHT));
        (x, y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(900.0, 320.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

/// Simulation-owned wrapper around one reduced node.
#[derive(Clone, Debug)]
pub struct LayoutNode {
    pub node_id: String,
    pub feature_id: String,
    /// Position of the node in the reduced node list.
    pub reduced_index: usize,
    pub member_count: usize,
    pub sorted_slug: String,
    pub pos: Vec2,
    pub velocity: Vec2,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    /// Target of the positional bias forces.
    pub home: Vec2,
    pub dagre_positioned: bool,
}

impl LayoutNode {
    pub fn new(node_id: impl Into<String>, reduced_index: usize, pos: Vec2, home: Vec2) -> Self {
        Self {
            node_id: node_id.into(),
            feature_id: String::new(),
            reduced_index,
            member_count: 1,
            sorted_slug: String::new(),
            pos,
            velocity: Vec2::ZERO,
            fx: None,
            fy: None,
            home,
            dagre_positioned: false,
        }
    }

    pub fn anchor(&mut self, pos: Vec2) {
        self.pos = pos;
        self.fx = Some(pos.x);
        self.fy = Some(pos.y);
    }

    pub fn release(&mut self) {
        self.fx = None;
        self.fy = None;
    }

    pub fn is_anchored(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }

    fn predicted(&self) -> Vec2 {
        self.pos + self.velocity
    }
}

/// Directed edge between two entries of the layout node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutLink {
    pub source: usize,
    pub target: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    pub node_size: Vec2,
    pub link_distance: f32,
    pub charge_strength: f32,
    pub theta: f32,
    pub distance_min: f32,
    pub collide_strength: f32,
    pub position_strength: Vec2,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    /// Energy the simulation is held at while a node is dragged or the layout
    /// is unstuck.
    pub reheat_alpha_target: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let alpha_min = 0.001_f32;
        Self {
            node_size: vec2(NODE_WIDTH, NODE_HEIGHT),
            link_distance: 30.0,
            charge_strength: -100.0,
            theta: 0.9,
            distance_min: 1.0,
            collide_strength: 1.0,
            position_strength: vec2(0.1, 2.0),
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            reheat_alpha_target: 0.3,
        }
    }
}

impl SimulationConfig {
    /// Half the node footprint diagonal.
    pub fn collide_radius(&self) -> f32 {
        self.node_size.length() / 2.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationStatus {
    Uninitialized,
    Running,
    Settled,
    Disposed,
}

pub struct Simulation {
    nodes: Vec<LayoutNode>,
    links: Vec<LayoutLink>,
    springs: Vec<LinkSpring>,
    index_by_id: HashMap<String, usize>,
    bounds: Bounds,
    config: SimulationConfig,
    alpha: f32,
    alpha_target: f32,
    status: SimulationStatus,
    jiggle: Jiggle,
    ticks: u64,
}

impl Simulation {
    pub fn new(
        nodes: Vec<LayoutNode>,
        links: Vec<LayoutLink>,
        bounds: Bounds,
        config: SimulationConfig,
    ) -> Self {
        let links = links
            .into_iter()
            .filter(|link| link.source < nodes.len() && link.target < nodes.len())
            .collect::<Vec<_>>();
        let springs = forces::link_springs(nodes.len(), &links);
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.node_id.clone(), index))
            .collect();

        Self {
            nodes,
            links,
            springs,
            index_by_id,
            bounds,
            config,
            alpha: 1.0,
            alpha_target: 0.0,
            status: SimulationStatus::Uninitialized,
            jiggle: Jiggle::default(),
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        if self.status == SimulationStatus::Uninitialized {
            self.status = SimulationStatus::Running;
        }
    }

    /// Resume ticking after settling. No effect once disposed.
    pub fn restart(&mut self) {
        if self.status != SimulationStatus::Disposed {
            self.status = SimulationStatus::Running;
        }
    }

    pub fn set_alpha_target(&mut self, alpha_target: f32) {
        self.alpha_target = alpha_target;
    }

    pub fn reheat(&mut self) {
        self.set_alpha_target(self.config.reheat_alpha_target);
        self.restart();
    }

    /// Stops ticking for good; a disposed simulation never moves again.
    pub fn dispose(&mut self) {
        self.status = SimulationStatus::Disposed;
    }

    /// Advances one tick if the simulation is running. Returns whether the
    /// node positions changed.
    pub fn step(&mut self) -> bool {
        if self.status != SimulationStatus::Running {
            return false;
        }

        self.tick();
        if self.alpha < self.config.alpha_min {
            self.status = SimulationStatus::Settled;
        }
        true
    }

    /// One synchronous pass: decay alpha, apply every force, integrate.
    pub fn tick(&mut self) {
        if self.status == SimulationStatus::Disposed {
            return;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;
        let config = self.config;

        forces::apply_links(
            &mut self.nodes,
            &self.links,
            &self.springs,
            config.link_distance,
            alpha,
            &mut self.jiggle,
        );
        forces::apply_many_body(
            &mut self.nodes,
            ManyBody {
                strength: config.charge_strength,
                theta: config.theta,
                distance_min: config.distance_min,
            },
            alpha,
            &mut self.jiggle,
        );
        forces::apply_collide(
            &mut self.nodes,
            config.collide_radius(),
            config.collide_strength,
            &mut self.jiggle,
        );
        forces::apply_container(&mut self.nodes, self.bounds, alpha);
        forces::apply_position(&mut self.nodes, config.position_strength, alpha);
        forces::integrate(&mut self.nodes, config.velocity_decay);
        self.ticks += 1;
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [LayoutNode] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[LayoutLink] {
        &self.links
    }

    pub fn node_index(&self, node_id: &str) -> Option<usize> {
        self.index_by_id.get(node_id).copied()
    }

    pub fn node(&self, node_id: &str) -> Option<&LayoutNode> {
        self.node_index(node_id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut LayoutNode> {
        self.node_index(node_id).map(|index| &mut self.nodes[index])
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(count: usize) -> (Vec<LayoutNode>, Vec<LayoutLink>) {
        let nodes = (0..count)
            .map(|index| {
                let pos = vec2(index as f32 * 20.0, 100.0);
                LayoutNode::new(format!("n{index}"), index, pos, pos)
            })
            .collect::<Vec<_>>();
        let links = (1..count)
            .map(|index| LayoutLink {
                source: index - 1,
                target: index,
            })
            .collect();
        (nodes, links)
    }

    #[test]
    fn lifecycle_runs_then_settles() {
        let (nodes, links) = chain(4);
        let bounds = Viewport::default().container_bounds();
        let mut simulation = Simulation::new(nodes, links, bounds, SimulationConfig::default());

        assert_eq!(simulation.status(), SimulationStatus::Uninitialized);
        assert!(!simulation.step());

        simulation.start();
        let mut ticks = 0;
        while simulation.step() {
            ticks += 1;
            assert!(ticks < 1_000, "simulation never settled");
        }
        assert_eq!(simulation.status(), SimulationStatus::Settled);
        assert!(simulation.alpha() < SimulationConfig::default().alpha_min);
        assert!((290..=310).contains(&ticks));

        simulation.reheat();
        assert!(simulation.is_running());
        assert_eq!(simulation.alpha_target(), 0.3);

        simulation.dispose();
        simulation.restart();
        assert_eq!(simulation.status(), SimulationStatus::Disposed);
        let before = simulation.nodes()[0].pos;
        simulation.tick();
        assert_eq!(simulation.nodes()[0].pos, before);
    }

    #[test]
    fn anchored_node_holds_position() {
        let (nodes, links) = chain(3);
        let bounds = Viewport::default().container_bounds();
        let mut simulation = Simulation::new(nodes, links, bounds, SimulationConfig::default());
        simulation
            .node_mut("n1")
            .expect("n1 exists")
            .anchor(vec2(300.0, 150.0));
        simulation.start();
        for _ in 0..50 {
            simulation.step();
        }

        let anchored = simulation.node("n1").expect("n1 exists");
        assert_eq!(anchored.pos, vec2(300.0, 150.0));
        assert_eq!(anchored.velocity, Vec2::ZERO);
    }

    #[test]
    fn container_draws_strays_back() {
        let nodes = vec![LayoutNode::new(
            "far",
            0,
            vec2(2_000.0, 2_000.0),
            vec2(100.0, 100.0),
        )];
        let viewport = Viewport::new(400.0, 300.0);
        let bounds = viewport.container_bounds();
        let mut simulation =
            Simulation::new(nodes, Vec::new(), bounds, SimulationConfig::default());
        simulation.start();
        while simulation.step() {}

        let settled = simulation.nodes()[0].pos;
        assert!(settled.x <= bounds.max.x + 1.0);
        assert!(settled.y <= bounds.max.y + 1.0);
    }

    #[test]
    fn collide_radius_is_half_diagonal() {
        let radius = SimulationConfig::default().collide_radius();
        assert!((radius - (75.0_f32.hypot(25.0) / 2.0)).abs() < 1e-4);
    }

    #[test]
    fn placement_scales_reserve_right_quarter() {
        let viewport = Viewport::new(400.0, 325.0);
        let (x, y) = viewport.placement_scales([0.0, 4.0], [0.0, 2.0]);
        assert_eq!(x.apply(4.0), 300.0);
        assert_eq!(y.apply(2.0), 0.0);
        assert_eq!(y.apply(0.0), 300.0);
    }
}
