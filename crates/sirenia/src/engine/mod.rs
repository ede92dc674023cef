//! The force simulation.
//!
//! [`PhysicsEngine`] owns the kinematic state of every node and the weight of every edge, and
//! advances it one step per [`PhysicsEngine::update`] call:
//!
//! 1. bounding box and ideal edge length `k = 0.4 * scaling * sqrt(width * height / n)`;
//! 2. Barnes-Hut tree (or the aggregate center of mass);
//! 3. repulsion, gravity, edge attraction and optional node/edge repulsion;
//! 4. damped integration scaled by the current temperature.
//!
//! State is fed in and read out through the same flat buffers used by the worker transport, so
//! both execution modes run bit-identical simulations.

mod forces;
mod region;

use nalgebra::Vector2;

use crate::config::EngineParams;
use crate::error::{Error, Result};
use region::RegionTree;

/// Kinematic state of a single node.
#[derive(Debug, Clone)]
pub(crate) struct Body {
    pub(crate) position: Vector2<f64>,
    pub(crate) force: Vector2<f64>,
    pub(crate) force_prev: Vector2<f64>,
    pub(crate) speed: Vector2<f64>,
    pub(crate) speed_prev: Vector2<f64>,
    pub(crate) mass: f64,
    pub(crate) size: f64,
    pub(crate) fixed: bool,
    pub(crate) in_degree: u32,
    pub(crate) out_degree: u32,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vector2::zeros(),
            force: Vector2::zeros(),
            force_prev: Vector2::zeros(),
            speed: Vector2::zeros(),
            speed_prev: Vector2::zeros(),
            mass: 1.0,
            size: 1.0,
            fixed: false,
            in_degree: 0,
            out_degree: 0,
        }
    }
}

impl Body {
    /// Mass used for repulsion. Massless nodes never take part, even when repulsion is driven by
    /// degree.
    pub(crate) fn repulsion_mass(&self, by_degree: bool) -> f64 {
        if self.mass <= 0.0 {
            0.0
        } else if by_degree {
            f64::from(self.in_degree + self.out_degree + 1)
        } else {
            self.mass
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Spring {
    pub(crate) node1: usize,
    pub(crate) node2: usize,
    pub(crate) weight: f64,
}

#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    params: EngineParams,
    temperature: f64,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    bbox_min: Vector2<f64>,
    bbox_max: Vector2<f64>,
    k: f64,
    mass_center: Vector2<f64>,
    tree: RegionTree,
    walk_stack: Vec<usize>,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(EngineParams::default())
    }
}

impl PhysicsEngine {
    pub fn new(params: EngineParams) -> Self {
        Self {
            params,
            temperature: 1.0,
            bodies: Vec::new(),
            springs: Vec::new(),
            bbox_min: Vector2::zeros(),
            bbox_max: Vector2::zeros(),
            k: 0.0,
            mass_center: Vector2::zeros(),
            tree: RegionTree::default(),
            walk_stack: Vec::new(),
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn set_params(&mut self, params: EngineParams) {
        self.params = params;
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn node_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn edge_count(&self) -> usize {
        self.springs.len()
    }

    /// Ideal edge length computed by the last update.
    pub fn ideal_edge_length(&self) -> f64 {
        self.k
    }

    /// Replaces all node state. `positions` holds `x, y` pairs; `sizes` may be empty, in which
    /// case every node gets radius 1. Resets the temperature to 1.
    pub fn init_nodes(&mut self, positions: &[f32], masses: &[f32], sizes: &[f32]) -> Result<()> {
        let n = masses.len();
        check_len("positions", 2 * n, positions.len())?;
        if !sizes.is_empty() {
            check_len("sizes", n, sizes.len())?;
        }

        self.temperature = 1.0;
        self.bodies.clear();
        self.bodies.extend((0..n).map(|i| Body {
            position: Vector2::new(f64::from(positions[2 * i]), f64::from(positions[2 * i + 1])),
            mass: f64::from(masses[i]),
            size: sizes.get(i).copied().map_or(1.0, f64::from),
            ..Body::default()
        }));
        // Degrees belong to the previous topology.
        self.springs.clear();
        Ok(())
    }

    /// Replaces all edges. `pairs` holds `node1, node2` index pairs; pairs pointing outside the
    /// node set are skipped. `weights` may be empty, in which case every edge weighs 1.
    pub fn init_edges(&mut self, pairs: &[u32], weights: &[f32]) -> Result<()> {
        if pairs.len() % 2 != 0 {
            return Err(Error::BufferLength {
                what: "edge pairs",
                expected: pairs.len() + 1,
                actual: pairs.len(),
            });
        }
        let e = pairs.len() / 2;
        if !weights.is_empty() {
            check_len("edge weights", e, weights.len())?;
        }

        for body in &mut self.bodies {
            body.in_degree = 0;
            body.out_degree = 0;
        }
        self.springs.clear();
        let n = self.bodies.len();
        for i in 0..e {
            let node1 = pairs[2 * i] as usize;
            let node2 = pairs[2 * i + 1] as usize;
            if node1 >= n || node2 >= n {
                tracing::warn!(node1, node2, nodes = n, "edge endpoint out of range; skipped");
                continue;
            }
            self.bodies[node1].out_degree += 1;
            self.bodies[node2].in_degree += 1;
            self.springs.push(Spring {
                node1,
                node2,
                weight: weights.get(i).copied().map_or(1.0, f64::from),
            });
        }
        Ok(())
    }

    pub fn sync_positions(&mut self, positions: &[f32]) -> Result<()> {
        check_len("positions", 2 * self.bodies.len(), positions.len())?;
        for (body, xy) in self.bodies.iter_mut().zip(positions.chunks_exact(2)) {
            body.position = Vector2::new(f64::from(xy[0]), f64::from(xy[1]));
        }
        Ok(())
    }

    /// Pins nodes whose mask entry is non-zero. Pinned nodes still push and pull on others.
    pub fn set_fixed(&mut self, mask: &[u8]) -> Result<()> {
        check_len("fixed mask", self.bodies.len(), mask.len())?;
        for (body, &flag) in self.bodies.iter_mut().zip(mask) {
            body.fixed = flag != 0;
        }
        Ok(())
    }

    pub fn write_positions(&self, out: &mut [f32]) -> Result<()> {
        check_len("positions", 2 * self.bodies.len(), out.len())?;
        for (body, xy) in self.bodies.iter().zip(out.chunks_exact_mut(2)) {
            xy[0] = body.position.x as f32;
            xy[1] = body.position.y as f32;
        }
        Ok(())
    }

    pub fn position(&self, idx: usize) -> Option<Vector2<f64>> {
        self.bodies.get(idx).map(|b| b.position)
    }

    /// Force accumulated for `idx` by the last [`PhysicsEngine::accumulate_forces`] (after
    /// an update, the damped force that was integrated).
    pub fn force(&self, idx: usize) -> Option<Vector2<f64>> {
        self.bodies.get(idx).map(|b| b.force)
    }

    /// Force from the step before the last one.
    pub fn previous_force(&self, idx: usize) -> Option<Vector2<f64>> {
        self.bodies.get(idx).map(|b| b.force_prev)
    }

    pub fn speed(&self, idx: usize) -> Option<Vector2<f64>> {
        self.bodies.get(idx).map(|b| b.speed)
    }

    /// Runs `iterations` updates starting from `temperature`, multiplying it by `cool_down`
    /// after each one. Returns the final temperature.
    pub fn run(&mut self, iterations: u32, temperature: f64, cool_down: f64) -> f64 {
        self.temperature = temperature;
        for _ in 0..iterations {
            self.update();
            self.temperature *= cool_down;
        }
        tracing::trace!(
            iterations,
            temperature = self.temperature,
            k = self.k,
            "simulation steps done"
        );
        self.temperature
    }

    /// Advances the simulation by one step at the current temperature.
    pub fn update(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        self.accumulate_forces();
        self.integrate();
    }

    /// Recomputes every node's force without moving anything.
    pub fn accumulate_forces(&mut self) {
        let n = self.bodies.len();
        if n == 0 {
            return;
        }
        self.update_bbox();
        self.k = 0.4 * self.params.scaling * (self.params.width * self.params.height / n as f64).sqrt();
        self.update_mass_center();
        if self.params.barnes_hut_optimize {
            self.tree.rebuild(
                self.bbox_min,
                self.bbox_max,
                &self.bodies,
                self.params.repulsion_by_degree,
            );
        }

        for body in &mut self.bodies {
            body.force_prev = body.force;
            body.speed_prev = body.speed;
            body.force = Vector2::zeros();
        }

        if self.params.barnes_hut_optimize {
            self.apply_tree_repulsion();
        } else {
            self.apply_pair_repulsion();
        }
        if self.params.gravity > 0.0 {
            self.apply_gravity();
        }
        self.apply_edge_attraction();
        if self.params.prevent_node_edge_overlap {
            self.apply_node_edge_repulsion();
        }
    }

    fn update_bbox(&mut self) {
        let mut min = Vector2::repeat(f64::INFINITY);
        let mut max = Vector2::repeat(f64::NEG_INFINITY);
        for body in &self.bodies {
            min = min.inf(&body.position);
            max = max.sup(&body.position);
        }
        self.bbox_min = min;
        self.bbox_max = max;
    }

    fn update_mass_center(&mut self) {
        let mut mass = 0.0;
        let mut center = Vector2::zeros();
        for body in &self.bodies {
            mass += body.mass;
            center += body.position * body.mass;
        }
        self.mass_center = if mass > 0.0 { center / mass } else { center };
    }

    fn integrate(&mut self) {
        let temperature = self.temperature;
        let max_speed_increase = self.params.max_speed_increase;
        for body in &mut self.bodies {
            if body.fixed {
                body.speed = Vector2::zeros();
                continue;
            }

            let mut force = body.force / 30.0;
            let df = force.norm() + 0.1;
            force *= df.min(500.0) / df;
            body.force = force;

            let mut speed = (body.speed + force) * temperature;

            // Limit how far the velocity may swing away from the previous step.
            let swing = speed - body.speed_prev;
            let swing_len = swing.norm();
            if swing_len > 0.0 {
                let base = body.speed_prev.norm();
                if base > 0.0 {
                    let limited = (swing_len / base).min(max_speed_increase) * base;
                    speed = body.speed_prev + swing * (limited / swing_len);
                }
            }

            let ds = speed.norm();
            speed *= ds.min(100.0) / (ds + 0.1);

            body.speed = speed;
            body.position += speed;
        }
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::BufferLength {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EngineParams {
        EngineParams {
            gravity: 0.0,
            ..EngineParams::default()
        }
    }

    fn engine_with(positions: &[f32], masses: &[f32], params: EngineParams) -> PhysicsEngine {
        let mut engine = PhysicsEngine::new(params);
        engine.init_nodes(positions, masses, &[]).unwrap();
        engine.init_edges(&[], &[]).unwrap();
        engine
    }

    #[test]
    fn ideal_edge_length_follows_area_and_node_count() {
        let mut engine = engine_with(&[0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 10.0], &[1.0; 4], params());
        engine.accumulate_forces();
        let expected = 0.4 * (500.0_f64 * 500.0 / 4.0).sqrt();
        assert!((engine.ideal_edge_length() - expected).abs() < 1e-9);
    }

    #[test]
    fn init_rejects_mismatched_buffers() {
        let mut engine = PhysicsEngine::default();
        assert!(matches!(
            engine.init_nodes(&[0.0, 0.0, 1.0], &[1.0, 1.0], &[]),
            Err(Error::BufferLength {
                what: "positions",
                expected: 4,
                actual: 3
            })
        ));
        engine.init_nodes(&[0.0; 4], &[1.0; 2], &[]).unwrap();
        assert!(engine.init_edges(&[0, 1, 1], &[]).is_err());
        assert!(engine.init_edges(&[0, 1], &[0.5, 0.5]).is_err());
        assert!(engine.set_fixed(&[1]).is_err());
    }

    #[test]
    fn out_of_range_edges_are_skipped_and_degrees_counted() {
        let mut engine = PhysicsEngine::default();
        engine.init_nodes(&[0.0; 6], &[1.0; 3], &[]).unwrap();
        engine.init_edges(&[0, 1, 1, 2, 2, 9], &[]).unwrap();
        assert_eq!(engine.edge_count(), 2);
        assert_eq!(engine.bodies[1].in_degree, 1);
        assert_eq!(engine.bodies[1].out_degree, 1);
        assert_eq!(engine.bodies[2].out_degree, 0);
    }

    #[test]
    fn run_cools_geometrically() {
        let mut engine = engine_with(&[0.0, 0.0, 5.0, 5.0], &[1.0, 1.0], params());
        let t = engine.run(3, 1.0, 0.5);
        assert_eq!(t, 0.125);
        assert_eq!(engine.temperature(), 0.125);
    }

    #[test]
    fn fixed_body_neither_moves_nor_keeps_speed() {
        let mut engine = engine_with(&[0.0, 0.0, 1.0, 0.0], &[1.0, 1.0], params());
        engine.set_fixed(&[1, 0]).unwrap();
        for _ in 0..5 {
            engine.update();
        }
        assert_eq!(engine.position(0), Some(Vector2::new(0.0, 0.0)));
        assert_eq!(engine.speed(0), Some(Vector2::zeros()));
        assert!(engine.position(1).unwrap().x > 1.0);
    }

    #[test]
    fn speed_is_clamped() {
        let mut engine = engine_with(&[0.0, 0.0, 0.001, 0.0], &[50.0, 50.0], params());
        engine.update();
        assert!(engine.speed(1).unwrap().norm() <= 100.0);
        assert!(engine.speed(0).unwrap().norm() <= 100.0);
        assert!(engine.force(1).unwrap().norm() <= 500.0);
    }

    #[test]
    fn previous_force_tracks_last_step() {
        let mut engine = engine_with(&[0.0, 0.0, 3.0, 0.0], &[1.0, 1.0], params());
        engine.update();
        let first = engine.force(0).unwrap();
        engine.update();
        assert_eq!(engine.previous_force(0), Some(first));
    }

    #[test]
    fn empty_engine_update_is_a_no_op() {
        let mut engine = PhysicsEngine::default();
        engine.update();
        assert_eq!(engine.node_count(), 0);
        assert_eq!(engine.ideal_edge_length(), 0.0);
    }
}
