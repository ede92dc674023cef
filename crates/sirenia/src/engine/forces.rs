//! Force accumulation.

use nalgebra::Vector2;

use super::PhysicsEngine;

/// Repulsion multiplier for overlapping circles under `prevent_node_overlap`.
const OVERLAP_REPULSION: f64 = 10.0;
/// Strength of the node/edge repulsion (`k` in `k * mass / d`).
const NODE_EDGE_REPULSION: f64 = 100.0;
const NODE_EDGE_MIN_DISTANCE: f64 = 0.1;

/// Node snapshot used while accumulating repulsion.
#[derive(Debug, Clone, Copy)]
struct Charge {
    index: usize,
    position: Vector2<f64>,
    size: f64,
    mass: f64,
}

#[derive(Debug, Clone, Copy)]
struct Repulsion {
    k2: f64,
    prevent_overlap: bool,
}

impl Repulsion {
    /// Force on `a` caused by `b`; `b` receives the negation.
    fn between(self, a: &Charge, b: &Charge) -> Vector2<f64> {
        let mass = a.mass + b.mass;
        let v = a.position - b.position;
        let d2 = v.norm_squared();
        if d2 == 0.0 {
            if !self.prevent_overlap {
                return Vector2::zeros();
            }
            // Coincident: split along x, lower index to the left.
            let dir = if a.index < b.index { -1.0 } else { 1.0 };
            return Vector2::new(dir * 2.0 * OVERLAP_REPULSION * self.k2 * mass, 0.0);
        }

        let d = d2.sqrt();
        let unit = v / d;
        let factor = if self.prevent_overlap {
            let gap = d - a.size - b.size;
            if gap > 0.0 {
                self.k2 * mass / gap
            } else {
                OVERLAP_REPULSION * self.k2 * mass
            }
        } else {
            self.k2 * mass / d
        };
        unit * (2.0 * factor)
    }
}

impl PhysicsEngine {
    fn charge(&self, index: usize) -> Charge {
        let body = &self.bodies[index];
        Charge {
            index,
            position: body.position,
            size: body.size,
            mass: body.repulsion_mass(self.params.repulsion_by_degree),
        }
    }

    fn repulsion(&self) -> Repulsion {
        Repulsion {
            k2: self.k * self.k,
            prevent_overlap: self.params.prevent_node_overlap,
        }
    }

    pub(super) fn apply_pair_repulsion(&mut self) {
        let repulsion = self.repulsion();
        let n = self.bodies.len();
        for i in 0..n {
            let a = self.charge(i);
            if a.mass == 0.0 {
                continue;
            }
            for j in (i + 1)..n {
                let b = self.charge(j);
                if b.mass == 0.0 {
                    continue;
                }
                let f = repulsion.between(&a, &b);
                self.bodies[i].force += f;
                self.bodies[j].force -= f;
            }
        }
    }

    pub(super) fn apply_tree_repulsion(&mut self) {
        let Some(root) = self.tree.root() else {
            return;
        };
        let repulsion = self.repulsion();
        let theta2 = self.params.barnes_hut_theta * self.params.barnes_hut_theta;
        let mut stack = std::mem::take(&mut self.walk_stack);

        for i in 0..self.bodies.len() {
            let a = self.charge(i);
            if a.mass == 0.0 {
                continue;
            }
            let mut force = Vector2::zeros();
            stack.clear();
            stack.push(root);
            while let Some(r) = stack.pop() {
                let region = self.tree.region(r);
                if region.mass == 0.0 {
                    continue;
                }
                if region.is_leaf() {
                    for j in self.tree.leaf_nodes(r) {
                        if j != i {
                            force += repulsion.between(&a, &self.charge(j));
                        }
                    }
                    continue;
                }

                // Repulsion mass is additive, so a region stands in for `count` pairs.
                let v = a.position - region.center_of_mass;
                let d2 = v.norm_squared();
                if !region.contains(a.position) && d2 > theta2 * region.size * region.size {
                    let pair_mass = region.count as f64 * a.mass + region.mass;
                    force += v * (2.0 * repulsion.k2 * pair_mass / d2);
                } else if let Some(children) = self.tree.children(r) {
                    stack.extend(children);
                }
            }
            self.bodies[i].force += force;
        }

        self.walk_stack = stack;
    }

    pub(super) fn apply_gravity(&mut self) {
        let target = self
            .params
            .center
            .map_or(self.mass_center, |c| Vector2::new(c.x, c.y));
        let (width, height) = (self.params.width, self.params.height);
        let gravity = self.params.gravity;
        let strong = self.params.strong_gravity;

        for body in &mut self.bodies {
            let mut v = target - body.position;
            if width > 0.0 && height > 0.0 {
                if width > height {
                    v.y *= width / height;
                } else {
                    v.x *= height / width;
                }
            }
            let d = v.norm() / 100.0;
            if strong {
                body.force += v * (d * gravity * body.mass);
            } else {
                body.force += v * (gravity * body.mass / (d + 1.0));
            }
        }
    }

    pub(super) fn apply_edge_attraction(&mut self) {
        if self.k <= 0.0 {
            return;
        }
        let influence = self.params.edge_weight_influence;
        let prevent_overlap = self.params.prevent_node_overlap;
        for spring in &self.springs {
            let (a, b) = (spring.node1, spring.node2);
            if a == b {
                continue;
            }
            let v = self.bodies[a].position - self.bodies[b].position;
            let mut d = v.norm();
            let w = if influence == 0.0 {
                1.0
            } else if influence == 1.0 {
                spring.weight
            } else {
                spring.weight.powf(influence)
            };
            if !w.is_finite() {
                continue;
            }
            if prevent_overlap {
                d -= self.bodies[a].size + self.bodies[b].size;
                if d <= 0.0 {
                    continue;
                }
            }
            let factor = w * d / self.k;
            self.bodies[a].force -= v * factor;
            self.bodies[b].force += v * factor;
        }
    }

    pub(super) fn apply_node_edge_repulsion(&mut self) {
        for n3 in 0..self.bodies.len() {
            for s in 0..self.springs.len() {
                let spring = self.springs[s];
                let (n1, n2) = (spring.node1, spring.node2);
                if n1 == n3 || n2 == n3 {
                    continue;
                }
                let p1 = self.bodies[n1].position;
                let p2 = self.bodies[n2].position;
                let p3 = self.bodies[n3].position;

                let v12 = p2 - p1;
                let len12 = v12.norm();
                if len12 == 0.0 {
                    continue;
                }
                let u = v12 / len12;
                let along = u.dot(&(p3 - p1));
                if !(0.0..=len12).contains(&along) {
                    continue;
                }

                let foot = p1 + u * along;
                let offset = p3 - foot;
                let offset_len = offset.norm();
                let dist = offset_len - self.bodies[n3].size;
                let factor =
                    NODE_EDGE_REPULSION * self.bodies[n3].mass / dist.max(NODE_EDGE_MIN_DISTANCE);
                let dir = if offset_len > 0.0 {
                    offset / offset_len
                } else {
                    Vector2::new(-u.y, u.x)
                };

                self.bodies[n3].force += dir * factor;
                self.bodies[n1].force -= dir * factor;
                self.bodies[n2].force -= dir * factor;
            }
        }
    }
}
