//! Barnes-Hut quad-tree.
//!
//! Regions live in a flat arena and refer to each other by index; the four children of a
//! subdivided region occupy consecutive slots. The arena is reset (not freed) at the start of
//! every step, so once it has grown to the working size no further allocation happens.

use nalgebra::Vector2;

use super::Body;

/// Subdivision stops here; further nodes landing in the same leaf are chained instead.
const MAX_DEPTH: u32 = 32;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Region {
    pub(crate) min: Vector2<f64>,
    pub(crate) max: Vector2<f64>,
    /// Mean of width and height.
    pub(crate) size: f64,
    pub(crate) mass: f64,
    /// Number of nodes below the region.
    pub(crate) count: usize,
    pub(crate) center_of_mass: Vector2<f64>,
    /// Head of the chain of nodes held directly (leaves only).
    node: Option<usize>,
    /// Index of the first of four consecutive children.
    first_child: Option<usize>,
    depth: u32,
}

impl Region {
    fn new(min: Vector2<f64>, max: Vector2<f64>, depth: u32) -> Self {
        let extent = max - min;
        Self {
            min,
            max,
            size: (extent.x + extent.y) / 2.0,
            mass: 0.0,
            count: 0,
            center_of_mass: Vector2::zeros(),
            node: None,
            first_child: None,
            depth,
        }
    }

    fn add_mass(&mut self, position: Vector2<f64>, mass: f64) {
        let total = self.mass + mass;
        if total > 0.0 {
            self.center_of_mass = (self.center_of_mass * self.mass + position * mass) / total;
        }
        self.mass = total;
        self.count += 1;
    }

    fn quadrant(&self, position: Vector2<f64>) -> usize {
        let mid = (self.min + self.max) / 2.0;
        let xi = usize::from(position.x >= mid.x);
        let yi = usize::from(position.y >= mid.y);
        xi + 2 * yi
    }

    pub(crate) fn contains(&self, position: Vector2<f64>) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RegionTree {
    regions: Vec<Region>,
    len: usize,
    /// Next node in the same leaf, indexed by node.
    chain: Vec<Option<usize>>,
}

impl RegionTree {
    /// Rebuilds the tree over `[min, max]` from every body with non-zero repulsion mass.
    pub(crate) fn rebuild(
        &mut self,
        min: Vector2<f64>,
        max: Vector2<f64>,
        bodies: &[Body],
        by_degree: bool,
    ) {
        self.len = 0;
        self.chain.clear();
        self.chain.resize(bodies.len(), None);
        self.alloc(Region::new(min, max, 0));

        for (idx, body) in bodies.iter().enumerate() {
            let mass = body.repulsion_mass(by_degree);
            if mass > 0.0 {
                self.insert(idx, body.position, mass, bodies, by_degree);
            }
        }
    }

    fn alloc(&mut self, region: Region) -> usize {
        let idx = self.len;
        if idx < self.regions.len() {
            self.regions[idx] = region;
        } else {
            self.regions.push(region);
        }
        self.len += 1;
        idx
    }

    fn subdivide(&mut self, parent: usize) -> usize {
        let Region {
            min, max, depth, ..
        } = self.regions[parent];
        let half = (max - min) / 2.0;
        let first = self.len;
        for q in 0..4 {
            let xi = (q % 2) as f64;
            let yi = (q / 2) as f64;
            let child_min = Vector2::new(min.x + xi * half.x, min.y + yi * half.y);
            self.alloc(Region::new(child_min, child_min + half, depth + 1));
        }
        self.regions[parent].first_child = Some(first);
        first
    }

    fn insert(
        &mut self,
        idx: usize,
        position: Vector2<f64>,
        mass: f64,
        bodies: &[Body],
        by_degree: bool,
    ) {
        let mut r = 0;
        loop {
            self.regions[r].add_mass(position, mass);

            if let Some(first) = self.regions[r].first_child {
                r = first + self.regions[r].quadrant(position);
                continue;
            }

            let Some(held) = self.regions[r].node else {
                self.regions[r].node = Some(idx);
                return;
            };

            let region = self.regions[r];
            if region.depth >= MAX_DEPTH || region.size <= 0.0 {
                self.chain[idx] = Some(held);
                self.regions[r].node = Some(idx);
                return;
            }

            // A leaf below the depth cap holds exactly one node; push it down a level.
            let first = self.subdivide(r);
            self.regions[r].node = None;
            let held_body = &bodies[held];
            let child = first + self.regions[r].quadrant(held_body.position);
            self.regions[child].add_mass(held_body.position, held_body.repulsion_mass(by_degree));
            self.regions[child].node = Some(held);

            r = first + self.regions[r].quadrant(position);
        }
    }

    pub(crate) fn root(&self) -> Option<usize> {
        (self.len > 0).then_some(0)
    }

    pub(crate) fn region(&self, idx: usize) -> &Region {
        &self.regions[idx]
    }

    pub(crate) fn children(&self, idx: usize) -> Option<std::ops::Range<usize>> {
        self.regions[idx].first_child.map(|first| first..first + 4)
    }

    /// Nodes held directly by a leaf.
    pub(crate) fn leaf_nodes(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.regions[idx].node, move |&n| self.chain[n])
    }

    #[cfg(test)]
    pub(crate) fn region_count(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_at(x: f64, y: f64, mass: f64) -> Body {
        Body {
            position: Vector2::new(x, y),
            mass,
            ..Body::default()
        }
    }

    #[test]
    fn second_node_subdivides_into_four_children() {
        let bodies = vec![body_at(0.0, 0.0, 1.0), body_at(10.0, 10.0, 3.0)];
        let mut tree = RegionTree::default();
        tree.rebuild(Vector2::new(0.0, 0.0), Vector2::new(10.0, 10.0), &bodies, false);

        assert_eq!(tree.region_count(), 5);
        let root = tree.region(0);
        assert!(!root.is_leaf());
        assert_eq!(root.mass, 4.0);
        assert_eq!(root.count, 2);
        assert_eq!(root.center_of_mass, Vector2::new(7.5, 7.5));

        let children = tree.children(0).unwrap();
        let held: Vec<Vec<usize>> = children.map(|c| tree.leaf_nodes(c).collect()).collect();
        assert_eq!(held, vec![vec![0], vec![], vec![], vec![1]]);
    }

    #[test]
    fn coincident_nodes_chain_instead_of_recursing_forever() {
        let bodies = vec![
            body_at(1.0, 1.0, 1.0),
            body_at(1.0, 1.0, 1.0),
            body_at(1.0, 1.0, 1.0),
        ];
        let mut tree = RegionTree::default();
        tree.rebuild(Vector2::new(1.0, 1.0), Vector2::new(1.0, 1.0), &bodies, false);

        assert_eq!(tree.region_count(), 1);
        let mut held: Vec<usize> = tree.leaf_nodes(0).collect();
        held.sort_unstable();
        assert_eq!(held, vec![0, 1, 2]);
        assert_eq!(tree.region(0).mass, 3.0);
    }

    #[test]
    fn massless_bodies_are_left_out() {
        let bodies = vec![body_at(0.0, 0.0, 0.0), body_at(4.0, 4.0, 2.0)];
        let mut tree = RegionTree::default();
        tree.rebuild(Vector2::new(0.0, 0.0), Vector2::new(4.0, 4.0), &bodies, false);

        let root = tree.region(0);
        assert!(root.is_leaf());
        assert_eq!(root.mass, 2.0);
        assert_eq!(tree.leaf_nodes(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn arena_is_reused_between_rebuilds() {
        let bodies: Vec<Body> = (0..16)
            .map(|i| body_at((i % 4) as f64, (i / 4) as f64, 1.0))
            .collect();
        let mut tree = RegionTree::default();
        tree.rebuild(Vector2::new(0.0, 0.0), Vector2::new(3.0, 3.0), &bodies, false);
        let first = tree.region_count();
        let capacity = tree.regions.len();

        tree.rebuild(Vector2::new(0.0, 0.0), Vector2::new(3.0, 3.0), &bodies, false);
        assert_eq!(tree.region_count(), first);
        assert_eq!(tree.regions.len(), capacity);
        assert_eq!(tree.region(0).mass, 16.0);
    }
}
