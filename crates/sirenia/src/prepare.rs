//! Chart-side preprocessing applied to a [`Graph`] before it is handed to the orchestrator.

use sirenia_graph::{Graph, Point};

use crate::rng::XorShift64Star;

/// Divides every edge weight by the largest one so weights land in `[0, 1]`.
///
/// When the largest weight is not positive (or the graph has no edges) every weight becomes `1`.
pub fn normalize_edge_weights<N, E>(graph: &mut Graph<N, E>) {
    let max = graph
        .edges()
        .iter()
        .map(|e| e.layout.weight)
        .fold(f64::NEG_INFINITY, f64::max);
    if max.is_nan() || max <= 0.0 {
        for edge in graph.edges_mut() {
            edge.layout.weight = 1.0;
        }
        return;
    }
    for edge in graph.edges_mut() {
        edge.layout.weight /= max;
    }
}

/// Maps node sizes linearly from their current range onto `[min_radius, max_radius]` and derives
/// a normalized mass (`size / max_radius`).
///
/// If every node has the same size, all nodes get the middle radius and mass `0.5`.
pub fn map_node_sizes<N, E>(graph: &mut Graph<N, E>, min_radius: f64, max_radius: f64) {
    let (min, max) = graph
        .nodes()
        .iter()
        .map(|n| n.layout.size)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s), hi.max(s))
        });
    let divider = max - min;
    for node in graph.nodes_mut() {
        let layout = &mut node.layout;
        if divider > 0.0 {
            layout.size = (layout.size - min) * (max_radius - min_radius) / divider + min_radius;
            layout.mass = if max_radius > 0.0 {
                layout.size / max_radius
            } else {
                0.0
            };
        } else {
            layout.size = (min_radius + max_radius) / 2.0;
            layout.mass = 0.5;
        }
    }
}

/// Gives every node without a position a random point in the axis-aligned square of side `side`
/// centered on `center`. Returns the number of nodes placed.
pub fn place_unpositioned<N, E>(
    graph: &mut Graph<N, E>,
    center: Point,
    side: f64,
    seed: u64,
) -> usize {
    let mut rng = XorShift64Star::new(seed);
    let mut placed = 0;
    for node in graph.nodes_mut() {
        if node.layout.position.is_some() {
            continue;
        }
        let x = (rng.next_f64_unit() - 0.5) * side + center.x;
        let y = (rng.next_f64_unit() - 0.5) * side + center.y;
        node.layout.position = Some(Point::new(x, y));
        placed += 1;
    }
    placed
}
