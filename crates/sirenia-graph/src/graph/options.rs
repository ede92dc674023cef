//! Traversal options.

/// Which incident edges `Graph::breadth_first_traverse` follows.
///
/// Ignored by undirected graphs, where every incident edge is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraverseDirection {
    #[default]
    Any,
    In,
    Out,
}
