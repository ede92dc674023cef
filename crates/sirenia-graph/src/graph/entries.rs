//! Node and edge entries stored by [`Graph`](super::Graph).

use serde::{Deserialize, Serialize};

use super::EdgeKey;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Simulation attributes of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLayout {
    /// `None` until the caller (or the orchestrator's initial placement) assigns one.
    pub position: Option<Point>,
    pub mass: f64,
    /// Radius.
    pub size: f64,
    pub fixed: bool,
}

impl Default for NodeLayout {
    fn default() -> Self {
        Self {
            position: None,
            mass: 1.0,
            size: 1.0,
            fixed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLayout {
    pub weight: f64,
}

impl Default for EdgeLayout {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Node<N> {
    pub(in crate::graph) id: String,
    pub data: N,
    pub layout: NodeLayout,
    /// Row sum of the adjacency matrix when built by `Graph::from_matrix`.
    pub value: f64,
    pub in_value: f64,
    pub out_value: f64,
    pub(in crate::graph) edges: Vec<EdgeKey>,
    pub(in crate::graph) in_edges: Vec<EdgeKey>,
    pub(in crate::graph) out_edges: Vec<EdgeKey>,
}

impl<N> Node<N> {
    pub(in crate::graph) fn new(id: String, data: N) -> Self {
        Self {
            id,
            data,
            layout: NodeLayout::default(),
            value: 0.0,
            in_value: 0.0,
            out_value: 0.0,
            edges: Vec::new(),
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Every incident edge. A self-loop is listed once.
    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }

    /// Incoming edges; always empty in undirected graphs.
    pub fn in_edges(&self) -> &[EdgeKey] {
        &self.in_edges
    }

    /// Outgoing edges; always empty in undirected graphs.
    pub fn out_edges(&self) -> &[EdgeKey] {
        &self.out_edges
    }

    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }

    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }

    pub(in crate::graph) fn detach(&mut self, key: &EdgeKey) {
        self.edges.retain(|k| k != key);
        self.in_edges.retain(|k| k != key);
        self.out_edges.retain(|k| k != key);
    }
}

#[derive(Debug, Clone)]
pub struct Edge<E> {
    pub(in crate::graph) key: EdgeKey,
    pub data: E,
    pub layout: EdgeLayout,
}

impl<E> Edge<E> {
    pub fn key(&self) -> &EdgeKey {
        &self.key
    }

    pub fn node1(&self) -> &str {
        &self.key.v
    }

    pub fn node2(&self) -> &str {
        &self.key.w
    }
}
