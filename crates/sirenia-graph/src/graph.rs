//! The [`Graph`] container.
//!
//! Nodes live in a `Vec` in insertion order with a hash index from id to position; edges do the
//! same with an index keyed by [`EdgeKey`]. Adjacency is kept on each node as edge keys so that
//! removal never has to chase dangling references.

use rustc_hash::FxBuildHasher;

mod edge_key;
mod entries;
mod matrix;
mod options;
mod traverse;

pub use edge_key::EdgeKey;
pub use entries::{Edge, EdgeLayout, Node, NodeLayout, Point};
pub use options::TraverseDirection;

use edge_key::EdgeKeyView;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

#[derive(Debug, Clone)]
pub struct Graph<N = (), E = ()> {
    directed: bool,

    nodes: Vec<Node<N>>,
    node_index: HashMap<String, usize>,

    edges: Vec<Edge<E>>,
    edge_index: HashMap<EdgeKey, usize>,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<N, E> Graph<N, E> {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            nodes: Vec::new(),
            node_index: HashMap::default(),
            edges: Vec::new(),
            edge_index: HashMap::default(),
        }
    }

    pub fn directed() -> Self {
        Self::new(true)
    }

    pub fn undirected() -> Self {
        Self::new(false)
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Position of `id` in insertion order. This is the index the node occupies in the flat
    /// layout buffers.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node<N>> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node<N>> {
        self.node_index
            .get(id)
            .copied()
            .map(move |idx| &mut self.nodes[idx])
    }

    pub fn node_at(&self, idx: usize) -> Option<&Node<N>> {
        self.nodes.get(idx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node<N>] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node<N>] {
        &mut self.nodes
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge<E>] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Edge<E>] {
        &mut self.edges
    }

    /// Adds a node, or returns the existing one when `id` is already present. `data` is
    /// dropped in the latter case.
    pub fn add_node(&mut self, id: impl Into<String>, data: N) -> &mut Node<N> {
        let id = id.into();
        if let Some(&idx) = self.node_index.get(&id) {
            return &mut self.nodes[idx];
        }
        let idx = self.nodes.len();
        self.node_index.insert(id.clone(), idx);
        self.nodes.push(Node::new(id, data));
        &mut self.nodes[idx]
    }

    /// Adds an edge between two existing nodes.
    ///
    /// Returns `None` when either endpoint is missing. Re-adding an existing edge returns it
    /// unchanged; in undirected graphs `b-a` resolves to an existing `a-b`.
    pub fn add_edge(&mut self, v: &str, w: &str, data: E) -> Option<&mut Edge<E>> {
        let (Some(&v_ix), Some(&w_ix)) = (self.node_index.get(v), self.node_index.get(w)) else {
            tracing::warn!(node1 = v, node2 = w, "edge references a missing node; skipped");
            return None;
        };
        if let Some(idx) = self.edge_index_of(v, w) {
            return Some(&mut self.edges[idx]);
        }

        let key = EdgeKey::new(v, w);
        if self.directed {
            self.nodes[v_ix].out_edges.push(key.clone());
            self.nodes[w_ix].in_edges.push(key.clone());
        }
        self.nodes[v_ix].edges.push(key.clone());
        if v_ix != w_ix {
            self.nodes[w_ix].edges.push(key.clone());
        }

        let idx = self.edges.len();
        self.edge_index.insert(key.clone(), idx);
        self.edges.push(Edge {
            key,
            data,
            layout: EdgeLayout::default(),
        });
        Some(&mut self.edges[idx])
    }

    fn edge_index_of(&self, v: &str, w: &str) -> Option<usize> {
        if let Some(&idx) = self.edge_index.get(&EdgeKeyView { v, w }) {
            return Some(idx);
        }
        if self.directed {
            return None;
        }
        self.edge_index.get(&EdgeKeyView { v: w, w: v }).copied()
    }

    pub fn has_edge(&self, v: &str, w: &str) -> bool {
        self.edge_index_of(v, w).is_some()
    }

    pub fn edge(&self, v: &str, w: &str) -> Option<&Edge<E>> {
        let idx = self.edge_index_of(v, w)?;
        Some(&self.edges[idx])
    }

    pub fn edge_mut(&mut self, v: &str, w: &str) -> Option<&mut Edge<E>> {
        let idx = self.edge_index_of(v, w)?;
        Some(&mut self.edges[idx])
    }

    fn remove_edge_at_index(&mut self, idx: usize) {
        let key = self.edges[idx].key.clone();
        for id in [key.v.as_str(), key.w.as_str()] {
            if let Some(&n) = self.node_index.get(id) {
                self.nodes[n].detach(&key);
            }
        }
        let _ = self.edge_index.remove_entry(&key.view());
        self.edges.remove(idx);
        for i in idx..self.edges.len() {
            let k = &self.edges[i].key;
            if let Some(v) = self.edge_index.get_mut(k) {
                *v = i;
            }
        }
    }

    pub fn remove_edge(&mut self, v: &str, w: &str) -> bool {
        let Some(idx) = self.edge_index_of(v, w) else {
            return false;
        };
        self.remove_edge_at_index(idx);
        true
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some(&idx) = self.node_index.get(id) else {
            return false;
        };

        let incident = std::mem::take(&mut self.nodes[idx].edges);
        for key in &incident {
            if let Some(&e) = self.edge_index.get(key) {
                self.remove_edge_at_index(e);
            }
        }

        self.node_index.remove(id);
        self.nodes.remove(idx);
        for i in idx..self.nodes.len() {
            let node_id = self.nodes[i].id.as_str();
            if let Some(v) = self.node_index.get_mut(node_id) {
                *v = i;
            }
        }
        true
    }

    /// Keeps only the nodes for which `keep` returns `true`, cascading edge removal.
    pub fn retain_nodes<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Node<N>) -> bool,
    {
        let doomed: Vec<String> = self
            .nodes
            .iter()
            .filter(|&n| !keep(n))
            .map(|n| n.id.clone())
            .collect();
        for id in doomed {
            self.remove_node(&id);
        }
    }

    pub fn retain_edges<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Edge<E>) -> bool,
    {
        let doomed: Vec<EdgeKey> = self
            .edges
            .iter()
            .filter(|&e| !keep(e))
            .map(|e| e.key.clone())
            .collect();
        for key in doomed {
            if let Some(&idx) = self.edge_index.get(&key) {
                self.remove_edge_at_index(idx);
            }
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.node_index.clear();
        self.edges.clear();
        self.edge_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_stay_consistent_after_removals() {
        let mut g: Graph = Graph::directed();
        for id in ["a", "b", "c", "d"] {
            g.add_node(id, ());
        }
        g.add_edge("a", "b", ());
        g.add_edge("b", "c", ());
        g.add_edge("c", "d", ());

        assert!(g.remove_node("b"));
        assert_eq!(g.index_of("c"), Some(1));
        assert_eq!(g.index_of("d"), Some(2));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge_index.get(&EdgeKey::new("c", "d")), Some(&0));
        assert!(g.node("a").is_some_and(|n| n.out_edges().is_empty()));
    }

    #[test]
    fn self_loop_is_listed_once_in_edges() {
        let mut g: Graph = Graph::directed();
        g.add_node("a", ());
        g.add_edge("a", "a", ());

        let a = g.node("a").unwrap();
        assert_eq!(a.degree(), 1);
        assert_eq!(a.in_degree(), 1);
        assert_eq!(a.out_degree(), 1);

        assert!(g.remove_node("a"));
        assert_eq!(g.edge_count(), 0);
    }
}
