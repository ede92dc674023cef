//! Construction from a dense adjacency matrix.

use super::Graph;
use crate::error::{GraphError, Result};

impl<N, E: Default> Graph<N, E> {
    /// Builds a graph from `node_data` (id and payload per row) and a square adjacency matrix.
    ///
    /// Every node gets `value`/`out_value` set to its row sum and `in_value` to its column sum.
    /// One edge is created per non-zero cell of the upper triangle (diagonal included) with the
    /// cell as its weight. Directed graphs additionally get the reverse edge for every non-zero
    /// cell below the diagonal.
    pub fn try_from_matrix<I, K, R>(node_data: I, matrix: &[R], directed: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        R: AsRef<[f64]>,
    {
        let size = matrix.len();
        if size == 0 {
            return Err(GraphError::EmptyMatrix);
        }
        for (row, cells) in matrix.iter().enumerate() {
            let len = cells.as_ref().len();
            if len != size {
                return Err(GraphError::NonSquareMatrix {
                    row,
                    len,
                    expected: size,
                });
            }
        }
        let node_data: Vec<(String, N)> = node_data
            .into_iter()
            .map(|(id, data)| (id.into(), data))
            .collect();
        if node_data.len() != size {
            return Err(GraphError::DimensionMismatch {
                matrix: size,
                nodes: node_data.len(),
            });
        }

        let mut graph = Self::new(directed);
        for (id, data) in node_data {
            if graph.has_node(&id) {
                return Err(GraphError::DuplicateNode { id });
            }
            graph.add_node(id, data);
        }

        for i in 0..size {
            let row = matrix[i].as_ref();
            for (j, &item) in row.iter().enumerate() {
                graph.nodes[i].out_value += item;
                graph.nodes[j].in_value += item;
            }
            let node = &mut graph.nodes[i];
            node.value = node.out_value;
        }

        for i in 0..size {
            for j in i..size {
                let item = matrix[i].as_ref()[j];
                if item != 0.0 {
                    graph.add_weighted_edge(i, j, item);
                }
                let reverse = matrix[j].as_ref()[i];
                if directed && i != j && reverse != 0.0 {
                    graph.add_weighted_edge(j, i, reverse);
                }
            }
        }

        Ok(graph)
    }

    /// [`Graph::try_from_matrix`] that logs and discards the validation error.
    pub fn from_matrix<I, K, R>(node_data: I, matrix: &[R], directed: bool) -> Option<Self>
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        R: AsRef<[f64]>,
    {
        match Self::try_from_matrix(node_data, matrix, directed) {
            Ok(graph) => Some(graph),
            Err(err) => {
                tracing::warn!(%err, "rejected adjacency matrix");
                None
            }
        }
    }

    fn add_weighted_edge(&mut self, from: usize, to: usize, weight: f64) {
        let v = self.nodes[from].id.clone();
        let w = self.nodes[to].id.clone();
        if let Some(edge) = self.add_edge(&v, &w, E::default()) {
            edge.layout.weight = weight;
        }
    }
}
