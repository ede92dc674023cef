//! Breadth-first traversal.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use super::{Graph, Node, TraverseDirection};

impl<N, E> Graph<N, E> {
    /// Visits nodes reachable from `start` in breadth-first order.
    ///
    /// `visit` receives each node together with the node it was reached from (`None` for
    /// `start`). Returning [`ControlFlow::Break`] stops the walk, and the break is passed back
    /// to the caller. An unknown `start` visits nothing.
    pub fn breadth_first_traverse<F>(
        &self,
        start: &str,
        direction: TraverseDirection,
        mut visit: F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&Node<N>, Option<&Node<N>>) -> ControlFlow<()>,
    {
        let Some(start_ix) = self.index_of(start) else {
            return ControlFlow::Continue(());
        };
        let direction = if self.directed {
            direction
        } else {
            TraverseDirection::Any
        };

        let mut visited = vec![false; self.nodes.len()];
        visited[start_ix] = true;
        visit(&self.nodes[start_ix], None)?;

        let mut queue: VecDeque<usize> = VecDeque::from([start_ix]);
        while let Some(cur) = queue.pop_front() {
            let current = &self.nodes[cur];
            let keys = match direction {
                TraverseDirection::Any => current.edges(),
                TraverseDirection::In => current.in_edges(),
                TraverseDirection::Out => current.out_edges(),
            };
            for key in keys {
                let other = if key.v != current.id { &key.v } else { &key.w };
                let Some(other_ix) = self.index_of(other) else {
                    continue;
                };
                if visited[other_ix] {
                    continue;
                }
                visited[other_ix] = true;
                visit(&self.nodes[other_ix], Some(current))?;
                queue.push_back(other_ix);
            }
        }
        ControlFlow::Continue(())
    }
}
