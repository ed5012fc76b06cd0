//! Push single-source shortest paths
//!
//! Frontier-driven Bellman-Ford: a vertex whose distance dropped in the last
//! iteration relaxes its out-edges in the next. Weights must be
//! non-negative.
//!
//! # Example
//!
//! ```
//! use trueno_shard::algorithms::sssp;
//! use trueno_shard::storage::CsrGraph;
//!
//! let edges = vec![(0, 1, 1.0), (1, 2, 2.0), (0, 2, 5.0)];
//! let graph = CsrGraph::from_edge_list(&edges).unwrap();
//!
//! let distances = sssp(&graph, 0);
//! assert_eq!(distances, vec![0.0, 1.0, 3.0]); // 0→1→2 = 3.0, not 0→2 = 5.0
//! ```

use super::VertexProgram;
use crate::storage::{CsrGraph, Layout, VertexId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Push-model SSSP; values are distances, `f32::INFINITY` when unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushSssp {
    /// Source vertex
    pub source: VertexId,
}

impl VertexProgram for PushSssp {
    type Value = f32;

    fn name(&self) -> &'static str {
        "sssp"
    }

    fn layout(&self) -> Layout {
        Layout::Push
    }

    fn initial_value(&self, v: VertexId, _nv: VertexId) -> f32 {
        if v == self.source {
            0.0
        } else {
            f32::INFINITY
        }
    }

    fn initially_active(&self, v: VertexId) -> bool {
        v == self.source
    }

    fn relax(&self, src: f32, weight: f32) -> f32 {
        src + weight
    }

    fn improves(&self, candidate: f32, current: f32) -> bool {
        candidate < current
    }
}

/// State for Dijkstra's priority queue
#[derive(Clone, Copy)]
struct State {
    cost: f32,
    node: VertexId,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sequential Dijkstra from `source`; unreachable vertices hold `f32::INFINITY`
#[must_use]
pub fn sssp(graph: &CsrGraph, source: VertexId) -> Vec<f32> {
    let mut dist = vec![f32::INFINITY; graph.num_vertices()];
    let Some(slot) = dist.get_mut(source as usize) else {
        return dist;
    };
    *slot = 0.0;

    let csr = graph.out_csr();
    let mut heap = BinaryHeap::from([State {
        cost: 0.0,
        node: source,
    }]);
    while let Some(State { cost, node }) = heap.pop() {
        if cost > dist[node as usize] {
            continue;
        }
        let edges = csr.row(node);
        for (&next, &w) in csr.col_indices[edges.clone()].iter().zip(&csr.weights[edges]) {
            let candidate = cost + w;
            if candidate < dist[next as usize] {
                dist[next as usize] = candidate;
                heap.push(State {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sssp_prefers_cheaper_detour() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 4.0), (0, 2, 1.0), (2, 1, 1.0), (1, 3, 1.0)]).unwrap();
        assert_eq!(sssp(&graph, 0), vec![0.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_sssp_unreachable_infinite() {
        let graph = CsrGraph::with_vertices(3, &[(0, 1, 1.0)]).unwrap();
        let dist = sssp(&graph, 0);
        assert!(dist[2].is_infinite());
    }

    #[test]
    fn test_delta_of_infinite_change_is_bounded() {
        let program = PushSssp { source: 0 };
        assert!((program.delta(f32::INFINITY, 3.0) - 1.0).abs() < f64::EPSILON);
        assert_eq!(program.delta(2.0, 2.0), 0.0);
    }
}
