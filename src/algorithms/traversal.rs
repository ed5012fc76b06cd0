//! Push BFS
//!
//! Based on Ligra (Shun & Blelloch, `PPoPP` 2013) frontier-based traversal:
//! each iteration expands the out-edges of the current frontier only.

use super::VertexProgram;
use crate::storage::{CsrGraph, Layout, VertexId};
use std::collections::VecDeque;

/// Depth of a vertex the source cannot reach
pub const UNREACHED: u32 = u32::MAX;

/// Push-model breadth-first search; values are hop counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushBfs {
    /// Source vertex
    pub source: VertexId,
}

impl VertexProgram for PushBfs {
    type Value = u32;

    fn name(&self) -> &'static str {
        "bfs"
    }

    fn layout(&self) -> Layout {
        Layout::Push
    }

    fn initial_value(&self, v: VertexId, _nv: VertexId) -> u32 {
        if v == self.source {
            0
        } else {
            UNREACHED
        }
    }

    fn initially_active(&self, v: VertexId) -> bool {
        v == self.source
    }

    fn relax(&self, src: u32, _weight: f32) -> u32 {
        src.saturating_add(1)
    }

    fn improves(&self, candidate: u32, current: u32) -> bool {
        candidate < current
    }
}

/// Sequential BFS from `source`; unreachable vertices hold [`UNREACHED`]
///
/// # Example
///
/// ```
/// use trueno_shard::algorithms::{bfs, UNREACHED};
/// use trueno_shard::storage::CsrGraph;
///
/// let graph = CsrGraph::with_vertices(4, &[(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
/// assert_eq!(bfs(&graph, 0), vec![0, 1, 2, UNREACHED]);
/// ```
#[must_use]
pub fn bfs(graph: &CsrGraph, source: VertexId) -> Vec<u32> {
    let mut depth = vec![UNREACHED; graph.num_vertices()];
    let Some(slot) = depth.get_mut(source as usize) else {
        return depth;
    };
    *slot = 0;

    let csr = graph.out_csr();
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let next = depth[v as usize] + 1;
        for &u in &csr.col_indices[csr.row(v)] {
            if depth[u as usize] == UNREACHED {
                depth[u as usize] = next;
                queue.push_back(u);
            }
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfs_levels() {
        // 0 → 1 → 3, 0 → 2 → 3
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (0, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)]).unwrap();
        assert_eq!(bfs(&graph, 0), vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_bfs_directed_only() {
        let graph = CsrGraph::from_edge_list(&[(1, 0, 1.0)]).unwrap();
        assert_eq!(bfs(&graph, 0), vec![0, UNREACHED]);
    }

    #[test]
    fn test_relax_saturates() {
        let program = PushBfs { source: 0 };
        assert_eq!(program.relax(UNREACHED, 1.0), UNREACHED);
        assert!(program.improves(2, UNREACHED));
        assert!(!program.improves(3, 3));
    }
}
