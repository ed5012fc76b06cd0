//! Push connected components by minimum-label propagation
//!
//! Every vertex starts with its own id as label and active. Labels flow along
//! out-edges; on a symmetric graph (each edge stored in both directions) the
//! fixed point labels every vertex with the smallest id of its component.

use super::VertexProgram;
use crate::storage::{CsrGraph, FrontierPolicy, Layout, VertexId};

/// Push-model label propagation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushComponents;

impl VertexProgram for PushComponents {
    type Value = u32;

    fn name(&self) -> &'static str {
        "components"
    }

    fn layout(&self) -> Layout {
        Layout::Push
    }

    fn initial_value(&self, v: VertexId, _nv: VertexId) -> u32 {
        v
    }

    fn initially_active(&self, _v: VertexId) -> bool {
        true
    }

    // Early iterations touch most vertices
    fn frontier_policy(&self) -> FrontierPolicy {
        FrontierPolicy { dense_threshold: 0.25 }
    }

    fn relax(&self, src: u32, _weight: f32) -> u32 {
        src
    }

    fn improves(&self, candidate: u32, current: u32) -> bool {
        candidate < current
    }
}

/// Sequential label propagation to the fixed point
///
/// # Example
///
/// ```
/// use trueno_shard::algorithms::connected_components;
/// use trueno_shard::storage::CsrGraph;
///
/// let graph = CsrGraph::with_vertices(4, &[(0, 1, 1.0), (1, 0, 1.0), (2, 3, 1.0), (3, 2, 1.0)]).unwrap();
/// assert_eq!(connected_components(&graph), vec![0, 0, 2, 2]);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn connected_components(graph: &CsrGraph) -> Vec<u32> {
    let csr = graph.out_csr();
    let mut labels: Vec<u32> = (0..graph.num_vertices() as u32).collect();
    let mut changed = true;
    while changed {
        changed = false;
        for v in 0..labels.len() as VertexId {
            let label = labels[v as usize];
            for &u in &csr.col_indices[csr.row(v)] {
                if label < labels[u as usize] {
                    labels[u as usize] = label;
                    changed = true;
                }
            }
        }
    }
    labels
}
