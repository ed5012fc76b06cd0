//! Pull `PageRank`
//!
//! Based on Page et al. (1999) "The `PageRank` Citation Ranking: Bringing Order to the Web".
//! Each vertex reads its in-neighbours' previous ranks, so a partition only
//! needs its own in-edges plus a read-only view of all values.

use super::{PullContext, VertexProgram};
use crate::storage::{CsrGraph, Layout, VertexId};

/// Damping factor for `PageRank` (Google standard)
pub const DAMPING_FACTOR: f32 = 0.85;

/// Pull-model `PageRank`
///
/// ```text
/// PR(v) = (1-d)/N + d * Σ(PR(u) / outdegree(u))   for u → v
/// ```
///
/// Rank held by vertices without out-edges is not redistributed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullPageRank {
    /// Damping factor `d`
    pub damping: f32,
}

impl Default for PullPageRank {
    fn default() -> Self {
        Self {
            damping: DAMPING_FACTOR,
        }
    }
}

impl VertexProgram for PullPageRank {
    type Value = f32;

    fn name(&self) -> &'static str {
        "pagerank"
    }

    fn layout(&self) -> Layout {
        Layout::Pull
    }

    #[allow(clippy::cast_precision_loss)]
    fn initial_value(&self, _v: VertexId, nv: VertexId) -> f32 {
        1.0 / nv as f32
    }

    #[allow(clippy::cast_precision_loss)]
    fn pull(&self, ctx: &PullContext<'_, f32>) -> f32 {
        let sum = ctx
            .sources
            .iter()
            .map(|&u| ctx.values[u as usize] / ctx.degrees[u as usize] as f32)
            .sum::<f32>();
        rank(self.damping, ctx.nv, sum)
    }
}

#[allow(clippy::cast_precision_loss)]
fn rank(damping: f32, nv: VertexId, sum: f32) -> f32 {
    (1.0 - damping) / nv as f32 + damping * sum
}

/// Sequential pull `PageRank` over a whole graph
///
/// Runs exactly `iterations` rounds with the same summation order as the
/// partitioned program, so results agree bit for bit.
///
/// # Example
///
/// ```
/// use trueno_shard::algorithms::pagerank;
/// use trueno_shard::storage::CsrGraph;
///
/// let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap();
/// let ranks = pagerank(&graph, 20);
/// assert_eq!(ranks.len(), 3);
/// assert!((ranks.iter().sum::<f32>() - 1.0).abs() < 1e-5); // cycle keeps mass
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pagerank(graph: &CsrGraph, iterations: usize) -> Vec<f32> {
    let nv = graph.num_vertices() as VertexId;
    if nv == 0 {
        return Vec::new();
    }
    let program = PullPageRank::default();
    let degrees = graph.out_degrees();
    let csr = graph.in_csr();

    let mut ranks: Vec<f32> = (0..nv).map(|v| program.initial_value(v, nv)).collect();
    for _ in 0..iterations {
        let next = (0..nv)
            .map(|v| {
                let edges = csr.row(v);
                program.pull(&PullContext {
                    vertex: v,
                    old: ranks[v as usize],
                    sources: &csr.col_indices[edges.clone()],
                    weights: &csr.weights[edges],
                    values: &ranks,
                    degrees: &degrees,
                    nv,
                })
            })
            .collect();
        ranks = next;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagerank_cycle_uniform() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap();
        let ranks = pagerank(&graph, 30);
        for r in &ranks {
            assert!((r - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pagerank_star_center_highest() {
        // Leaves all point at vertex 0
        let graph = CsrGraph::from_edge_list(&[(1, 0, 1.0), (2, 0, 1.0), (3, 0, 1.0), (0, 1, 1.0)]).unwrap();
        let ranks = pagerank(&graph, 20);
        assert!(ranks[0] > ranks[1]);
        assert!(ranks[0] > ranks[2]);
        assert!((ranks[2] - ranks[3]).abs() < 1e-7);
    }

    #[test]
    fn test_zero_iterations_is_initial() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0)]).unwrap();
        assert_eq!(pagerank(&graph, 0), vec![0.5, 0.5]);
    }

    #[test]
    fn test_pull_without_in_edges_is_teleport() {
        let program = PullPageRank::default();
        let ctx = PullContext {
            vertex: 0,
            old: 0.25,
            sources: &[],
            weights: &[],
            values: &[0.25; 4],
            degrees: &[1; 4],
            nv: 4,
        };
        assert!((program.pull(&ctx) - 0.15 / 4.0).abs() < 1e-7);
    }
}
