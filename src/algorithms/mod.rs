//! Vertex programs (pull `PageRank`, push BFS / SSSP / connected components)
//!
//! A [`VertexProgram`] supplies the per-vertex math; the pipeline supplies
//! partitioning, placement and iteration. Pull programs implement
//! [`VertexProgram::pull`], push programs [`VertexProgram::relax`] and
//! [`VertexProgram::improves`]. Every program also ships a sequential
//! reference over a whole [`CsrGraph`](crate::storage::CsrGraph) for
//! checking distributed runs.

pub mod components;
pub mod pagerank;
pub mod shortest_path;
pub mod traversal;

pub use components::{connected_components, PushComponents};
pub use pagerank::{pagerank, PullPageRank, DAMPING_FACTOR};
pub use shortest_path::{sssp, PushSssp};
pub use traversal::{bfs, PushBfs, UNREACHED};

use crate::storage::{FrontierPolicy, Layout, VertexId};
use std::fmt::Debug;

/// In-edges of one vertex during a pull step
#[derive(Debug, Clone, Copy)]
pub struct PullContext<'a, V> {
    /// Vertex being updated
    pub vertex: VertexId,
    /// Its value from the previous iteration
    pub old: V,
    /// Sources of its in-edges
    pub sources: &'a [VertexId],
    /// Weights of its in-edges
    pub weights: &'a [f32],
    /// Previous-iteration values of every vertex
    pub values: &'a [V],
    /// Out-degree of every vertex
    pub degrees: &'a [u32],
    /// Total vertex count
    pub nv: VertexId,
}

/// Per-vertex logic run by the pipeline
pub trait VertexProgram: Send + Sync + 'static {
    /// Vertex value; `Into<f64>` is used for convergence and export
    type Value: Copy + PartialEq + Into<f64> + Debug + Send + Sync + 'static;

    /// Program name for logs and errors
    fn name(&self) -> &'static str;

    /// Layout the program runs on
    fn layout(&self) -> Layout;

    /// Value of `v` before the first iteration
    fn initial_value(&self, v: VertexId, nv: VertexId) -> Self::Value;

    /// Whether `v` is in the initial frontier (push only)
    fn initially_active(&self, _v: VertexId) -> bool {
        false
    }

    /// Representation choice for frontiers
    fn frontier_policy(&self) -> FrontierPolicy {
        FrontierPolicy::default()
    }

    /// New value of a vertex from its in-edges (pull only)
    fn pull(&self, ctx: &PullContext<'_, Self::Value>) -> Self::Value {
        ctx.old
    }

    /// Candidate for an out-neighbour of a vertex holding `src` (push only)
    fn relax(&self, src: Self::Value, _weight: f32) -> Self::Value {
        src
    }

    /// Whether `candidate` should replace `current` (push only)
    fn improves(&self, _candidate: Self::Value, _current: Self::Value) -> bool {
        false
    }

    /// Contribution of one vertex to the iteration's L1 delta
    fn delta(&self, old: Self::Value, new: Self::Value) -> f64 {
        if old == new {
            return 0.0;
        }
        let diff = (new.into() - old.into()).abs();
        if diff.is_finite() {
            diff
        } else {
            1.0
        }
    }
}

/// Byte width of a program's vertex value
#[must_use]
pub const fn value_width<P: VertexProgram>() -> u64 {
    std::mem::size_of::<P::Value>() as u64
}
