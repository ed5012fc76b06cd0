//! Row-wise partitioning of the vertex set
//!
//! Every partition owns a contiguous, half-open vertex range; the ranges are
//! disjoint and cover `[0, nv)`. Edge ranges follow from the row index, and
//! frontier byte ranges cover `[0, frontier_size)`.

use super::{EdgeId, VertexId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Execution model, which fixes how edges are grouped on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Rows are destinations; a vertex reads all in-edges locally
    Pull,
    /// Rows are sources; updates are routed through frontiers
    Push,
}

/// How vertex rows are cut into partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitPolicy {
    /// Equal vertex counts (sizes differ by at most one)
    #[default]
    VertexBalanced,
    /// Roughly `ne / parts` edges per partition
    EdgeBalanced,
}

/// Split `total` items into `parts` contiguous ranges whose sizes differ by
/// at most one, larger ranges first
///
/// # Example
///
/// ```
/// use trueno_shard::storage::split_balanced;
///
/// let ranges = split_balanced(10, 4);
/// assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
/// ```
#[must_use]
pub fn split_balanced(total: u64, parts: usize) -> Vec<Range<u64>> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u64 = parts as u64;
    let base = total / parts_u64;
    let extra = total % parts_u64;

    let mut start = 0;
    (0..parts_u64)
        .map(|i| {
            let len = base + u64::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Split rows so each partition holds about `ne / parts` edges
///
/// `row_ends[v]` is the exclusive end edge of row `v`. Boundaries are placed
/// after the first row whose end reaches the next edge quota.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn split_by_edges(row_ends: &[EdgeId], parts: usize) -> Vec<Range<VertexId>> {
    if parts == 0 {
        return Vec::new();
    }
    let nv = row_ends.len() as VertexId;
    let ne = row_ends.last().copied().unwrap_or(0);
    let parts_u64 = parts as u64;

    let mut ranges = Vec::with_capacity(parts);
    let mut start: VertexId = 0;
    for i in 0..parts_u64 {
        let end = if i + 1 == parts_u64 {
            nv
        } else {
            let quota = (u128::from(ne) * u128::from(i + 1) / u128::from(parts_u64)) as EdgeId;
            let cut = row_ends.partition_point(|&e| e < quota) as VertexId;
            (cut + 1).clamp(start, nv)
        };
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Edge range `[start, end)` covered by a row range
#[must_use]
pub fn edge_range(row_ends: &[EdgeId], rows: &Range<VertexId>) -> Range<EdgeId> {
    let at = |v: VertexId| if v == 0 { 0 } else { row_ends[v as usize - 1] };
    at(rows.start)..at(rows.end)
}

/// Per-partition vertex, edge and frontier ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionBounds {
    rows: Vec<Range<VertexId>>,
    edges: Vec<Range<EdgeId>>,
    frontier: Vec<Range<u64>>,
}

impl PartitionBounds {
    /// Assemble bounds; all three lists are indexed by partition
    #[must_use]
    pub fn new(rows: Vec<Range<VertexId>>, edges: Vec<Range<EdgeId>>, frontier: Vec<Range<u64>>) -> Self {
        debug_assert_eq!(rows.len(), edges.len());
        debug_assert_eq!(rows.len(), frontier.len());
        Self { rows, edges, frontier }
    }

    /// Number of partitions
    #[must_use]
    pub fn num_parts(&self) -> usize {
        self.rows.len()
    }

    /// Vertex range of a partition
    #[must_use]
    pub fn rows(&self, part: usize) -> Range<VertexId> {
        self.rows[part].clone()
    }

    /// First vertex of a partition (`rowLeft`)
    #[must_use]
    pub fn row_left(&self, part: usize) -> VertexId {
        self.rows[part].start
    }

    /// One past the last vertex of a partition (`rowRight`, exclusive)
    #[must_use]
    pub fn row_right(&self, part: usize) -> VertexId {
        self.rows[part].end
    }

    /// Edge range of a partition
    #[must_use]
    pub fn edges(&self, part: usize) -> Range<EdgeId> {
        self.edges[part].clone()
    }

    /// Frontier byte range of a partition (`fqLeft..fqRight`)
    #[must_use]
    pub fn frontier(&self, part: usize) -> Range<u64> {
        self.frontier[part].clone()
    }

    /// All vertex ranges
    #[must_use]
    pub fn all_rows(&self) -> &[Range<VertexId>] {
        &self.rows
    }

    /// Partition owning vertex `v`
    ///
    /// Empty partitions never own a vertex.
    #[must_use]
    pub fn partition_of(&self, v: VertexId) -> usize {
        self.rows.partition_point(|r| r.end <= v)
    }
}
