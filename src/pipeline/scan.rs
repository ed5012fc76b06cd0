//! Scan stage: validate every loaded partition and derive degrees
//!
//! A single task sees all partitions. Headers must agree, the concatenated
//! row index must be monotone and end at `ne`, edge ranges must be
//! contiguous, rows must sum to `nv` and every column must be `< nv`.

use super::load::LoadedPartition;
use crate::error::FormatError;
use crate::storage::{EdgeId, Layout, VertexId};

/// Validated graph totals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Vertex count
    pub nv: VertexId,
    /// Edge count
    pub ne: EdgeId,
    /// Out-degree of every vertex
    pub degrees: Vec<u32>,
}

/// Validate `parts` (ordered by partition index) and compute out-degrees
///
/// Push files store out-edges, so a row's length is its out-degree; pull
/// files store in-edges, so out-degrees are counted from the columns.
///
/// # Errors
///
/// Returns the first [`FormatError`] found
pub fn scan(parts: &[LoadedPartition], layout: Layout) -> Result<ScanSummary, FormatError> {
    let Some(first) = parts.first() else {
        return Ok(ScanSummary {
            nv: 0,
            ne: 0,
            degrees: Vec::new(),
        });
    };
    let header = first.header;

    let mut edge_end: EdgeId = 0;
    let mut row_count: u64 = 0;
    for p in parts {
        if p.header != header {
            return Err(FormatError::HeaderMismatch {
                part: p.part,
                ne: p.header.ne,
                nv: p.header.nv,
                ne0: header.ne,
                nv0: header.nv,
            });
        }
        if p.edge_start != edge_end {
            return Err(FormatError::EdgeRangeGap {
                part: p.part,
                start: p.edge_start,
                expected: edge_end,
            });
        }
        for (vertex, &end) in (p.rows.start..).zip(&p.row_ends) {
            if end < edge_end {
                return Err(FormatError::NonMonotoneRows { vertex });
            }
            edge_end = end;
        }
        for (i, &col) in p.cols.iter().enumerate() {
            if col >= header.nv {
                return Err(FormatError::ColumnOutOfRange {
                    edge: p.edge_start + i as EdgeId,
                    vertex: col,
                    nv: header.nv,
                });
            }
        }
        row_count += p.row_ends.len() as u64;
    }

    if edge_end != header.ne {
        return Err(FormatError::EdgeCountMismatch {
            expected: header.ne,
            found: edge_end,
        });
    }
    if row_count != u64::from(header.nv) {
        return Err(FormatError::VertexCountMismatch {
            expected: header.nv,
            found: row_count,
        });
    }

    let degrees = degrees(parts, header.nv, layout);
    tracing::info!(nv = header.nv, ne = header.ne, "scan validated graph");
    Ok(ScanSummary {
        nv: header.nv,
        ne: header.ne,
        degrees,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn degrees(parts: &[LoadedPartition], nv: VertexId, layout: Layout) -> Vec<u32> {
    let mut degrees = vec![0_u32; nv as usize];
    match layout {
        Layout::Push => {
            for p in parts {
                let mut start = p.edge_start;
                for (v, &end) in (p.rows.start..).zip(&p.row_ends) {
                    degrees[v as usize] = (end - start) as u32;
                    start = end;
                }
            }
        }
        Layout::Pull => {
            for col in parts.iter().flat_map(|p| &p.cols) {
                degrees[*col as usize] += 1;
            }
        }
    }
    degrees
}
