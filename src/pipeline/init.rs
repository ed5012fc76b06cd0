//! Init stage: turn a loaded partition into its resident piece

use super::load::LoadedPartition;
use super::piece::{GraphPiece, LocalCsr};
use crate::algorithms::VertexProgram;
use crate::error::FormatError;
use crate::storage::{Frontier, VertexId};
use std::sync::Arc;

/// Piece plus the initial values of its vertices
#[derive(Debug)]
pub struct InitOutput<V> {
    /// Resident piece with the initial frontier in buffer 0
    pub piece: GraphPiece,
    /// Initial values of the piece's vertices
    pub values: Vec<V>,
    /// Initially active vertices
    pub active: usize,
}

/// Build the piece of `loaded`
///
/// Row ends are rebased to the partition's first edge. The initial frontier
/// holds the vertices the program marks active, encoded per its policy.
///
/// # Errors
///
/// Returns [`FormatError::FrontierOverflow`] if the initial frontier does not
/// fit `frontier_capacity`
pub fn init_piece<P: VertexProgram>(
    program: &P,
    loaded: LoadedPartition,
    degrees: Arc<[u32]>,
    nv: VertexId,
    num_parts: usize,
    frontier_capacity: u64,
) -> Result<InitOutput<P::Value>, FormatError> {
    let LoadedPartition {
        part,
        rows,
        edge_start,
        row_ends,
        cols,
        weights,
        ..
    } = loaded;

    let row_ptr = std::iter::once(0)
        .chain(row_ends.iter().map(|end| end - edge_start))
        .collect();
    let values = rows.clone().map(|v| program.initial_value(v, nv)).collect();
    let active: Vec<VertexId> = rows.clone().filter(|&v| program.initially_active(v)).collect();
    let count = active.len();
    let frontier = Frontier::build(active, &rows, program.frontier_policy(), frontier_capacity, part)?;

    let csr = LocalCsr {
        row_ptr,
        col_idx: cols,
        weights,
    };
    let mut piece = GraphPiece::new(part, rows, csr, degrees, num_parts);
    piece.init_frontier(&frontier, frontier_capacity)?;

    tracing::debug!(
        part,
        nv = piece.nv(),
        ne = piece.ne(),
        active = count,
        frontier = ?frontier.kind(),
        "piece initialised"
    );
    Ok(InitOutput {
        piece,
        values,
        active: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{PullPageRank, PushBfs};
    use crate::storage::{FileHeader, FrontierKind};

    fn loaded() -> LoadedPartition {
        LoadedPartition {
            part: 1,
            header: FileHeader { ne: 6, nv: 6 },
            rows: 3..6,
            edge_start: 4,
            row_ends: vec![5, 5, 6],
            cols: vec![0, 1],
            weights: vec![1.0, 2.0],
        }
    }

    #[test]
    fn test_rebased_row_pointers() {
        let out = init_piece(&PullPageRank::default(), loaded(), Arc::from(vec![1; 6]), 6, 2, 9).unwrap();
        assert_eq!(out.piece.row_ptr(), &[0, 1, 1, 2]);
        assert_eq!(out.piece.row(5).0, &[1]);
        assert_eq!(out.values.len(), 3);
        assert!((out.values[0] - 1.0 / 6.0).abs() < 1e-7);
        assert_eq!(out.active, 0);
    }

    #[test]
    fn test_bfs_source_in_initial_frontier() {
        let out = init_piece(&PushBfs { source: 4 }, loaded(), Arc::from(vec![1; 6]), 6, 2, 9).unwrap();
        assert_eq!(out.values, vec![u32::MAX, 0, u32::MAX]);
        let frontier = out.piece.current_frontier().unwrap();
        assert_eq!(frontier.active_vertices(3), vec![4]);
        // 1 of 3 active is above the sparse threshold
        assert_eq!(frontier.kind(), FrontierKind::DenseBitmap);
    }

    #[test]
    fn test_capacity_too_small() {
        let err = init_piece(&PushBfs { source: 4 }, loaded(), Arc::from(vec![1; 6]), 6, 2, 4).unwrap_err();
        assert!(matches!(err, FormatError::FrontierOverflow { part: 1, .. }));
    }
}
