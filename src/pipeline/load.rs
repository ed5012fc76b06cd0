//! Load stage: read one partition's slice of the graph file

use crate::storage::format::{decode_f32s, decode_u32s, decode_u64s};
use crate::storage::{EdgeId, FileHeader, PartitionByteRanges, VertexId};
use anyhow::{Context, Result};
use std::ops::Range;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Raw partition data as read from disk, in zero-copy memory
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPartition {
    /// Partition index
    pub part: usize,
    /// Header as seen by this partition
    pub header: FileHeader,
    /// Vertex rows
    pub rows: Range<VertexId>,
    /// First global edge of the partition
    pub edge_start: EdgeId,
    /// Row-end offsets (global edge indices), one per row
    pub row_ends: Vec<EdgeId>,
    /// Column ids of the partition's edges
    pub cols: Vec<VertexId>,
    /// Weights of the partition's edges
    pub weights: Vec<f32>,
}

impl LoadedPartition {
    /// Bytes held
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        (self.row_ends.len() * 8 + self.cols.len() * 4 + self.weights.len() * 4) as u64
    }
}

/// Read the header and the partition's row, column and weight ranges
///
/// An inverted byte range (row index not monotone) reads nothing; Scan
/// reports the bad row.
///
/// # Errors
///
/// Returns error on I/O failure or a file shorter than the ranges
pub async fn load_partition(
    path: &Path,
    part: usize,
    rows: Range<VertexId>,
    edge_start: EdgeId,
    ranges: PartitionByteRanges,
) -> Result<LoadedPartition> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open graph file {}", path.display()))?;
    let len = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let header = FileHeader::from_bytes(&read_at(&mut file, len, ranges.header, "graph header").await?)?;
    let row_ends = decode_u64s(&read_at(&mut file, len, ranges.rows, "row index").await?, "row index")?;
    let cols = decode_u32s(&read_at(&mut file, len, ranges.cols, "columns").await?, "columns")?;
    let weights = decode_f32s(&read_at(&mut file, len, ranges.weights, "weights").await?, "weights")?;

    tracing::debug!(part, rows = ?rows, edges = cols.len(), "partition loaded");
    Ok(LoadedPartition {
        part,
        header,
        rows,
        edge_start,
        row_ends,
        cols,
        weights,
    })
}

async fn read_at(file: &mut tokio::fs::File, len: u64, range: Range<u64>, what: &'static str) -> Result<Vec<u8>> {
    let end = range.end.max(range.start);
    if end > len {
        return Err(crate::error::FormatError::Truncated {
            what,
            needed: end,
            have: len,
        }
        .into());
    }
    #[allow(clippy::cast_possible_truncation)]
    let mut buf = vec![0_u8; (end - range.start) as usize];
    file.seek(std::io::SeekFrom::Start(range.start)).await?;
    file.read_exact(&mut buf)
        .await
        .with_context(|| format!("Failed to read {what} bytes {range:?}"))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{write_graph_file, CsrGraph, Layout};

    #[tokio::test]
    async fn test_load_second_half() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.bin");
        let graph = CsrGraph::from_edge_list(&[(0, 1, 0.5), (1, 2, 1.5), (2, 3, 2.5), (3, 0, 3.5)]).unwrap();
        write_graph_file(&path, &graph, Layout::Push).await.unwrap();

        let header = FileHeader { ne: 4, nv: 4 };
        let ranges = header.partition_ranges(&(2..4), &(2..4));
        let loaded = load_partition(&path, 1, 2..4, 2, ranges).await.unwrap();
        assert_eq!(loaded.header, header);
        assert_eq!(loaded.row_ends, vec![3, 4]);
        assert_eq!(loaded.cols, vec![3, 0]);
        assert_eq!(loaded.weights, vec![2.5, 3.5]);
        assert_eq!(loaded.byte_len(), 16 + 8 + 8);
    }

    #[tokio::test]
    async fn test_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        tokio::fs::write(&path, [0_u8; 20]).await.unwrap();

        let header = FileHeader { ne: 4, nv: 4 };
        let ranges = header.partition_ranges(&(0..4), &(0..4));
        let err = load_partition(&path, 0, 0..4, 0, ranges).await.unwrap_err();
        assert!(err.downcast_ref::<crate::error::FormatError>().is_some());
    }
}
