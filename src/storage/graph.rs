//! Partitioned graph: sizes, partition bounds and the region arena
//!
//! Built once from the file header and row index, immutable afterwards.

use super::format::{self, FileHeader, PartitionByteRanges};
use super::frontier::dense_capacity;
use super::partition::{edge_range, split_balanced, split_by_edges, Layout, PartitionBounds, SplitPolicy};
use super::region::RegionArena;
use super::{EdgeId, VertexId};
use crate::error::{ConfigError, EngineError, FormatError};
use anyhow::{Context, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Partitioning inputs threaded in from the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    /// Partition count
    pub num_parts: usize,
    /// Execution layout of the file
    pub layout: Layout,
    /// Row split policy
    pub split: SplitPolicy,
    /// Total frontier capacity in bytes; derived from partition sizes when `None`
    pub frontier_size: Option<u64>,
}

/// Process-wide partitioned graph
#[derive(Debug, Clone)]
pub struct Graph {
    path: PathBuf,
    layout: Layout,
    header: FileHeader,
    frontier_size: u64,
    bounds: Arc<PartitionBounds>,
    regions: RegionArena,
}

impl Graph {
    /// Read header and row index of `path` and partition the graph
    ///
    /// `value_width` is the byte size of one vertex value.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the options are invalid
    pub async fn open<P: AsRef<Path>>(path: P, options: GraphOptions, value_width: u64) -> Result<Self> {
        let path = path.as_ref();
        let header = format::read_header(path)
            .await
            .with_context(|| format!("Failed to read header of {}", path.display()))?;
        let row_ends = format::read_row_index(path, &header)
            .await
            .with_context(|| format!("Failed to read row index of {}", path.display()))?;
        Ok(Self::from_row_index(path, header, &row_ends, options, value_width)?)
    }

    /// Partition a graph whose header and row index are already in memory
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero partition count or a frontier
    /// capacity too small for some partition, [`FormatError`] if the header
    /// counts overflow or the row index length disagrees with the header
    pub fn from_row_index(
        path: &Path,
        header: FileHeader,
        row_ends: &[EdgeId],
        options: GraphOptions,
        value_width: u64,
    ) -> Result<Self, EngineError> {
        let num_parts = options.num_parts;
        if num_parts == 0 {
            return Err(ConfigError::ZeroPartitions.into());
        }
        if header.checked_file_len().is_none() {
            return Err(FormatError::HeaderOverflow {
                ne: header.ne,
                nv: header.nv,
            }
            .into());
        }
        if row_ends.len() != header.nv as usize {
            return Err(FormatError::VertexCountMismatch {
                expected: header.nv,
                found: row_ends.len() as u64,
            }
            .into());
        }
        if num_parts > header.nv as usize {
            tracing::warn!(
                num_parts,
                nv = header.nv,
                "more partitions than vertices, trailing partitions are empty"
            );
        }

        #[allow(clippy::cast_possible_truncation)]
        let rows: Vec<Range<VertexId>> = match options.split {
            SplitPolicy::VertexBalanced => split_balanced(u64::from(header.nv), num_parts)
                .into_iter()
                .map(|r| r.start as VertexId..r.end as VertexId)
                .collect(),
            SplitPolicy::EdgeBalanced => split_by_edges(row_ends, num_parts),
        };
        let edges: Vec<Range<EdgeId>> = rows.iter().map(|r| edge_range(row_ends, r)).collect();

        let dense: Vec<u64> = rows
            .iter()
            .map(|r| dense_capacity(u64::from(r.end - r.start)))
            .collect();
        let (frontier_size, frontier) = match options.frontier_size {
            Some(total) => {
                let ranges = split_balanced(total, num_parts);
                for (part, (range, required)) in ranges.iter().zip(&dense).enumerate() {
                    let available = range.end - range.start;
                    if available < *required {
                        return Err(ConfigError::FrontierTooSmall {
                            part,
                            required: *required,
                            available,
                        }
                        .into());
                    }
                }
                (total, ranges)
            }
            None => {
                let mut start = 0;
                let ranges: Vec<Range<u64>> = dense
                    .iter()
                    .map(|len| {
                        let r = start..start + len;
                        start += len;
                        r
                    })
                    .collect();
                (start, ranges)
            }
        };

        let bounds = PartitionBounds::new(rows, edges, frontier);
        let regions = RegionArena::build(&bounds, header.nv, header.ne, frontier_size, value_width);

        tracing::info!(
            nv = header.nv,
            ne = header.ne,
            num_parts,
            layout = ?options.layout,
            frontier_size,
            "graph partitioned"
        );

        Ok(Self {
            path: path.to_path_buf(),
            layout: options.layout,
            header,
            frontier_size,
            bounds: Arc::new(bounds),
            regions,
        })
    }

    /// Graph file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execution layout
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// File header
    #[must_use]
    pub const fn header(&self) -> FileHeader {
        self.header
    }

    /// Partition count
    #[must_use]
    pub fn num_parts(&self) -> usize {
        self.bounds.num_parts()
    }

    /// Total vertex count
    #[must_use]
    pub const fn nv(&self) -> VertexId {
        self.header.nv
    }

    /// Total edge count
    #[must_use]
    pub const fn ne(&self) -> EdgeId {
        self.header.ne
    }

    /// Total frontier capacity in bytes
    #[must_use]
    pub const fn frontier_size(&self) -> u64 {
        self.frontier_size
    }

    /// Partition bounds (shared with tasks)
    #[must_use]
    pub fn bounds(&self) -> &Arc<PartitionBounds> {
        &self.bounds
    }

    /// Region arena
    #[must_use]
    pub const fn regions(&self) -> &RegionArena {
        &self.regions
    }

    /// `rowLeft[part]`
    #[must_use]
    pub fn row_left(&self, part: usize) -> VertexId {
        self.bounds.row_left(part)
    }

    /// `rowRight[part]` (exclusive)
    #[must_use]
    pub fn row_right(&self, part: usize) -> VertexId {
        self.bounds.row_right(part)
    }

    /// `fqLeft[part]`
    #[must_use]
    pub fn fq_left(&self, part: usize) -> u64 {
        self.bounds.frontier(part).start
    }

    /// `fqRight[part]` (exclusive)
    #[must_use]
    pub fn fq_right(&self, part: usize) -> u64 {
        self.bounds.frontier(part).end
    }

    /// File byte ranges a Load task reads for `part`
    #[must_use]
    pub fn byte_ranges(&self, part: usize) -> PartitionByteRanges {
        self.header
            .partition_ranges(&self.bounds.rows(part), &self.bounds.edges(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(num_parts: usize) -> GraphOptions {
        GraphOptions {
            num_parts,
            layout: Layout::Pull,
            split: SplitPolicy::VertexBalanced,
            frontier_size: None,
        }
    }

    fn chain_index(nv: u32) -> Vec<u64> {
        (1..=u64::from(nv)).collect()
    }

    #[test]
    fn test_four_way_split_of_hundred() {
        let header = FileHeader { ne: 100, nv: 100 };
        let graph = Graph::from_row_index(Path::new("g.bin"), header, &chain_index(100), options(4), 4).unwrap();
        let sizes: Vec<u32> = (0..4).map(|p| graph.row_right(p) - graph.row_left(p)).collect();
        assert_eq!(sizes, vec![25, 25, 25, 25]);
        assert_eq!(graph.bounds().edges(3), 75..100);
    }

    #[test]
    fn test_default_frontier_ranges_cover() {
        let header = FileHeader { ne: 10, nv: 10 };
        let graph = Graph::from_row_index(Path::new("g.bin"), header, &chain_index(10), options(3), 4).unwrap();
        assert_eq!(graph.fq_left(0), 0);
        for p in 1..3 {
            assert_eq!(graph.fq_left(p), graph.fq_right(p - 1));
        }
        assert_eq!(graph.fq_right(2), graph.frontier_size());
        // 4 vertices → 8 + 1 bytes
        assert_eq!(graph.fq_right(0), 9);
    }

    #[test]
    fn test_zero_parts_rejected() {
        let header = FileHeader { ne: 1, nv: 1 };
        let err = Graph::from_row_index(Path::new("g.bin"), header, &[1], options(0), 4).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::ZeroPartitions)));
    }

    #[test]
    fn test_explicit_frontier_too_small() {
        let header = FileHeader { ne: 64, nv: 64 };
        let opts = GraphOptions {
            frontier_size: Some(20),
            ..options(2)
        };
        let err = Graph::from_row_index(Path::new("g.bin"), header, &chain_index(64), opts, 4).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::FrontierTooSmall { part: 0, required: 12, available: 10 })
        ));
    }

    #[test]
    fn test_row_index_length_checked() {
        let header = FileHeader { ne: 3, nv: 4 };
        let err = Graph::from_row_index(Path::new("g.bin"), header, &[1, 2, 3], options(2), 4).unwrap_err();
        assert!(matches!(err, EngineError::Format(FormatError::VertexCountMismatch { .. })));
    }

    #[test]
    fn test_overflowing_edge_count_rejected() {
        let header = FileHeader { ne: u64::MAX / 2, nv: 3 };
        let err = Graph::from_row_index(Path::new("g.bin"), header, &[1, 2, 3], options(2), 4).unwrap_err();
        assert!(matches!(err, EngineError::Format(FormatError::HeaderOverflow { nv: 3, .. })));
    }
}
