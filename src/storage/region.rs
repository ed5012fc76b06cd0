//! Logical regions as an arena of named byte ranges
//!
//! A region is a flat byte range; its partitioning is a table from partition
//! index to a disjoint sub-range. A "logical partition" is just that computed
//! slice, not a separate object.

use super::buffer::BufferIndex;
use super::partition::PartitionBounds;
use super::{EdgeId, VertexId};
use std::fmt;
use std::ops::Range;

/// Names of the graph's logical regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionId {
    /// Local row pointers (device resident)
    RowPtr,
    /// Row-end entries as loaded from the file
    RawRow,
    /// Vertex ids resident on each piece
    InVtx,
    /// Column indices (device resident)
    ColIdx,
    /// Column ids as loaded from the file
    RawCol,
    /// Per-vertex out-degree
    Degree,
    /// Edge weights as loaded from the file
    RawWeight,
    /// Frontier queue, double buffered
    Frontier(BufferIndex),
    /// Per-vertex values or distances, double buffered
    Value(BufferIndex),
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowPtr => f.write_str("row_ptr"),
            Self::RawRow => f.write_str("raw_row"),
            Self::InVtx => f.write_str("in_vtx"),
            Self::ColIdx => f.write_str("col_idx"),
            Self::RawCol => f.write_str("raw_col"),
            Self::Degree => f.write_str("degree"),
            Self::RawWeight => f.write_str("raw_weight"),
            Self::Frontier(i) => write!(f, "frontier[{i}]"),
            Self::Value(i) => write!(f, "value[{i}]"),
        }
    }
}

/// Region argument of a task: whole region or one partition's sub-range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionRequirement {
    /// Region
    pub region: RegionId,
    /// Partition index, `None` for the whole region
    pub part: Option<usize>,
}

impl RegionRequirement {
    /// One partition's slice of a region
    #[must_use]
    pub const fn part(region: RegionId, part: usize) -> Self {
        Self {
            region,
            part: Some(part),
        }
    }

    /// Whole region
    #[must_use]
    pub const fn whole(region: RegionId) -> Self {
        Self { region, part: None }
    }
}

/// One named byte range with its partition table
#[derive(Debug, Clone)]
pub struct LogicalRegion {
    id: RegionId,
    len: u64,
    parts: Vec<Range<u64>>,
}

impl LogicalRegion {
    fn per_vertex(id: RegionId, bounds: &PartitionBounds, nv: VertexId, width: u64) -> Self {
        Self {
            id,
            len: u64::from(nv).saturating_mul(width),
            parts: bounds
                .all_rows()
                .iter()
                .map(|r| u64::from(r.start).saturating_mul(width)..u64::from(r.end).saturating_mul(width))
                .collect(),
        }
    }

    fn per_edge(id: RegionId, bounds: &PartitionBounds, ne: EdgeId, width: u64) -> Self {
        Self {
            id,
            len: ne.saturating_mul(width),
            parts: (0..bounds.num_parts())
                .map(|p| {
                    let e = bounds.edges(p);
                    e.start.saturating_mul(width)..e.end.saturating_mul(width)
                })
                .collect(),
        }
    }

    /// Region name
    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    /// Total byte length
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the region holds no bytes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range of one partition, `None` past the last partition
    #[must_use]
    pub fn subregion(&self, part: usize) -> Option<Range<u64>> {
        self.parts.get(part).cloned()
    }
}

/// All logical regions of a graph
#[derive(Debug, Clone)]
pub struct RegionArena {
    regions: Vec<LogicalRegion>,
}

impl RegionArena {
    /// Lay out every region for the given partitioning
    ///
    /// `value_width` is the byte size of one vertex value.
    #[must_use]
    pub fn build(bounds: &PartitionBounds, nv: VertexId, ne: EdgeId, frontier_size: u64, value_width: u64) -> Self {
        let frontier = |i| LogicalRegion {
            id: RegionId::Frontier(i),
            len: frontier_size,
            parts: (0..bounds.num_parts()).map(|p| bounds.frontier(p)).collect(),
        };

        let regions = vec![
            LogicalRegion::per_vertex(RegionId::RowPtr, bounds, nv, 8),
            LogicalRegion::per_vertex(RegionId::RawRow, bounds, nv, 8),
            LogicalRegion::per_vertex(RegionId::InVtx, bounds, nv, 4),
            LogicalRegion::per_edge(RegionId::ColIdx, bounds, ne, 4),
            LogicalRegion::per_edge(RegionId::RawCol, bounds, ne, 4),
            LogicalRegion::per_vertex(RegionId::Degree, bounds, nv, 4),
            LogicalRegion::per_edge(RegionId::RawWeight, bounds, ne, 4),
            frontier(0),
            frontier(1),
            LogicalRegion::per_vertex(RegionId::Value(0), bounds, nv, value_width),
            LogicalRegion::per_vertex(RegionId::Value(1), bounds, nv, value_width),
        ];
        Self { regions }
    }

    /// Look up a region
    ///
    /// Only buffer indices 0 and 1 of [`RegionId::Frontier`] and
    /// [`RegionId::Value`] are laid out.
    #[must_use]
    pub fn get(&self, id: RegionId) -> Option<&LogicalRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Byte range a requirement covers, `None` for an unknown region or partition
    #[must_use]
    pub fn range(&self, req: &RegionRequirement) -> Option<Range<u64>> {
        let region = self.get(req.region)?;
        match req.part {
            Some(p) => region.subregion(p),
            None => Some(0..region.len()),
        }
    }

    /// Bytes a requirement covers
    #[must_use]
    pub fn bytes(&self, req: &RegionRequirement) -> Option<u64> {
        self.range(req).map(|r| r.end - r.start)
    }

    /// Iterate regions
    pub fn iter(&self) -> impl Iterator<Item = &LogicalRegion> {
        self.regions.iter()
    }
}
