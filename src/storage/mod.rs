//! Graph partition store
//!
//! CSR construction, the binary graph file format, row partitioning, the
//! region arena, frontier encoding and double buffering.

pub mod buffer;
pub mod csr;
pub mod format;
pub mod frontier;
pub mod graph;
pub mod partition;
pub mod region;

#[cfg(feature = "storage")]
pub mod parquet;

/// Vertex identifier (`V_ID`)
pub type VertexId = u32;

/// Edge identifier (`E_ID`)
pub type EdgeId = u64;

pub use buffer::{BufferIndex, DoubleBuffer};
pub use csr::{CsrGraph, CsrView};
pub use format::{read_header, write_graph_file, FileHeader, PartitionByteRanges, FILE_HEADER_SIZE};
pub use frontier::{Frontier, FrontierHeader, FrontierKind, FrontierPolicy};
pub use graph::{Graph, GraphOptions};
pub use partition::{split_balanced, split_by_edges, Layout, PartitionBounds, SplitPolicy};
pub use region::{LogicalRegion, RegionArena, RegionId, RegionRequirement};

#[cfg(feature = "storage")]
pub use parquet::{read_values_parquet, write_placement_parquet, write_values_parquet};
