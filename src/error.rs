//! Error taxonomy
//!
//! Every error aborts the run; nothing here is recovered locally.
//! - [`ConfigError`]: invalid configuration inputs
//! - [`PlacementError`]: topology/affinity problems and memory exhaustion
//! - [`FormatError`]: inconsistent graph file or frontier bytes

use crate::placement::{MemoryId, MemoryKind, ProcessorId, ProcessorKind};
use crate::pipeline::TaskKind;
use thiserror::Error;

/// Invalid engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Partition count must be at least one
    #[error("partition count must be at least 1")]
    ZeroPartitions,

    /// Placement stride of zero pins every partition to one processor per node
    #[error("placement stride must be at least 1")]
    ZeroStride,

    /// Frontier capacity too small for a partition's dense bitmap
    #[error("frontier capacity {available} bytes for partition {part} is below the dense bitmap size {required}")]
    FrontierTooSmall {
        /// Partition index
        part: usize,
        /// Bytes needed for header + bitmap
        required: u64,
        /// Bytes assigned by the frontier split
        available: u64,
    },

    /// Program layout differs from the configured layout
    #[error("program '{program}' expects {expected:?} layout, config says {configured:?}")]
    LayoutMismatch {
        /// Program name
        program: String,
        /// Layout the program needs
        expected: crate::storage::Layout,
        /// Layout in the config
        configured: crate::storage::Layout,
    },

    /// TOML could not be parsed or serialised
    #[error("TOML error: {0}")]
    Toml(String),

    /// Config file could not be read
    #[error("cannot read config '{path}': {detail}")]
    Read {
        /// File path
        path: String,
        /// I/O error text
        detail: String,
    },
}

/// Placement planner and instance creation errors
#[derive(Debug, Error)]
pub enum PlacementError {
    /// A processor lacks exactly one memory of a required kind
    #[error("processor {processor} ({kind:?}) needs exactly one {memory:?} memory with affinity, found {found}")]
    MissingAffinity {
        /// Offending processor
        processor: ProcessorId,
        /// Its kind
        kind: ProcessorKind,
        /// Memory kind that was looked up
        memory: MemoryKind,
        /// Number of matching memories
        found: usize,
    },

    /// The topology has no processor of the kind a task category needs
    #[error("node {node} has no {kind:?} processor")]
    UnsupportedKind {
        /// Node that was selected
        node: u32,
        /// Required processor kind
        kind: ProcessorKind,
    },

    /// A task kind reached a processor of the wrong kind
    #[error("{task:?} task cannot run on {kind:?} processor {processor}")]
    KindMismatch {
        /// Task kind being mapped
        task: TaskKind,
        /// Target processor
        processor: ProcessorId,
        /// Its kind
        kind: ProcessorKind,
    },

    /// The cached slicing was computed for a different domain
    #[error("cached {category} slicing covers {cached} points, launch asked for {requested}")]
    DomainMismatch {
        /// Task category name
        category: &'static str,
        /// Cached point count
        cached: usize,
        /// Requested point count
        requested: usize,
    },

    /// The topology has no processors at all
    #[error("machine topology has no processors")]
    EmptyTopology,

    /// Intra-node stride of zero maps every point of a node to one processor
    #[error("placement stride must be at least 1")]
    ZeroStride,

    /// Processor id not present in the topology
    #[error("unknown processor {0}")]
    UnknownProcessor(ProcessorId),

    /// A task names a region or partition the graph does not lay out
    #[error("{task:?} task names region {region} which is not laid out")]
    UnknownRegion {
        /// Task kind being mapped
        task: TaskKind,
        /// Region name with partition
        region: String,
    },

    /// Instance creation failed at the chosen memory
    #[error("{task:?} task: instance for region #{region_index} ({region}) on {processor} in {memory} needs {requested} bytes, {available} available")]
    ResourceExhausted {
        /// Task kind being mapped
        task: TaskKind,
        /// Position of the region in the task's argument list
        region_index: usize,
        /// Region name
        region: String,
        /// Target processor
        processor: ProcessorId,
        /// Chosen memory
        memory: MemoryId,
        /// Bytes requested
        requested: u64,
        /// Bytes left in the memory
        available: u64,
    },
}

impl PlacementError {
    /// Whether this is a configuration error (as opposed to resource exhaustion)
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        !matches!(self, Self::ResourceExhausted { .. })
    }
}

/// Graph file and frontier format errors
#[derive(Debug, Error)]
pub enum FormatError {
    /// Fewer bytes than the header or a section requires
    #[error("truncated {what}: need {needed} bytes, have {have}")]
    Truncated {
        /// Section being decoded
        what: &'static str,
        /// Bytes required
        needed: u64,
        /// Bytes present
        have: u64,
    },

    /// Header counts describe more bytes than a file offset can address
    #[error("header (ne={ne}, nv={nv}) describes a file larger than u64::MAX bytes")]
    HeaderOverflow {
        /// Edge count from the header
        ne: u64,
        /// Vertex count from the header
        nv: u32,
    },

    /// Partition headers disagree
    #[error("partition {part} header (ne={ne}, nv={nv}) differs from partition 0 (ne={ne0}, nv={nv0})")]
    HeaderMismatch {
        /// Partition index
        part: usize,
        /// Its edge count
        ne: u64,
        /// Its vertex count
        nv: u32,
        /// Partition 0 edge count
        ne0: u64,
        /// Partition 0 vertex count
        nv0: u32,
    },

    /// Row-end offsets decrease
    #[error("row index decreases at vertex {vertex}")]
    NonMonotoneRows {
        /// First vertex whose row end is below its predecessor
        vertex: u32,
    },

    /// Edge ranges of consecutive partitions are not contiguous
    #[error("partition {part} starts at edge {start}, previous partition ended at {expected}")]
    EdgeRangeGap {
        /// Partition index
        part: usize,
        /// Its first edge
        start: u64,
        /// Where it should start
        expected: u64,
    },

    /// Final row end differs from the header edge count
    #[error("row index ends at edge {found}, header says ne={expected}")]
    EdgeCountMismatch {
        /// Header edge count
        expected: u64,
        /// Last row end
        found: u64,
    },

    /// Loaded rows do not sum to the header vertex count
    #[error("partitions cover {found} vertices, header says nv={expected}")]
    VertexCountMismatch {
        /// Header vertex count
        expected: u32,
        /// Sum of partition rows
        found: u64,
    },

    /// Column id outside `[0, nv)`
    #[error("edge {edge} references vertex {vertex}, nv={nv}")]
    ColumnOutOfRange {
        /// Global edge index
        edge: u64,
        /// Referenced vertex
        vertex: u32,
        /// Vertex count
        nv: u32,
    },

    /// Frontier header tag is neither dense nor sparse
    #[error("unknown frontier tag {0:#010x}")]
    BadFrontierTag(u32),

    /// Frontier does not fit its partition's capacity even as a bitmap
    #[error("frontier of partition {part} needs {needed} bytes, capacity {capacity}")]
    FrontierOverflow {
        /// Partition index
        part: usize,
        /// Encoded size
        needed: u64,
        /// Partition capacity
        capacity: u64,
    },
}

/// Top-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Placement or resource error
    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    /// Data format error
    #[error("data format error: {0}")]
    Format(#[from] FormatError),

    /// File I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stage was launched out of order
    #[error("cannot launch {requested:?} while pipeline is at {current:?}")]
    StageOrder {
        /// Stage that was requested
        requested: crate::pipeline::PipelineStage,
        /// Stage the pipeline is at
        current: crate::pipeline::PipelineStage,
    },

    /// A point task panicked or was cancelled
    #[error("{task:?} task for partition {part} did not complete: {detail}")]
    TaskFailed {
        /// Task kind
        task: TaskKind,
        /// Partition index
        part: usize,
        /// Join error text
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_error_display_names_processor() {
        let err = PlacementError::MissingAffinity {
            processor: ProcessorId(7),
            kind: ProcessorKind::Gpu,
            memory: MemoryKind::ZeroCopy,
            found: 0,
        };
        let text = err.to_string();
        assert!(text.contains("proc#7"), "{text}");
        assert!(text.contains("ZeroCopy"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_resource_exhausted_is_not_configuration() {
        let err = PlacementError::ResourceExhausted {
            task: TaskKind::Init,
            region_index: 1,
            region: "col_idx".to_string(),
            processor: ProcessorId(2),
            memory: MemoryId(5),
            requested: 4096,
            available: 16,
        };
        assert!(!err.is_configuration());
        let text = err.to_string();
        assert!(text.contains("region #1"));
        assert!(text.contains("mem#5"));
    }

    #[test]
    fn test_engine_error_wraps_format() {
        let err: EngineError = FormatError::BadFrontierTag(0xdead_beef).into();
        assert_eq!(
            err.to_string(),
            "data format error: unknown frontier tag 0xdeadbeef"
        );
    }
}
