//! Tagged task descriptors
//!
//! Each stage launches one descriptor; its region argument list is fixed
//! per kind so the planner's positional memory binding applies. GPU kinds
//! list their device-resident regions first.

use crate::placement::{ProcessorKind, TaskCategory};
use crate::storage::{BufferIndex, Layout, PartitionBounds, RegionId, RegionRequirement};
use std::ops::Range;
use std::path::PathBuf;

/// Kind of point task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Read a partition's byte ranges from the graph file
    Load,
    /// Validate every loaded partition and compute degrees
    Scan,
    /// Build a partition's resident piece
    Init,
    /// One iteration over a partition
    Step,
}

impl TaskKind {
    /// Processor kind the task runs on
    #[must_use]
    pub const fn processor_kind(self) -> ProcessorKind {
        match self {
            Self::Load | Self::Scan => ProcessorKind::Cpu,
            Self::Init | Self::Step => ProcessorKind::Gpu,
        }
    }

    /// Slicing category; Scan is a single task and is not sliced
    #[must_use]
    pub const fn category(self) -> Option<TaskCategory> {
        match self {
            Self::Load => Some(TaskCategory::CpuLoad),
            Self::Scan => None,
            Self::Init | Self::Step => Some(TaskCategory::GpuCompute),
        }
    }
}

/// Per-kind launch arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskArgs {
    /// Graph file to read
    Load {
        /// File path
        path: PathBuf,
    },
    /// No arguments
    Scan,
    /// Layout of the resident CSR
    Init {
        /// Pull or push
        layout: Layout,
    },
    /// Iteration and buffer roles
    Step {
        /// Pull or push
        layout: Layout,
        /// Iteration number, starting at 0
        iteration: u32,
        /// Buffer read this iteration
        read: BufferIndex,
        /// Buffer written this iteration
        write: BufferIndex,
    },
}

/// Launch of one stage over a domain of partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Task kind
    pub kind: TaskKind,
    /// Launch domain (partition indices)
    pub domain: Range<usize>,
    /// Kind-specific arguments
    pub args: TaskArgs,
}

impl TaskDescriptor {
    /// Region arguments of point `part`, in binding order
    #[must_use]
    pub fn regions(&self, part: usize) -> Vec<RegionRequirement> {
        use RegionId::{ColIdx, Degree, Frontier, InVtx, RawCol, RawRow, RawWeight, RowPtr, Value};
        let p = |id| RegionRequirement::part(id, part);
        let whole = RegionRequirement::whole;

        match &self.args {
            TaskArgs::Load { .. } => vec![p(RawRow), p(RawCol), p(RawWeight)],
            TaskArgs::Scan => vec![whole(RawRow), whole(RawCol), whole(Degree)],
            TaskArgs::Init { .. } => vec![
                p(RowPtr),
                p(InVtx),
                p(ColIdx),
                p(RawRow),
                p(RawCol),
                p(RawWeight),
                whole(Degree),
                p(Frontier(0)),
                p(Frontier(1)),
                p(Value(0)),
                p(Value(1)),
            ],
            TaskArgs::Step {
                layout: Layout::Pull,
                read,
                write,
                ..
            } => vec![
                p(RowPtr),
                p(InVtx),
                p(ColIdx),
                whole(Degree),
                whole(Value(*read)),
                p(Value(*write)),
            ],
            TaskArgs::Step {
                layout: Layout::Push,
                read,
                write,
                ..
            } => vec![
                p(RowPtr),
                p(InVtx),
                p(ColIdx),
                p(RawWeight),
                whole(Value(*read)),
                p(Value(*write)),
                p(Frontier(*read)),
                p(Frontier(*write)),
            ],
        }
    }

    /// Number of point tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.domain.len()
    }

    /// Whether the domain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }
}

/// Launch domain covering every partition
#[must_use]
pub fn full_domain(bounds: &PartitionBounds) -> Range<usize> {
    0..bounds.num_parts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::FRAME_BUFFER_REGIONS;

    #[test]
    fn test_gpu_kinds_lead_with_resident_regions() {
        for args in [
            TaskArgs::Init { layout: Layout::Pull },
            TaskArgs::Step {
                layout: Layout::Push,
                iteration: 0,
                read: 0,
                write: 1,
            },
        ] {
            let desc = TaskDescriptor {
                kind: TaskKind::Step,
                domain: 0..2,
                args,
            };
            let regions: Vec<RegionId> = desc.regions(1).iter().map(|r| r.region).collect();
            assert_eq!(
                &regions[..FRAME_BUFFER_REGIONS],
                &[RegionId::RowPtr, RegionId::InVtx, RegionId::ColIdx]
            );
        }
    }

    #[test]
    fn test_step_regions_follow_buffer_roles() {
        let desc = TaskDescriptor {
            kind: TaskKind::Step,
            domain: 0..3,
            args: TaskArgs::Step {
                layout: Layout::Pull,
                iteration: 4,
                read: 1,
                write: 0,
            },
        };
        let regions = desc.regions(2);
        assert!(regions.contains(&RegionRequirement::whole(RegionId::Value(1))));
        assert!(regions.contains(&RegionRequirement::part(RegionId::Value(0), 2)));
    }

    #[test]
    fn test_kind_routing() {
        assert_eq!(TaskKind::Load.processor_kind(), ProcessorKind::Cpu);
        assert_eq!(TaskKind::Step.category(), Some(TaskCategory::GpuCompute));
        assert_eq!(TaskKind::Scan.category(), None);
    }
}
