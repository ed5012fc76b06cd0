//! Task pipeline: Load → Scan → Init → repeat{Step}
//!
//! Stages are strictly ordered. Every launch consults the placement planner,
//! and every stage ends with a full barrier.

pub mod dispatch;
pub mod init;
pub mod load;
pub mod piece;
pub mod scan;
pub mod stage;
pub mod step;
pub mod task;

pub use dispatch::{Pipeline, PlacementRecord, StepReport};
pub use load::LoadedPartition;
pub use piece::{ExecStream, GraphPiece, LocalCsr};
pub use scan::ScanSummary;
pub use stage::PipelineStage;
pub use task::{TaskArgs, TaskDescriptor, TaskKind};
