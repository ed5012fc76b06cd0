//! Partition placement
//!
//! Machine topology, memory affinity, the cached per-category slicing of
//! point tasks onto processors and the instance manager that materialises
//! region sub-ranges in the chosen memories.

pub mod affinity;
pub mod instance;
pub mod planner;
pub mod topology;

pub use affinity::MemoryAffinity;
pub use instance::{InstanceKey, InstanceManager, InstanceRequest, InstanceStats};
pub use planner::{PlacementPlanner, TaskCategory, TaskSlice, DEFAULT_STRIDE, FRAME_BUFFER_REGIONS};
pub use topology::{
    MachineTopology, Memory, MemoryId, MemoryKind, Processor, ProcessorId, ProcessorKind, UniformTopology,
};
