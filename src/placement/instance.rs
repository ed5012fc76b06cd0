//! Physical instances of logical regions
//!
//! An instance is one region sub-range materialised in one memory. Instances
//! are created on first use and reused by every later task that maps the
//! same sub-range to the same memory, so a partition's resident arrays are
//! paid for once per run.

use super::topology::{MachineTopology, MemoryId, ProcessorId};
use crate::error::PlacementError;
use crate::pipeline::TaskKind;
use crate::storage::RegionRequirement;
use std::collections::HashMap;

/// Key of a physical instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    /// Region and sub-range
    pub requirement: RegionRequirement,
    /// Memory holding it
    pub memory: MemoryId,
}

/// One instance request of a task launch
#[derive(Debug, Clone, Copy)]
pub struct InstanceRequest {
    /// Task kind being mapped
    pub task: TaskKind,
    /// Position of the region in the task's argument list
    pub region_index: usize,
    /// Region and sub-range
    pub requirement: RegionRequirement,
    /// Size in bytes
    pub bytes: u64,
    /// Processor the task runs on
    pub processor: ProcessorId,
    /// Memory chosen by the planner
    pub memory: MemoryId,
}

/// Instance creation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceStats {
    /// Instances created
    pub created: usize,
    /// Requests served by an existing instance
    pub reused: usize,
    /// Bytes allocated across all memories
    pub allocated_bytes: u64,
}

/// Per-memory capacity accounting
#[derive(Debug, Clone)]
pub struct InstanceManager {
    capacity: HashMap<MemoryId, u64>,
    used: HashMap<MemoryId, u64>,
    instances: HashMap<InstanceKey, u64>,
    stats: InstanceStats,
}

impl InstanceManager {
    /// Track every memory of `topology`
    #[must_use]
    pub fn new(topology: &MachineTopology) -> Self {
        Self {
            capacity: topology.memories.iter().map(|m| (m.id, m.capacity)).collect(),
            used: HashMap::new(),
            instances: HashMap::new(),
            stats: InstanceStats::default(),
        }
    }

    /// Create or reuse the instance for `request`
    ///
    /// Returns `true` if an existing instance was reused.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::ResourceExhausted`] if the memory cannot hold
    /// the instance; there is no fallback memory
    pub fn acquire(&mut self, request: &InstanceRequest) -> Result<bool, PlacementError> {
        let key = InstanceKey {
            requirement: request.requirement,
            memory: request.memory,
        };
        if self.instances.contains_key(&key) {
            self.stats.reused += 1;
            return Ok(true);
        }

        let available = self.available(request.memory);
        if request.bytes > available {
            return Err(PlacementError::ResourceExhausted {
                task: request.task,
                region_index: request.region_index,
                region: request.requirement.region.to_string(),
                processor: request.processor,
                memory: request.memory,
                requested: request.bytes,
                available,
            });
        }

        *self.used.entry(request.memory).or_default() += request.bytes;
        self.instances.insert(key, request.bytes);
        self.stats.created += 1;
        self.stats.allocated_bytes += request.bytes;
        tracing::debug!(
            task = ?request.task,
            region = %request.requirement.region,
            part = ?request.requirement.part,
            memory = %request.memory,
            bytes = request.bytes,
            "instance created"
        );
        Ok(false)
    }

    /// Bytes in use in `memory`
    #[must_use]
    pub fn used(&self, memory: MemoryId) -> u64 {
        self.used.get(&memory).copied().unwrap_or(0)
    }

    /// Bytes still free in `memory` (zero for unknown memories)
    #[must_use]
    pub fn available(&self, memory: MemoryId) -> u64 {
        self.capacity
            .get(&memory)
            .map_or(0, |cap| cap.saturating_sub(self.used(memory)))
    }

    /// Whether an instance exists
    #[must_use]
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Creation counters
    #[must_use]
    pub const fn stats(&self) -> InstanceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::topology::UniformTopology;
    use crate::storage::RegionId;

    fn topology(fb: u64) -> MachineTopology {
        MachineTopology::uniform(UniformTopology {
            nodes: 1,
            gpus_per_node: 1,
            cpus_per_node: 1,
            fb_capacity: fb,
            zc_capacity: 1 << 20,
        })
    }

    fn request(region: RegionId, part: usize, bytes: u64) -> InstanceRequest {
        InstanceRequest {
            task: TaskKind::Init,
            region_index: 0,
            requirement: RegionRequirement::part(region, part),
            bytes,
            processor: ProcessorId(0),
            memory: MemoryId(0),
        }
    }

    #[test]
    fn test_reuse_same_key() {
        let mut mgr = InstanceManager::new(&topology(100));
        assert!(!mgr.acquire(&request(RegionId::RowPtr, 0, 40)).unwrap());
        assert!(mgr.acquire(&request(RegionId::RowPtr, 0, 40)).unwrap());
        assert_eq!(mgr.used(MemoryId(0)), 40);
        assert_eq!(mgr.stats().created, 1);
        assert_eq!(mgr.stats().reused, 1);
    }

    #[test]
    fn test_exhaustion_reports_request() {
        let mut mgr = InstanceManager::new(&topology(100));
        mgr.acquire(&request(RegionId::RowPtr, 0, 80)).unwrap();
        let mut req = request(RegionId::ColIdx, 0, 30);
        req.region_index = 2;
        match mgr.acquire(&req).unwrap_err() {
            PlacementError::ResourceExhausted {
                region_index,
                region,
                memory,
                requested,
                available,
                ..
            } => {
                assert_eq!(region_index, 2);
                assert_eq!(region, "col_idx");
                assert_eq!(memory, MemoryId(0));
                assert_eq!(requested, 30);
                assert_eq!(available, 20);
            }
            other => panic!("unexpected error {other}"),
        }
        // Failed request leaves accounting untouched
        assert_eq!(mgr.used(MemoryId(0)), 80);
    }

    #[test]
    fn test_unknown_memory_has_no_capacity() {
        let mut mgr = InstanceManager::new(&topology(100));
        let mut req = request(RegionId::Degree, 0, 1);
        req.memory = MemoryId(99);
        assert!(mgr.acquire(&req).is_err());
    }
}
