//! Processor → memory affinity resolution
//!
//! Every GPU must have exactly one frame-buffer and exactly one zero-copy
//! memory with affinity to it; every CPU exactly one zero-copy memory. This
//! is a property of the target hardware, so a violation is a configuration
//! error rather than something to work around.

use super::topology::{MachineTopology, MemoryId, MemoryKind, ProcessorId, ProcessorKind};
use crate::error::PlacementError;
use std::collections::BTreeMap;

/// Resolved per-processor memories
#[derive(Debug, Clone, Default)]
pub struct MemoryAffinity {
    frame_buffer: BTreeMap<ProcessorId, MemoryId>,
    zero_copy: BTreeMap<ProcessorId, MemoryId>,
}

impl MemoryAffinity {
    /// Resolve affinities for every processor in `topology`
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::MissingAffinity`] naming the first processor
    /// without exactly one required memory
    pub fn resolve(topology: &MachineTopology) -> Result<Self, PlacementError> {
        let mut affinity = Self::default();

        for proc in &topology.processors {
            let unique = |kind: MemoryKind| {
                let found: Vec<MemoryId> = topology
                    .memories_with_affinity(proc.id, kind)
                    .map(|m| m.id)
                    .collect();
                match found.as_slice() {
                    [only] => Ok(*only),
                    _ => Err(PlacementError::MissingAffinity {
                        processor: proc.id,
                        kind: proc.kind,
                        memory: kind,
                        found: found.len(),
                    }),
                }
            };

            if proc.kind == ProcessorKind::Gpu {
                affinity
                    .frame_buffer
                    .insert(proc.id, unique(MemoryKind::FrameBuffer)?);
            }
            affinity.zero_copy.insert(proc.id, unique(MemoryKind::ZeroCopy)?);
        }

        Ok(affinity)
    }

    /// Frame-buffer of a GPU
    #[must_use]
    pub fn frame_buffer(&self, proc: ProcessorId) -> Option<MemoryId> {
        self.frame_buffer.get(&proc).copied()
    }

    /// Zero-copy memory of a GPU or CPU
    #[must_use]
    pub fn zero_copy(&self, proc: ProcessorId) -> Option<MemoryId> {
        self.zero_copy.get(&proc).copied()
    }
}
