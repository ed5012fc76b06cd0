//! Machine topology snapshot
//!
//! One-shot, read-only description of every processor in the cluster, its
//! node (address space) and the memories with affinity to it. Built once at
//! startup, either programmatically or from TOML:
//!
//! ```toml
//! [[processors]]
//! id = 0
//! kind = "gpu"
//! node = 0
//!
//! [[memories]]
//! id = 0
//! kind = "frame-buffer"
//! capacity = 17179869184
//! affinity = [0]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Processor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorId(pub u32);

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc#{}", self.0)
    }
}

/// Memory identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub u32);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem#{}", self.0)
    }
}

/// Processor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Throughput-oriented GPU
    Gpu,
    /// Latency-oriented CPU core
    Cpu,
}

/// Memory kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryKind {
    /// Device memory attached to one GPU
    FrameBuffer,
    /// Pinned host memory directly accessible by GPUs
    ZeroCopy,
    /// Ordinary host memory
    System,
}

/// One processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    /// Identifier
    pub id: ProcessorId,
    /// Kind
    pub kind: ProcessorKind,
    /// Node / address space
    pub node: u32,
}

/// One memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Identifier
    pub id: MemoryId,
    /// Kind
    pub kind: MemoryKind,
    /// Capacity in bytes
    pub capacity: u64,
    /// Processors with affinity to this memory
    pub affinity: Vec<ProcessorId>,
}

/// Shape of a homogeneous cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformTopology {
    /// Node count
    pub nodes: u32,
    /// GPUs per node
    pub gpus_per_node: u32,
    /// CPUs per node
    pub cpus_per_node: u32,
    /// Frame-buffer bytes per GPU
    pub fb_capacity: u64,
    /// Zero-copy bytes per node
    pub zc_capacity: u64,
}

impl Default for UniformTopology {
    fn default() -> Self {
        Self {
            nodes: 1,
            gpus_per_node: 4,
            cpus_per_node: 2,
            fb_capacity: 16 << 30,
            zc_capacity: 64 << 30,
        }
    }
}

/// Processors and memories of the whole cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTopology {
    /// All processors
    #[serde(default)]
    pub processors: Vec<Processor>,
    /// All memories
    #[serde(default)]
    pub memories: Vec<Memory>,
}

impl MachineTopology {
    /// Homogeneous cluster
    ///
    /// Every GPU gets its own frame-buffer; each node has one zero-copy
    /// memory shared by its GPUs and CPUs and one system memory for its CPUs.
    #[must_use]
    pub fn uniform(shape: UniformTopology) -> Self {
        let mut topo = Self::default();
        let mut next_proc = 0;
        let mut next_mem = 0;
        let mut alloc_mem = |topo: &mut Self, kind, capacity, affinity| {
            topo.memories.push(Memory {
                id: MemoryId(next_mem),
                kind,
                capacity,
                affinity,
            });
            next_mem += 1;
        };

        for node in 0..shape.nodes {
            let mut gpus = Vec::new();
            let mut cpus = Vec::new();
            for kind in [ProcessorKind::Gpu, ProcessorKind::Cpu] {
                let count = match kind {
                    ProcessorKind::Gpu => shape.gpus_per_node,
                    ProcessorKind::Cpu => shape.cpus_per_node,
                };
                for _ in 0..count {
                    let id = ProcessorId(next_proc);
                    next_proc += 1;
                    topo.processors.push(Processor { id, kind, node });
                    match kind {
                        ProcessorKind::Gpu => gpus.push(id),
                        ProcessorKind::Cpu => cpus.push(id),
                    }
                }
            }
            for gpu in &gpus {
                alloc_mem(&mut topo, MemoryKind::FrameBuffer, shape.fb_capacity, vec![*gpu]);
            }
            let shared: Vec<ProcessorId> = gpus.iter().chain(&cpus).copied().collect();
            alloc_mem(&mut topo, MemoryKind::ZeroCopy, shape.zc_capacity, shared);
            alloc_mem(&mut topo, MemoryKind::System, shape.zc_capacity, cpus);
        }
        topo
    }

    /// Parse from TOML
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Load from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Serialise to TOML
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if serialisation fails
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Find a processor
    #[must_use]
    pub fn processor(&self, id: ProcessorId) -> Option<&Processor> {
        self.processors.iter().find(|p| p.id == id)
    }

    /// Find a memory
    #[must_use]
    pub fn memory(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    /// Distinct node ids, ascending
    #[must_use]
    pub fn nodes(&self) -> Vec<u32> {
        self.processors
            .iter()
            .map(|p| p.node)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Memories of `kind` with affinity to `proc`
    pub fn memories_with_affinity(
        &self,
        proc: ProcessorId,
        kind: MemoryKind,
    ) -> impl Iterator<Item = &Memory> + '_ {
        self.memories
            .iter()
            .filter(move |m| m.kind == kind && m.affinity.contains(&proc))
    }
}
