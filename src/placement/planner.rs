//! Partition placement planner
//!
//! Decides which processor runs each point task and which memory holds
//! each of its region arguments. The slicing is computed once per task
//! category and reused for every later launch, so a partition's resident
//! state never migrates mid-run.
//!
//! # Slicing
//!
//! ```text
//! point k → node    = nodes[k % num_nodes]
//!           local   = ((k / num_nodes) * stride) % local_count(node)
//! ```
//!
//! Consecutive partitions land on different nodes before cycling back.

use super::affinity::MemoryAffinity;
use super::topology::{MachineTopology, MemoryId, ProcessorId, ProcessorKind};
use crate::error::PlacementError;
use crate::pipeline::TaskKind;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::OnceLock;

/// Default intra-node stride
pub const DEFAULT_STRIDE: usize = 9;

/// Region arguments at these positions are bound to frame-buffer memory
pub const FRAME_BUFFER_REGIONS: usize = 3;

/// Category of point tasks sharing one cached slicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    /// Init and Step tasks
    GpuCompute,
    /// Load tasks
    CpuLoad,
}

impl TaskCategory {
    /// Processor kind the category runs on
    #[must_use]
    pub const fn processor_kind(self) -> ProcessorKind {
        match self {
            Self::GpuCompute => ProcessorKind::Gpu,
            Self::CpuLoad => ProcessorKind::Cpu,
        }
    }

    /// Short name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GpuCompute => "gpu-compute",
            Self::CpuLoad => "cpu-load",
        }
    }
}

/// One point task pinned to one processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskSlice {
    /// Point (partition index)
    pub point: usize,
    /// Target processor
    pub processor: ProcessorId,
    /// Node of the target processor
    pub node: u32,
    /// Whether another processor may steal the task (always `false`)
    pub stealable: bool,
    /// Whether the slice may be sliced again (always `false`)
    pub recurse: bool,
}

/// Placement planner with its append-once slicing cache
#[derive(Debug)]
pub struct PlacementPlanner {
    nodes: Vec<u32>,
    gpus: BTreeMap<u32, Vec<ProcessorId>>,
    cpus: BTreeMap<u32, Vec<ProcessorId>>,
    kinds: HashMap<ProcessorId, ProcessorKind>,
    affinity: MemoryAffinity,
    stride: usize,
    gpu_slices: OnceLock<Vec<TaskSlice>>,
    cpu_slices: OnceLock<Vec<TaskSlice>>,
}

impl PlacementPlanner {
    /// Build from a topology snapshot
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the topology is empty, `stride` is
    /// zero, or a processor lacks a required memory affinity
    pub fn new(topology: &MachineTopology, stride: usize) -> Result<Self, PlacementError> {
        if topology.processors.is_empty() {
            return Err(PlacementError::EmptyTopology);
        }
        if stride == 0 {
            return Err(PlacementError::ZeroStride);
        }
        let affinity = MemoryAffinity::resolve(topology)?;

        let nodes = topology.nodes();
        let mut gpus: BTreeMap<u32, Vec<ProcessorId>> = nodes.iter().map(|n| (*n, Vec::new())).collect();
        let mut cpus = gpus.clone();
        let mut kinds = HashMap::new();
        for proc in &topology.processors {
            let list = match proc.kind {
                ProcessorKind::Gpu => &mut gpus,
                ProcessorKind::Cpu => &mut cpus,
            };
            list.entry(proc.node).or_default().push(proc.id);
            kinds.insert(proc.id, proc.kind);
        }
        for list in gpus.values_mut().chain(cpus.values_mut()) {
            list.sort_unstable();
        }

        for (node, list) in gpus.iter().chain(cpus.iter()) {
            if list.len() > 1 && gcd(stride, list.len()) != 1 {
                tracing::warn!(
                    node,
                    stride,
                    local = list.len(),
                    "placement stride shares a factor with the local processor count, partitions will bunch"
                );
            }
        }

        tracing::info!(
            nodes = nodes.len(),
            gpus = gpus.values().map(Vec::len).sum::<usize>(),
            cpus = cpus.values().map(Vec::len).sum::<usize>(),
            stride,
            "placement planner ready"
        );

        Ok(Self {
            nodes,
            gpus,
            cpus,
            kinds,
            affinity,
            stride,
            gpu_slices: OnceLock::new(),
            cpu_slices: OnceLock::new(),
        })
    }

    /// Number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Resolved memory affinities
    #[must_use]
    pub const fn affinity(&self) -> &MemoryAffinity {
        &self.affinity
    }

    /// Kind of a processor
    #[must_use]
    pub fn processor_kind(&self, proc: ProcessorId) -> Option<ProcessorKind> {
        self.kinds.get(&proc).copied()
    }

    fn local(&self, kind: ProcessorKind, node: u32) -> &[ProcessorId] {
        let map = match kind {
            ProcessorKind::Gpu => &self.gpus,
            ProcessorKind::Cpu => &self.cpus,
        };
        map.get(&node).map_or(&[], Vec::as_slice)
    }

    fn cache(&self, category: TaskCategory) -> &OnceLock<Vec<TaskSlice>> {
        match category {
            TaskCategory::GpuCompute => &self.gpu_slices,
            TaskCategory::CpuLoad => &self.cpu_slices,
        }
    }

    /// Slice `domain` into one pinned task per point
    ///
    /// The first call per category computes and caches the assignment;
    /// later calls return the identical cached list.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnsupportedKind`] if a selected node has no
    /// processor of the category's kind, [`PlacementError::DomainMismatch`]
    /// if `domain` differs from the cached one
    pub fn slice_task(&self, category: TaskCategory, domain: Range<usize>) -> Result<&[TaskSlice], PlacementError> {
        let cell = self.cache(category);
        let slices = match cell.get() {
            Some(cached) => cached,
            None => {
                let computed = self.compute_slices(category, &domain)?;
                cell.get_or_init(|| computed)
            }
        };

        if slices.len() != domain.len() || slices.first().is_some_and(|s| s.point != domain.start) {
            return Err(PlacementError::DomainMismatch {
                category: category.name(),
                cached: slices.len(),
                requested: domain.len(),
            });
        }
        Ok(slices)
    }

    fn compute_slices(&self, category: TaskCategory, domain: &Range<usize>) -> Result<Vec<TaskSlice>, PlacementError> {
        let kind = category.processor_kind();
        let num_nodes = self.nodes.len();

        domain
            .clone()
            .enumerate()
            .map(|(cnt, point)| {
                let node = self.nodes[cnt % num_nodes];
                let local = self.local(kind, node);
                if local.is_empty() {
                    return Err(PlacementError::UnsupportedKind { node, kind });
                }
                let processor = local[((cnt / num_nodes) * self.stride) % local.len()];
                tracing::debug!(category = category.name(), point, node, %processor, "sliced");
                Ok(TaskSlice {
                    point,
                    processor,
                    node,
                    stealable: false,
                    recurse: false,
                })
            })
            .collect()
    }

    /// Slice of the single aggregating Scan task: first CPU of the first node
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnsupportedKind`] if that node has no CPU
    pub fn scan_target(&self) -> Result<TaskSlice, PlacementError> {
        let node = self.nodes[0];
        let processor = self
            .local(ProcessorKind::Cpu, node)
            .first()
            .copied()
            .ok_or(PlacementError::UnsupportedKind {
                node,
                kind: ProcessorKind::Cpu,
            })?;
        Ok(TaskSlice {
            point: 0,
            processor,
            node,
            stealable: false,
            recurse: false,
        })
    }

    /// Memory for each of a task's `num_regions` region arguments
    ///
    /// GPU tasks: positions `0..3` → the target's frame-buffer, the rest → its
    /// zero-copy memory. CPU tasks: everything → the target's zero-copy memory.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::KindMismatch`] if the task kind cannot run on
    /// the target's processor kind
    pub fn map_task(&self, task: TaskKind, num_regions: usize, target: ProcessorId) -> Result<Vec<MemoryId>, PlacementError> {
        let kind = self
            .processor_kind(target)
            .ok_or(PlacementError::UnknownProcessor(target))?;
        if kind != task.processor_kind() {
            return Err(PlacementError::KindMismatch {
                task,
                processor: target,
                kind,
            });
        }

        let missing = |memory| PlacementError::MissingAffinity {
            processor: target,
            kind,
            memory,
            found: 0,
        };
        let zc = self
            .affinity
            .zero_copy(target)
            .ok_or_else(|| missing(super::MemoryKind::ZeroCopy))?;

        match kind {
            ProcessorKind::Gpu => {
                let fb = self
                    .affinity
                    .frame_buffer(target)
                    .ok_or_else(|| missing(super::MemoryKind::FrameBuffer))?;
                Ok((0..num_regions)
                    .map(|idx| if idx < FRAME_BUFFER_REGIONS { fb } else { zc })
                    .collect())
            }
            ProcessorKind::Cpu => Ok(vec![zc; num_regions]),
        }
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::topology::UniformTopology;

    fn cluster(nodes: u32, gpus: u32, cpus: u32) -> MachineTopology {
        MachineTopology::uniform(UniformTopology {
            nodes,
            gpus_per_node: gpus,
            cpus_per_node: cpus,
            ..UniformTopology::default()
        })
    }

    #[test]
    fn test_round_robin_nodes() {
        let topo = cluster(3, 4, 2);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let slices = planner.slice_task(TaskCategory::GpuCompute, 0..10).unwrap();
        for s in slices {
            assert_eq!(s.node, (s.point % 3) as u32);
            assert!(!s.stealable);
            assert!(!s.recurse);
            assert_eq!(topo.processor(s.processor).unwrap().node, s.node);
        }
    }

    #[test]
    fn test_intra_node_stride() {
        // One node, 4 GPUs: local = (k * 9) % 4 = k % 4
        let topo = cluster(1, 4, 1);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let procs: Vec<u32> = planner
            .slice_task(TaskCategory::GpuCompute, 0..4)
            .unwrap()
            .iter()
            .map(|s| s.processor.0)
            .collect();
        assert_eq!(procs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cached_slices_identical() {
        let topo = cluster(2, 2, 2);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let first = planner.slice_task(TaskCategory::CpuLoad, 0..6).unwrap().to_vec();
        let second = planner.slice_task(TaskCategory::CpuLoad, 0..6).unwrap();
        assert_eq!(first.as_slice(), second);
        assert!(std::ptr::eq(
            planner.slice_task(TaskCategory::CpuLoad, 0..6).unwrap().as_ptr(),
            second.as_ptr()
        ));
    }

    #[test]
    fn test_categories_cached_separately() {
        let topo = cluster(1, 2, 2);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let gpu = planner.slice_task(TaskCategory::GpuCompute, 0..2).unwrap();
        let cpu = planner.slice_task(TaskCategory::CpuLoad, 0..2).unwrap();
        for (g, c) in gpu.iter().zip(cpu) {
            assert_eq!(planner.processor_kind(g.processor), Some(ProcessorKind::Gpu));
            assert_eq!(planner.processor_kind(c.processor), Some(ProcessorKind::Cpu));
        }
    }

    #[test]
    fn test_domain_mismatch() {
        let planner = PlacementPlanner::new(&cluster(1, 2, 1), DEFAULT_STRIDE).unwrap();
        planner.slice_task(TaskCategory::GpuCompute, 0..4).unwrap();
        assert!(matches!(
            planner.slice_task(TaskCategory::GpuCompute, 0..5),
            Err(PlacementError::DomainMismatch { cached: 4, requested: 5, .. })
        ));
    }

    #[test]
    fn test_node_without_gpus() {
        let planner = PlacementPlanner::new(&cluster(1, 0, 2), DEFAULT_STRIDE).unwrap();
        assert!(matches!(
            planner.slice_task(TaskCategory::GpuCompute, 0..1),
            Err(PlacementError::UnsupportedKind { kind: ProcessorKind::Gpu, .. })
        ));
    }

    #[test]
    fn test_empty_topology() {
        assert!(matches!(
            PlacementPlanner::new(&MachineTopology::default(), DEFAULT_STRIDE),
            Err(PlacementError::EmptyTopology)
        ));
    }

    #[test]
    fn test_zero_stride_rejected() {
        assert!(matches!(
            PlacementPlanner::new(&cluster(1, 4, 1), 0),
            Err(PlacementError::ZeroStride)
        ));
    }

    #[test]
    fn test_map_task_binding_rule() {
        let topo = cluster(1, 2, 1);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let gpu = ProcessorId(0);
        let fb = planner.affinity().frame_buffer(gpu).unwrap();
        let zc = planner.affinity().zero_copy(gpu).unwrap();

        let mems = planner.map_task(TaskKind::Step, 6, gpu).unwrap();
        assert_eq!(mems, vec![fb, fb, fb, zc, zc, zc]);

        let cpu = ProcessorId(2);
        let mems = planner.map_task(TaskKind::Load, 3, cpu).unwrap();
        let cpu_zc = planner.affinity().zero_copy(cpu).unwrap();
        assert_eq!(mems, vec![cpu_zc; 3]);
    }

    #[test]
    fn test_map_task_kind_mismatch() {
        let planner = PlacementPlanner::new(&cluster(1, 1, 1), DEFAULT_STRIDE).unwrap();
        assert!(matches!(
            planner.map_task(TaskKind::Init, 3, ProcessorId(1)),
            Err(PlacementError::KindMismatch { task: TaskKind::Init, .. })
        ));
        assert!(matches!(
            planner.map_task(TaskKind::Scan, 1, ProcessorId(0)),
            Err(PlacementError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_scan_target_first_cpu() {
        let topo = cluster(2, 2, 2);
        let planner = PlacementPlanner::new(&topo, DEFAULT_STRIDE).unwrap();
        let scan = planner.scan_target().unwrap();
        assert_eq!(scan.processor, ProcessorId(2));
        assert_eq!(scan.node, 0);
    }
}
