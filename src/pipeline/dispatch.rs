//! Stage dispatch
//!
//! One dispatch function per stage. Each builds a [`TaskDescriptor`], asks
//! the planner where every point task goes, creates the region instances in
//! the chosen memories, then runs the point tasks on a [`JoinSet`] and joins
//! all of them before returning (full barrier). I/O tasks are async, compute
//! tasks run on the blocking pool. Pieces move into their task and come
//! back with its result.

use super::init::{init_piece, InitOutput};
use super::load::{load_partition, LoadedPartition};
use super::piece::GraphPiece;
use super::scan::scan;
use super::stage::PipelineStage;
use super::step::{gather, pull_step, route, scatter, StepOutput};
use super::task::{full_domain, TaskArgs, TaskDescriptor, TaskKind};
use crate::algorithms::VertexProgram;
use crate::error::{ConfigError, EngineError, PlacementError};
use crate::placement::{
    InstanceManager, InstanceRequest, InstanceStats, MachineTopology, MemoryId, PlacementPlanner, ProcessorId,
    TaskSlice,
};
use crate::storage::{DoubleBuffer, Graph, Layout, VertexId};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
#[cfg(feature = "gpu")]
use crate::gpu::{upload_pieces, GpuDevice, GpuPieceBuffers};

/// Summary of one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Iteration number, starting at 0
    pub iteration: u32,
    /// Vertices whose value changed (push: size of the next frontier)
    pub active: usize,
    /// L1 change of all values
    pub delta: f64,
}

impl StepReport {
    /// Whether this iteration satisfies the stopping rule of `layout`
    ///
    /// Push stops on an empty frontier, pull on `delta <= tolerance` when a
    /// tolerance is given.
    #[must_use]
    pub fn is_final(&self, layout: Layout, tolerance: Option<f64>) -> bool {
        match layout {
            Layout::Push => self.active == 0,
            Layout::Pull => tolerance.is_some_and(|tol| self.delta <= tol),
        }
    }
}

/// Where one point task ran and where its regions were placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRecord {
    /// Task kind
    pub task: TaskKind,
    /// Partition index
    pub part: usize,
    /// Processor
    pub processor: ProcessorId,
    /// Node of the processor
    pub node: u32,
    /// Memory of each region argument, in argument order
    pub memories: Vec<MemoryId>,
}

/// Load → Scan → Init → Step driver for one program
pub struct Pipeline<P: VertexProgram> {
    graph: Graph,
    program: Arc<P>,
    planner: Arc<PlacementPlanner>,
    instances: InstanceManager,
    stage: PipelineStage,
    loaded: Vec<LoadedPartition>,
    degrees: Arc<[u32]>,
    pieces: Vec<GraphPiece>,
    values: DoubleBuffer<Arc<[P::Value]>>,
    iteration: u32,
    placements: Vec<PlacementRecord>,
    #[cfg(feature = "gpu")]
    device: Option<Arc<GpuDevice>>,
    #[cfg(feature = "gpu")]
    gpu_buffers: Vec<GpuPieceBuffers>,
}

impl<P: VertexProgram> std::fmt::Debug for Pipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("program", &self.program.name())
            .field("stage", &self.stage)
            .field("iteration", &self.iteration)
            .field("num_parts", &self.graph.num_parts())
            .finish_non_exhaustive()
    }
}

impl<P: VertexProgram> Pipeline<P> {
    /// Pipeline over a partitioned graph
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LayoutMismatch`] if the program needs the other layout
    pub fn new(
        graph: Graph,
        program: P,
        planner: Arc<PlacementPlanner>,
        topology: &MachineTopology,
    ) -> Result<Self, EngineError> {
        if program.layout() != graph.layout() {
            return Err(ConfigError::LayoutMismatch {
                program: program.name().to_string(),
                expected: program.layout(),
                configured: graph.layout(),
            }
            .into());
        }
        Ok(Self {
            graph,
            program: Arc::new(program),
            planner,
            instances: InstanceManager::new(topology),
            stage: PipelineStage::Pending,
            loaded: Vec::new(),
            degrees: Arc::from(Vec::new()),
            pieces: Vec::new(),
            values: DoubleBuffer::new(Arc::from(Vec::new()), Arc::from(Vec::new())),
            iteration: 0,
            placements: Vec::new(),
            #[cfg(feature = "gpu")]
            device: None,
            #[cfg(feature = "gpu")]
            gpu_buffers: Vec::new(),
        })
    }

    /// Slice, map and instantiate every point task of `desc`
    fn place(&mut self, desc: &TaskDescriptor) -> Result<Vec<TaskSlice>, EngineError> {
        let slices = match desc.kind.category() {
            Some(category) => self.planner.slice_task(category, desc.domain.clone())?.to_vec(),
            None => vec![self.planner.scan_target()?],
        };
        let record = !self.placements.iter().any(|r| r.task == desc.kind);

        for slice in &slices {
            let regions = desc.regions(slice.point);
            let memories = self.planner.map_task(desc.kind, regions.len(), slice.processor)?;
            for (region_index, (requirement, memory)) in regions.iter().zip(&memories).enumerate() {
                let bytes = self
                    .graph
                    .regions()
                    .bytes(requirement)
                    .ok_or_else(|| PlacementError::UnknownRegion {
                        task: desc.kind,
                        region: requirement.region.to_string(),
                    })?;
                self.instances.acquire(&InstanceRequest {
                    task: desc.kind,
                    region_index,
                    requirement: *requirement,
                    bytes,
                    processor: slice.processor,
                    memory: *memory,
                })?;
            }
            tracing::debug!(
                task = ?desc.kind,
                part = slice.point,
                processor = %slice.processor,
                node = slice.node,
                "task placed"
            );
            if record {
                self.placements.push(PlacementRecord {
                    task: desc.kind,
                    part: slice.point,
                    processor: slice.processor,
                    node: slice.node,
                    memories,
                });
            }
        }
        Ok(slices)
    }

    /// Mirror every piece onto `device` when Init completes
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn with_device(mut self, device: Arc<GpuDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Record the outcome of a stage body: `stage` on success, the terminal
    /// [`PipelineStage::Failed`] on error
    fn settle<T>(&mut self, stage: PipelineStage, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.stage = stage,
            Err(err) => {
                tracing::error!(stage = ?stage, iteration = self.iteration, error = %err, "stage failed");
                self.stage = PipelineStage::Failed;
            }
        }
        result
    }

    fn descriptor(&self, kind: TaskKind, args: TaskArgs) -> TaskDescriptor {
        TaskDescriptor {
            kind,
            domain: full_domain(self.graph.bounds()),
            args,
        }
    }

    /// Load stage: one CPU task per partition reads its byte ranges
    ///
    /// # Errors
    ///
    /// Returns error on stage order, placement failure or a file read failure
    pub async fn load(&mut self) -> Result<()> {
        self.stage.check(PipelineStage::Load)?;
        let result = self.load_partitions().await;
        self.settle(PipelineStage::Load, result)
    }

    async fn load_partitions(&mut self) -> Result<()> {
        let desc = self.descriptor(
            TaskKind::Load,
            TaskArgs::Load {
                path: self.graph.path().to_path_buf(),
            },
        );
        let slices = self.place(&desc)?;

        let mut set = JoinSet::new();
        for slice in slices {
            let part = slice.point;
            let path = self.graph.path().to_path_buf();
            let rows = self.graph.bounds().rows(part);
            let edge_start = self.graph.bounds().edges(part).start;
            let ranges = self.graph.byte_ranges(part);
            set.spawn(async move { (part, load_partition(&path, part, rows, edge_start, ranges).await) });
        }
        self.loaded = join_points(TaskKind::Load, set, desc.len()).await?;

        tracing::info!(
            parts = self.loaded.len(),
            bytes = self.loaded.iter().map(LoadedPartition::byte_len).sum::<u64>(),
            "load stage complete"
        );
        Ok(())
    }

    /// Scan stage: a single CPU task validates all partitions
    ///
    /// # Errors
    ///
    /// Returns error on stage order, placement failure or inconsistent data
    pub async fn scan(&mut self) -> Result<()> {
        self.stage.check(PipelineStage::Scan)?;
        let result = self.scan_partitions().await;
        self.settle(PipelineStage::Scan, result)
    }

    async fn scan_partitions(&mut self) -> Result<()> {
        let desc = TaskDescriptor {
            kind: TaskKind::Scan,
            domain: 0..1,
            args: TaskArgs::Scan,
        };
        self.place(&desc)?;

        let loaded = std::mem::take(&mut self.loaded);
        let layout = self.graph.layout();
        let mut set = JoinSet::new();
        set.spawn_blocking(move || {
            let summary = scan(&loaded, layout).map_err(anyhow::Error::from);
            (0, summary.map(|s| (s, loaded)))
        });
        let (summary, loaded) = join_points(TaskKind::Scan, set, 1)
            .await?
            .pop()
            .context("Scan task returned no result")?;

        self.loaded = loaded;
        self.degrees = Arc::from(summary.degrees);
        tracing::info!(nv = summary.nv, ne = summary.ne, "scan stage complete");
        Ok(())
    }

    /// Init stage: one GPU task per partition builds its piece
    ///
    /// # Errors
    ///
    /// Returns error on stage order, placement or capacity failure, or an
    /// initial frontier that does not fit
    pub async fn init(&mut self) -> Result<()> {
        self.stage.check(PipelineStage::Init)?;
        let result = self.init_pieces().await;
        self.settle(PipelineStage::Init, result)
    }

    async fn init_pieces(&mut self) -> Result<()> {
        let desc = self.descriptor(
            TaskKind::Init,
            TaskArgs::Init {
                layout: self.graph.layout(),
            },
        );
        self.place(&desc)?;

        let nv = self.graph.nv();
        let num_parts = self.graph.num_parts();
        let mut set = JoinSet::new();
        for loaded in std::mem::take(&mut self.loaded) {
            let part = loaded.part;
            let program = Arc::clone(&self.program);
            let degrees = Arc::clone(&self.degrees);
            let capacity = self.graph.fq_right(part) - self.graph.fq_left(part);
            set.spawn_blocking(move || {
                let out = init_piece(&*program, loaded, degrees, nv, num_parts, capacity);
                (part, out.map_err(anyhow::Error::from))
            });
        }
        let outputs: Vec<InitOutput<P::Value>> = join_points(TaskKind::Init, set, desc.len()).await?;

        let mut initial = Vec::with_capacity(nv as usize);
        let mut active = 0;
        for out in outputs {
            initial.extend(out.values);
            active += out.active;
            self.pieces.push(out.piece);
        }
        let initial: Arc<[P::Value]> = Arc::from(initial);
        self.values = DoubleBuffer::new(Arc::clone(&initial), initial);

        #[cfg(feature = "gpu")]
        if let Some(device) = &self.device {
            self.gpu_buffers = upload_pieces(device, &self.pieces);
        }

        tracing::info!(program = self.program.name(), active, "init stage complete");
        Ok(())
    }

    /// Step stage: one iteration over every partition, then swap roles
    ///
    /// # Errors
    ///
    /// Returns error on stage order, placement failure, a panicked task or a
    /// frontier overflow
    pub async fn step(&mut self) -> Result<StepReport> {
        self.stage.check(PipelineStage::Step)?;
        let result = self.step_once().await;
        self.settle(PipelineStage::Step, result)
    }

    async fn step_once(&mut self) -> Result<StepReport> {
        let layout = self.graph.layout();
        let desc = self.descriptor(
            TaskKind::Step,
            TaskArgs::Step {
                layout,
                iteration: self.iteration,
                read: self.values.read_index(),
                write: self.values.write_index(),
            },
        );
        self.place(&desc)?;

        let read = Arc::clone(self.values.current());
        let outputs = match layout {
            Layout::Pull => self.pull_iteration(read).await?,
            Layout::Push => self.push_iteration(read).await?,
        };

        let mut next = Vec::with_capacity(self.graph.nv() as usize);
        let mut report = StepReport {
            iteration: self.iteration,
            active: 0,
            delta: 0.0,
        };
        for out in outputs {
            next.extend(out.values);
            report.active += out.active;
            report.delta += out.delta;
        }
        *self.values.next_mut() = Arc::from(next);
        self.values.swap();
        if layout == Layout::Push {
            for piece in &mut self.pieces {
                piece.swap_frontier();
            }
            #[cfg(feature = "gpu")]
            if let Some(device) = &self.device {
                for (buffers, piece) in self.gpu_buffers.iter().zip(&self.pieces) {
                    buffers.sync_frontiers(device, piece)?;
                }
            }
        }

        self.iteration += 1;
        tracing::debug!(
            iteration = report.iteration,
            active = report.active,
            delta = report.delta,
            "step complete"
        );
        Ok(report)
    }

    async fn pull_iteration(&mut self, read: Arc<[P::Value]>) -> Result<Vec<StepOutput<P::Value>>> {
        let mut set = JoinSet::new();
        for piece in std::mem::take(&mut self.pieces) {
            let part = piece.part();
            let program = Arc::clone(&self.program);
            let read = Arc::clone(&read);
            set.spawn_blocking(move || {
                let out = pull_step(&*program, &piece, &read);
                (part, Ok::<_, anyhow::Error>((piece, out)))
            });
        }
        let joined = join_points(TaskKind::Step, set, self.graph.num_parts()).await?;
        Ok(self.return_pieces(joined))
    }

    async fn push_iteration(&mut self, read: Arc<[P::Value]>) -> Result<Vec<StepOutput<P::Value>>> {
        let num_parts = self.graph.num_parts();

        let mut set = JoinSet::new();
        for mut piece in std::mem::take(&mut self.pieces) {
            let part = piece.part();
            let program = Arc::clone(&self.program);
            let read = Arc::clone(&read);
            let bounds = Arc::clone(self.graph.bounds());
            set.spawn_blocking(move || {
                let out = scatter(&*program, &mut piece, &read, &bounds).map_err(anyhow::Error::from);
                (part, out.map(|outboxes| (piece, outboxes)))
            });
        }
        let (pieces, outboxes): (Vec<_>, Vec<_>) = join_points(TaskKind::Step, set, num_parts)
            .await
            .context("Scatter phase failed")?
            .into_iter()
            .unzip();
        let inboxes = route(outboxes, num_parts);

        let mut set = JoinSet::new();
        for (mut piece, inbox) in pieces.into_iter().zip(inboxes) {
            let part = piece.part();
            let program = Arc::clone(&self.program);
            let read = Arc::clone(&read);
            set.spawn_blocking(move || {
                let out = gather(&*program, &mut piece, &read, &inbox).map_err(anyhow::Error::from);
                (part, out.map(|out| (piece, out)))
            });
        }
        let joined = join_points(TaskKind::Step, set, num_parts)
            .await
            .context("Gather phase failed")?;
        Ok(self.return_pieces(joined))
    }

    fn return_pieces(&mut self, joined: Vec<(GraphPiece, StepOutput<P::Value>)>) -> Vec<StepOutput<P::Value>> {
        let (pieces, outputs) = joined.into_iter().unzip();
        self.pieces = pieces;
        outputs
    }

    /// Run until `max_iterations`, an empty frontier (push) or
    /// `delta <= tolerance` (pull, when a tolerance is given)
    ///
    /// # Errors
    ///
    /// Returns the first step error
    pub async fn run(&mut self, max_iterations: u32, tolerance: Option<f64>) -> Result<Vec<StepReport>> {
        let layout = self.graph.layout();
        let mut reports = Vec::new();
        for _ in 0..max_iterations {
            let report = self.step().await?;
            reports.push(report);
            if report.is_final(layout, tolerance) {
                break;
            }
        }
        tracing::info!(
            program = self.program.name(),
            iterations = reports.len(),
            "run complete"
        );
        Ok(reports)
    }

    /// Current values of every vertex
    #[must_use]
    pub fn values(&self) -> &[P::Value] {
        self.values.current()
    }

    /// Value buffer roles
    #[must_use]
    pub const fn value_buffers(&self) -> &DoubleBuffer<Arc<[P::Value]>> {
        &self.values
    }

    /// Last completed stage
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Completed iterations
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Partitioned graph
    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Program
    #[must_use]
    pub fn program(&self) -> &P {
        &self.program
    }

    /// Resident pieces, indexed by partition (empty before Init)
    #[must_use]
    pub fn pieces(&self) -> &[GraphPiece] {
        &self.pieces
    }

    /// Device mirrors of the pieces, one per partition once Init ran with a
    /// device attached
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn gpu_buffers(&self) -> &[GpuPieceBuffers] {
        &self.gpu_buffers
    }

    /// Out-degree of every vertex (empty before Scan)
    #[must_use]
    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    /// First placement of every task kind, one record per point task
    #[must_use]
    pub fn placement_report(&self) -> &[PlacementRecord] {
        &self.placements
    }

    /// Instance creation counters
    #[must_use]
    pub const fn instance_stats(&self) -> InstanceStats {
        self.instances.stats()
    }

    /// Value of vertex `v`
    #[must_use]
    pub fn value(&self, v: VertexId) -> Option<P::Value> {
        self.values().get(v as usize).copied()
    }
}

/// Join every point task of a stage and order the results by partition
async fn join_points<T: 'static>(task: TaskKind, mut set: JoinSet<(usize, Result<T>)>, len: usize) -> Result<Vec<T>> {
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(len).collect();
    while let Some(joined) = set.join_next().await {
        let (part, result) = joined.map_err(|e| EngineError::TaskFailed {
            task,
            part: slots.iter().position(Option::is_none).unwrap_or_default(),
            detail: e.to_string(),
        })?;
        slots[part] = Some(result.with_context(|| format!("{task:?} task for partition {part} failed"))?);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(part, slot)| {
            slot.ok_or_else(|| {
                EngineError::TaskFailed {
                    task,
                    part,
                    detail: "task produced no result".to_string(),
                }
                .into()
            })
        })
        .collect()
}
