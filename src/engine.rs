//! Engine facade: config + topology + program → Load → Scan → Init → repeat{Step}
//!
//! # Example
//!
//! ```no_run
//! use trueno_shard::{CsrGraph, Engine, EngineConfig, Layout, MachineTopology, PullPageRank};
//! use trueno_shard::storage::write_graph_file;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)])?;
//! write_graph_file("ring.pull.bin", &graph, Layout::Pull).await?;
//!
//! let config = EngineConfig::new("ring.pull.bin", 2, Layout::Pull);
//! let topology = MachineTopology::uniform(Default::default());
//! let mut engine = Engine::open(config, &topology, PullPageRank::default()).await?;
//! let summary = engine.run().await?;
//! println!("{} iterations, ranks {:?}", summary.iterations, engine.values());
//! # Ok(())
//! # }
//! ```

use crate::algorithms::{value_width, VertexProgram};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::{Pipeline, PlacementRecord, StepReport};
use crate::placement::{MachineTopology, PlacementPlanner};
use crate::storage::{Graph, VertexId};
use anyhow::{Context, Result};
use std::sync::Arc;
#[cfg(feature = "storage")]
use crate::storage::{write_placement_parquet, write_values_parquet};
#[cfg(feature = "storage")]
use std::path::Path;
#[cfg(feature = "gpu")]
use crate::gpu::GpuDevice;
use std::time::{Duration, Instant};

/// Outcome of [`Engine::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Iterations executed by this call
    pub iterations: u32,
    /// Whether the last iteration met the stopping rule (empty frontier for
    /// push, `delta <= tolerance` for pull)
    pub converged: bool,
    /// Active count of the last iteration
    pub final_active: usize,
    /// L1 delta of the last iteration
    pub final_delta: f64,
    /// Per-iteration reports
    pub reports: Vec<StepReport>,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Partitioned graph engine for one vertex program
#[derive(Debug)]
pub struct Engine<P: VertexProgram> {
    config: EngineConfig,
    pipeline: Pipeline<P>,
}

impl<P: VertexProgram> Engine<P> {
    /// Open the graph and run Load, Scan and Init
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid, the placement planner cannot
    /// be built for `topology`, the program's layout differs from the
    /// configured one, or any of the first three stages fails
    pub async fn open(config: EngineConfig, topology: &MachineTopology, program: P) -> Result<Self> {
        let pipeline = Self::pipeline_for(&config, topology, program).await?;
        Self::start(config, pipeline).await
    }

    /// Like [`Self::open`], and Init also mirrors every piece onto `device`
    ///
    /// # Errors
    ///
    /// Same as [`Self::open`]
    #[cfg(feature = "gpu")]
    pub async fn open_with_device(
        config: EngineConfig,
        topology: &MachineTopology,
        program: P,
        device: Arc<GpuDevice>,
    ) -> Result<Self> {
        let pipeline = Self::pipeline_for(&config, topology, program).await?.with_device(device);
        Self::start(config, pipeline).await
    }

    async fn pipeline_for(config: &EngineConfig, topology: &MachineTopology, program: P) -> Result<Pipeline<P>> {
        config.validate().map_err(EngineError::from)?;
        let planner = Arc::new(PlacementPlanner::new(topology, config.placement_stride).map_err(EngineError::from)?);
        let graph = Graph::open(&config.graph_path, config.graph_options(), value_width::<P>())
            .await
            .with_context(|| format!("Failed to open graph {}", config.graph_path.display()))?;
        tracing::info!(
            program = program.name(),
            path = %config.graph_path.display(),
            nv = graph.nv(),
            ne = graph.ne(),
            parts = graph.num_parts(),
            layout = ?graph.layout(),
            "engine opened"
        );
        Ok(Pipeline::new(graph, program, planner, topology)?)
    }

    async fn start(config: EngineConfig, mut pipeline: Pipeline<P>) -> Result<Self> {
        pipeline.load().await?;
        pipeline.scan().await?;
        pipeline.init().await?;
        Ok(Self { config, pipeline })
    }

    /// Run one iteration
    ///
    /// # Errors
    ///
    /// Returns error if the Step stage fails
    pub async fn step(&mut self) -> Result<StepReport> {
        self.pipeline.step().await
    }

    /// Iterate with the configured `max_iterations` and `tolerance`
    ///
    /// # Errors
    ///
    /// Returns the first step error
    pub async fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        let max_iterations = self.config.max_iterations;
        let reports = self.pipeline.run(max_iterations, self.config.tolerance).await?;

        #[allow(clippy::cast_possible_truncation)]
        let iterations = reports.len() as u32;
        let last = reports.last().copied();
        let layout = self.pipeline.graph().layout();
        let summary = RunSummary {
            iterations,
            converged: last.is_some_and(|r| r.is_final(layout, self.config.tolerance)),
            final_active: last.map_or(0, |r| r.active),
            final_delta: last.map_or(0.0, |r| r.delta),
            reports,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            iterations = summary.iterations,
            converged = summary.converged,
            elapsed_ms = summary.elapsed.as_millis(),
            "engine run finished"
        );
        Ok(summary)
    }

    /// Current value of every vertex
    #[must_use]
    pub fn values(&self) -> &[P::Value] {
        self.pipeline.values()
    }

    /// Current value of vertex `v`
    #[must_use]
    pub fn value(&self, v: VertexId) -> Option<P::Value> {
        self.pipeline.value(v)
    }

    /// Where the first launch of each task kind ran
    #[must_use]
    pub fn placement_report(&self) -> &[PlacementRecord] {
        self.pipeline.placement_report()
    }

    /// Configuration the engine was opened with
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying pipeline
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline<P> {
        &self.pipeline
    }

    /// Write current values and the placement report as Parquet
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be written
    #[cfg(feature = "storage")]
    pub fn export_parquet(&self, values: &Path, placement: &Path) -> Result<()> {
        write_values_parquet(values, self.values(), self.pipeline.graph().bounds())?;
        write_placement_parquet(placement, self.placement_report())
    }
}
