//! trueno-shard: partitioned multi-GPU graph engine
//!
//! # Overview
//!
//! A graph is split into contiguous vertex partitions. Each partition's CSR
//! piece is placed once on a processor and memory chosen by a deterministic,
//! locality-preserving planner, and stays resident there while a vertex
//! program iterates over it.
//!
//! # Quick Start
//!
//! ```no_run
//! use trueno_shard::{CsrGraph, Engine, EngineConfig, Layout, MachineTopology, PushBfs, UniformTopology};
//! use trueno_shard::storage::write_graph_file;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Build a graph and write it in push layout (rows are sources)
//! let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (0, 3, 1.0)])?;
//! write_graph_file("calls.push.bin", &graph, Layout::Push).await?;
//!
//! // Two nodes with two GPUs each
//! let topology = MachineTopology::uniform(UniformTopology { nodes: 2, gpus_per_node: 2, ..Default::default() });
//!
//! let config = EngineConfig::new("calls.push.bin", 4, Layout::Push);
//! let mut engine = Engine::open(config, &topology, PushBfs { source: 0 }).await?;
//! engine.run().await?;
//! assert_eq!(engine.value(2), Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: binary CSR file format, row partitioning, region arena, frontiers
//! - **Placement**: machine topology, memory affinity, cached task slicing, instances
//! - **Pipeline**: Load → Scan → Init → repeat{Step} on tokio task sets
//! - **Algorithms**: `VertexProgram` trait with PageRank, BFS, SSSP and components
//! - **Export**: Parquet values and placement report (`storage` feature)
//! - **GPU**: wgpu residency of pieces (`gpu` feature)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod placement;
pub mod storage;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use algorithms::{
    bfs, connected_components, pagerank, sssp, PullContext, PullPageRank, PushBfs, PushComponents, PushSssp,
    VertexProgram, UNREACHED,
};
pub use config::EngineConfig;
pub use engine::{Engine, RunSummary};
pub use error::{ConfigError, EngineError, FormatError, PlacementError};
pub use pipeline::{Pipeline, PipelineStage, PlacementRecord, StepReport};
pub use placement::{MachineTopology, PlacementPlanner, UniformTopology};
pub use storage::{CsrGraph, EdgeId, Graph, Layout, SplitPolicy, VertexId};

#[cfg(feature = "gpu")]
pub use gpu::{upload_pieces, GpuDevice, GpuDeviceError, GpuPieceBuffers};

// Error type
pub use anyhow::{Error, Result};
