//! Integration tests for trueno-shard
//!
//! Runs whole graphs through Load → Scan → Init → Step and compares the
//! partitioned results with the sequential references.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use trueno_shard::pipeline::TaskKind;
use trueno_shard::placement::{MemoryKind, ProcessorKind};
use trueno_shard::storage::write_graph_file;
use trueno_shard::{
    bfs, connected_components, pagerank, sssp, CsrGraph, Engine, EngineConfig, EngineError, FormatError, Graph,
    Layout, MachineTopology, Pipeline, PipelineStage, PlacementError, PlacementPlanner, PullContext, PullPageRank,
    PushBfs, PushComponents, PushSssp, SplitPolicy, UniformTopology, VertexId, VertexProgram,
};

const PART_COUNTS: [usize; 4] = [1, 2, 3, 7];

/// Deterministic pseudo-random edge list with integer weights
fn random_edges(nv: u32, ne: usize, seed: u64) -> Vec<(VertexId, VertexId, f32)> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (state >> 33) as u32
    };
    (0..ne)
        .map(|_| {
            let src = next() % nv;
            let dst = next() % nv;
            let weight = (next() % 9 + 1) as f32;
            (src, dst, weight)
        })
        .collect()
}

fn cluster() -> MachineTopology {
    MachineTopology::uniform(UniformTopology {
        nodes: 2,
        gpus_per_node: 2,
        cpus_per_node: 1,
        ..Default::default()
    })
}

async fn write(dir: &TempDir, name: &str, graph: &CsrGraph, layout: Layout) -> PathBuf {
    let path = dir.path().join(name);
    write_graph_file(&path, graph, layout).await.unwrap();
    path
}

fn config(path: &Path, num_parts: usize, layout: Layout) -> EngineConfig {
    EngineConfig {
        max_iterations: 100,
        ..EngineConfig::new(path, num_parts, layout)
    }
}

#[tokio::test]
async fn test_pagerank_matches_reference() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(40, &random_edges(40, 160, 7)).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;
    let expected = pagerank(&graph, 15);

    for parts in PART_COUNTS {
        let config = EngineConfig {
            max_iterations: 15,
            ..EngineConfig::new(&path, parts, Layout::Pull)
        };
        let mut engine = Engine::open(config, &cluster(), PullPageRank::default()).await.unwrap();
        let summary = engine.run().await.unwrap();
        assert_eq!(summary.iterations, 15);

        for (v, (got, want)) in engine.values().iter().zip(&expected).enumerate() {
            assert!((got - want).abs() < 1e-6, "parts={parts} vertex {v}: {got} vs {want}");
        }
    }
}

#[tokio::test]
async fn test_pagerank_tolerance_stops_early() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap();
    let path = write(&dir, "cycle.pull.bin", &graph, Layout::Pull).await;

    let config = EngineConfig {
        tolerance: Some(1e-6),
        ..config(&path, 2, Layout::Pull)
    };
    let mut engine = Engine::open(config, &cluster(), PullPageRank::default()).await.unwrap();
    let summary = engine.run().await.unwrap();

    // Uniform ranks are already the fixed point of a cycle
    assert!(summary.converged);
    assert_eq!(summary.iterations, 1);
}

#[tokio::test]
async fn test_bfs_matches_reference() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(50, &random_edges(50, 120, 11)).unwrap();
    let path = write(&dir, "g.push.bin", &graph, Layout::Push).await;
    let expected = bfs(&graph, 3);

    for parts in PART_COUNTS {
        let mut engine = Engine::open(config(&path, parts, Layout::Push), &cluster(), PushBfs { source: 3 })
            .await
            .unwrap();
        let summary = engine.run().await.unwrap();
        assert!(summary.converged, "parts={parts}");
        assert_eq!(engine.values(), expected.as_slice(), "parts={parts}");
    }
}

#[tokio::test]
async fn test_sssp_matches_reference() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(30, &random_edges(30, 150, 23)).unwrap();
    let path = write(&dir, "g.push.bin", &graph, Layout::Push).await;
    let expected = sssp(&graph, 0);

    for parts in PART_COUNTS {
        let config = EngineConfig {
            split: SplitPolicy::EdgeBalanced,
            ..config(&path, parts, Layout::Push)
        };
        let mut engine = Engine::open(config, &cluster(), PushSssp { source: 0 }).await.unwrap();
        engine.run().await.unwrap();
        assert_eq!(engine.values(), expected.as_slice(), "parts={parts}");
    }
}

#[tokio::test]
async fn test_components_match_reference() {
    let dir = TempDir::new().unwrap();
    let mut edges = random_edges(60, 45, 5);
    let reversed: Vec<_> = edges.iter().map(|&(s, d, w)| (d, s, w)).collect();
    edges.extend(reversed);
    let graph = CsrGraph::with_vertices(60, &edges).unwrap();
    let path = write(&dir, "sym.push.bin", &graph, Layout::Push).await;
    let expected = connected_components(&graph);

    for parts in PART_COUNTS {
        let mut engine = Engine::open(config(&path, parts, Layout::Push), &cluster(), PushComponents)
            .await
            .unwrap();
        engine.run().await.unwrap();
        assert_eq!(engine.values(), expected.as_slice(), "parts={parts}");
    }
}

#[tokio::test]
async fn test_step_placement_round_robin_and_binding() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(16, &random_edges(16, 40, 3)).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;
    let topology = cluster();

    let mut engine = Engine::open(config(&path, 4, Layout::Pull), &topology, PullPageRank::default())
        .await
        .unwrap();
    engine.step().await.unwrap();

    let steps: Vec<_> = engine.placement_report().iter().filter(|r| r.task == TaskKind::Step).collect();
    assert_eq!(steps.len(), 4);
    for record in steps {
        assert_eq!(record.node as usize, record.part % 2);
        let processor = topology.processor(record.processor).unwrap();
        assert_eq!(processor.kind, ProcessorKind::Gpu);
        for (i, memory) in record.memories.iter().enumerate() {
            let kind = topology.memory(*memory).unwrap().kind;
            let expected = if i < 3 { MemoryKind::FrameBuffer } else { MemoryKind::ZeroCopy };
            assert_eq!(kind, expected, "part {} region {i}", record.part);
        }
    }
}

#[tokio::test]
async fn test_placement_is_stable_across_iterations() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(12, &random_edges(12, 30, 9)).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;

    let mut engine = Engine::open(config(&path, 3, Layout::Pull), &cluster(), PullPageRank::default())
        .await
        .unwrap();
    // Both buffer roles have been read and written after two iterations
    engine.step().await.unwrap();
    engine.step().await.unwrap();
    let created = engine.pipeline().instance_stats().created;
    engine.step().await.unwrap();
    engine.step().await.unwrap();

    let stats = engine.pipeline().instance_stats();
    assert_eq!(stats.created, created, "later iterations reuse every instance");
    assert!(stats.reused > 0);
}

#[tokio::test]
async fn test_corrupted_edge_count_fails_scan() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(10, &random_edges(10, 20, 1)).unwrap();
    let path = write(&dir, "bad.push.bin", &graph, Layout::Push).await;

    // Header claims one edge fewer than the row index holds
    let mut bytes = std::fs::read(&path).unwrap();
    let ne = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    bytes[0..8].copy_from_slice(&(ne - 1).to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let err = Engine::open(config(&path, 2, Layout::Push), &cluster(), PushBfs { source: 0 })
        .await
        .unwrap_err();
    assert!(
        matches!(err.downcast_ref::<FormatError>(), Some(FormatError::EdgeCountMismatch { .. })),
        "unexpected error: {err:#}"
    );
}

#[tokio::test]
async fn test_overflowing_header_is_format_error() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
    let path = write(&dir, "huge.push.bin", &graph, Layout::Push).await;

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..8].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let err = Engine::open(config(&path, 2, Layout::Push), &cluster(), PushBfs { source: 0 })
        .await
        .unwrap_err();
    assert!(
        matches!(err.downcast_ref::<FormatError>(), Some(FormatError::HeaderOverflow { nv: 3, .. })),
        "unexpected error: {err:#}"
    );

    // Large enough to need more bytes than the file has, small enough not to overflow
    bytes[0..8].copy_from_slice(&(1_u64 << 40).to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();
    let err = Engine::open(config(&path, 2, Layout::Push), &cluster(), PushBfs { source: 0 })
        .await
        .unwrap_err();
    assert!(
        matches!(err.downcast_ref::<FormatError>(), Some(FormatError::Truncated { .. })),
        "unexpected error: {err:#}"
    );
}

#[tokio::test]
async fn test_capacity_exhaustion_names_task_and_region() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::with_vertices(8, &random_edges(8, 16, 2)).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;
    let topology = MachineTopology::uniform(UniformTopology {
        fb_capacity: 4,
        ..Default::default()
    });

    let err = Engine::open(config(&path, 2, Layout::Pull), &topology, PullPageRank::default())
        .await
        .unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Placement(PlacementError::ResourceExhausted {
            task,
            region_index,
            processor,
            memory,
            ..
        })) => {
            assert_eq!(*task, TaskKind::Init);
            assert_eq!(*region_index, 0);
            assert_eq!(topology.processor(*processor).unwrap().kind, ProcessorKind::Gpu);
            assert_eq!(topology.memory(*memory).unwrap().kind, MemoryKind::FrameBuffer);
        }
        other => panic!("expected resource exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stage_order_enforced() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;
    let topology = cluster();
    let config = config(&path, 2, Layout::Pull);

    let planner = Arc::new(PlacementPlanner::new(&topology, config.placement_stride).unwrap());
    let graph = Graph::open(&path, config.graph_options(), 4).await.unwrap();
    let mut pipeline = Pipeline::new(graph, PullPageRank::default(), planner, &topology).unwrap();

    let err = pipeline.step().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::StageOrder {
            requested: PipelineStage::Step,
            current: PipelineStage::Pending,
        })
    ));

    pipeline.load().await.unwrap();
    assert!(pipeline.init().await.is_err(), "init before scan");
    pipeline.scan().await.unwrap();
    pipeline.init().await.unwrap();
    pipeline.step().await.unwrap();
    pipeline.step().await.unwrap();
    assert_eq!(pipeline.iteration(), 2);
}

/// Pull program whose update panics on one vertex
#[derive(Debug)]
struct PanicsOnVertex(VertexId);

impl VertexProgram for PanicsOnVertex {
    type Value = f32;

    fn name(&self) -> &'static str {
        "panics-on-vertex"
    }

    fn layout(&self) -> Layout {
        Layout::Pull
    }

    fn initial_value(&self, _v: VertexId, _nv: VertexId) -> f32 {
        1.0
    }

    fn pull(&self, ctx: &PullContext<'_, f32>) -> f32 {
        assert_ne!(ctx.vertex, self.0, "vertex update failed");
        ctx.old
    }
}

#[tokio::test]
async fn test_failed_step_is_terminal() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 0, 1.0)]).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;

    let mut engine = Engine::open(config(&path, 2, Layout::Pull), &cluster(), PanicsOnVertex(3))
        .await
        .unwrap();

    let err = engine.step().await.unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::TaskFailed {
                task: TaskKind::Step,
                ..
            })
        ),
        "unexpected error: {err:#}"
    );
    assert_eq!(engine.pipeline().stage(), PipelineStage::Failed);

    // The original failure is not masked by missing pieces
    let err = engine.step().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::StageOrder {
            requested: PipelineStage::Step,
            current: PipelineStage::Failed,
        })
    ));
    assert!(engine.run().await.is_err());
}

#[tokio::test]
async fn test_layout_mismatch_is_config_error() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0)]).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;

    let err = Engine::open(config(&path, 1, Layout::Pull), &cluster(), PushBfs { source: 0 })
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::Config(trueno_shard::ConfigError::LayoutMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_more_parts_than_vertices() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
    let path = write(&dir, "tiny.push.bin", &graph, Layout::Push).await;

    let mut engine = Engine::open(config(&path, 5, Layout::Push), &cluster(), PushBfs { source: 0 })
        .await
        .unwrap();
    engine.run().await.unwrap();
    assert_eq!(engine.values(), &[0, 1, 2]);
}

#[cfg(feature = "storage")]
#[tokio::test]
async fn test_export_parquet() {
    let dir = TempDir::new().unwrap();
    let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap();
    let path = write(&dir, "g.pull.bin", &graph, Layout::Pull).await;

    let mut engine = Engine::open(config(&path, 2, Layout::Pull), &cluster(), PullPageRank::default())
        .await
        .unwrap();
    engine.step().await.unwrap();

    let values = dir.path().join("ranks.parquet");
    let placement = dir.path().join("placement.parquet");
    engine.export_parquet(&values, &placement).unwrap();

    let rows = trueno_shard::storage::read_values_parquet(&values).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(placement.exists());
}
