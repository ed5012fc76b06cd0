//! Step stage bodies
//!
//! Pull: every resident vertex recomputes its value from its in-edges.
//!
//! Push runs in two phases separated by a barrier:
//! - scatter: active vertices relax their out-edges, updates are routed into
//!   one outbox per destination partition and accounted on the peer stream
//! - gather: each partition merges the updates addressed to it and builds
//!   its next frontier

use super::piece::GraphPiece;
use crate::algorithms::{PullContext, VertexProgram};
use crate::error::FormatError;
use crate::storage::{Frontier, PartitionBounds, VertexId};

/// Updates from one partition to another: `(destination, candidate)`
pub type Outbox<V> = Vec<(VertexId, V)>;

/// Result of one partition's share of an iteration
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput<V> {
    /// New values of the partition's vertices
    pub values: Vec<V>,
    /// Vertices whose value changed (push: next frontier size)
    pub active: usize,
    /// L1 change of the partition's values
    pub delta: f64,
}

/// Pull step over one piece; `read` holds every vertex's previous value
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pull_step<P: VertexProgram>(program: &P, piece: &GraphPiece, read: &[P::Value]) -> StepOutput<P::Value> {
    let nv = read.len() as VertexId;
    let mut active = 0;
    let mut delta = 0.0;
    let values = piece
        .my_in_vtxs()
        .map(|v| {
            let (sources, weights) = piece.row(v);
            let old = read[v as usize];
            let new = program.pull(&PullContext {
                vertex: v,
                old,
                sources,
                weights,
                values: read,
                degrees: piece.degrees(),
                nv,
            });
            if new != old {
                active += 1;
                delta += program.delta(old, new);
            }
            new
        })
        .collect();
    StepOutput { values, active, delta }
}

/// Scatter phase: relax out-edges of the piece's current frontier
///
/// Returns one outbox per partition, indexed by destination.
///
/// # Errors
///
/// Returns [`FormatError`] if the frontier buffer does not decode
pub fn scatter<P: VertexProgram>(
    program: &P,
    piece: &mut GraphPiece,
    read: &[P::Value],
    bounds: &PartitionBounds,
) -> Result<Vec<Outbox<P::Value>>, FormatError> {
    let frontier = piece.current_frontier()?;
    let mut outboxes: Vec<Outbox<P::Value>> = vec![Vec::new(); bounds.num_parts()];

    for v in frontier.active_vertices(piece.my_in_vtxs().start) {
        let src = read[v as usize];
        let (cols, weights) = piece.row(v);
        for (&u, &w) in cols.iter().zip(weights) {
            outboxes[bounds.partition_of(u)].push((u, program.relax(src, w)));
        }
    }

    let entry = std::mem::size_of::<(VertexId, P::Value)>() as u64;
    for (peer, outbox) in outboxes.iter().enumerate() {
        if !outbox.is_empty() {
            let n = outbox.len() as u64;
            piece.stream_mut(peer).record(n, n * entry);
        }
    }
    Ok(outboxes)
}

/// Gather phase: merge `inbox` into the piece's values and write the next frontier
///
/// # Errors
///
/// Returns [`FormatError::FrontierOverflow`] if the next frontier does not
/// fit the piece's capacity
#[allow(clippy::cast_possible_truncation)]
pub fn gather<P: VertexProgram>(
    program: &P,
    piece: &mut GraphPiece,
    read: &[P::Value],
    inbox: &[(VertexId, P::Value)],
) -> Result<StepOutput<P::Value>, FormatError> {
    let rows = piece.my_in_vtxs();
    let mut values = read[rows.start as usize..rows.end as usize].to_vec();
    let mut changed = vec![false; values.len()];

    for &(u, candidate) in inbox {
        let i = (u - rows.start) as usize;
        if program.improves(candidate, values[i]) {
            values[i] = candidate;
            changed[i] = true;
        }
    }

    let active: Vec<VertexId> = rows.clone().zip(&changed).filter(|(_, c)| **c).map(|(v, _)| v).collect();
    let delta = active
        .iter()
        .map(|&v| program.delta(read[v as usize], values[(v - rows.start) as usize]))
        .sum();
    let count = active.len();

    let frontier = Frontier::build(active, &rows, program.frontier_policy(), piece.frontier_capacity(), piece.part())?;
    piece.write_next_frontier(&frontier)?;

    Ok(StepOutput {
        values,
        active: count,
        delta,
    })
}

/// Route scatter outboxes to their destinations: `inboxes[dst]` concatenates
/// `outboxes[src][dst]` in source order
#[must_use]
pub fn route<V>(outboxes: Vec<Vec<Outbox<V>>>, num_parts: usize) -> Vec<Outbox<V>> {
    let mut inboxes: Vec<Outbox<V>> = (0..num_parts).map(|_| Vec::new()).collect();
    for per_source in outboxes {
        for (dst, outbox) in per_source.into_iter().enumerate() {
            inboxes[dst].extend(outbox);
        }
    }
    inboxes
}
