//! Per-partition resident state
//!
//! A [`GraphPiece`] is built once by Init and owned by the pipeline for the
//! rest of the run. Each Step task takes its piece by value and hands it
//! back when it finishes.

use crate::error::FormatError;
use crate::storage::{DoubleBuffer, EdgeId, Frontier, VertexId};
use std::ops::Range;
use std::sync::Arc;

/// Traffic from one partition to one peer partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStream {
    peer: usize,
    messages: u64,
    bytes: u64,
}

impl ExecStream {
    /// Stream towards `peer`
    #[must_use]
    pub const fn new(peer: usize) -> Self {
        Self {
            peer,
            messages: 0,
            bytes: 0,
        }
    }

    /// Account one batch of updates
    pub fn record(&mut self, messages: u64, bytes: u64) {
        self.messages += messages;
        self.bytes += bytes;
    }

    /// Destination partition
    #[must_use]
    pub const fn peer(&self) -> usize {
        self.peer
    }

    /// Updates sent so far
    #[must_use]
    pub const fn messages(&self) -> u64 {
        self.messages
    }

    /// Bytes sent so far
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Partition-local CSR (row pointers start at 0)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCsr {
    /// Row pointers, length `nv + 1`
    pub row_ptr: Vec<EdgeId>,
    /// Column indices (global ids)
    pub col_idx: Vec<VertexId>,
    /// Edge weights
    pub weights: Vec<f32>,
}

/// Resident CSR, degrees, frontiers and peer streams of one partition
#[derive(Debug, Clone)]
pub struct GraphPiece {
    part: usize,
    my_in_vtxs: Range<VertexId>,
    row_ptr: Vec<EdgeId>,
    col_idx: Vec<VertexId>,
    weights: Vec<f32>,
    degrees: Arc<[u32]>,
    frontier: DoubleBuffer<Vec<u8>>,
    frontier_capacity: u64,
    streams: Vec<ExecStream>,
}

impl GraphPiece {
    /// Assemble a piece with empty frontier buffers
    #[must_use]
    pub fn new(part: usize, my_in_vtxs: Range<VertexId>, csr: LocalCsr, degrees: Arc<[u32]>, num_parts: usize) -> Self {
        Self {
            part,
            my_in_vtxs,
            row_ptr: csr.row_ptr,
            col_idx: csr.col_idx,
            weights: csr.weights,
            degrees,
            frontier: DoubleBuffer::new(Vec::new(), Vec::new()),
            frontier_capacity: 0,
            streams: (0..num_parts).map(ExecStream::new).collect(),
        }
    }

    /// Set the frontier capacity and write the initial frontier into buffer 0
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::FrontierOverflow`] if it exceeds `capacity`
    pub fn init_frontier(&mut self, frontier: &Frontier, capacity: u64) -> Result<(), FormatError> {
        self.frontier_capacity = capacity;
        self.check_fits(frontier)?;
        self.frontier = DoubleBuffer::new(frontier.encode(), Vec::new());
        Ok(())
    }

    fn check_fits(&self, frontier: &Frontier) -> Result<(), FormatError> {
        let needed = frontier.encoded_len() as u64;
        if needed > self.frontier_capacity {
            return Err(FormatError::FrontierOverflow {
                part: self.part,
                needed,
                capacity: self.frontier_capacity,
            });
        }
        Ok(())
    }

    /// Partition index
    #[must_use]
    pub const fn part(&self) -> usize {
        self.part
    }

    /// Vertices resident on this piece
    #[must_use]
    pub fn my_in_vtxs(&self) -> Range<VertexId> {
        self.my_in_vtxs.clone()
    }

    /// Local vertex count
    #[must_use]
    pub const fn nv(&self) -> VertexId {
        self.my_in_vtxs.end - self.my_in_vtxs.start
    }

    /// Local edge count
    #[must_use]
    pub fn ne(&self) -> EdgeId {
        self.col_idx.len() as EdgeId
    }

    /// Local row pointers
    #[must_use]
    pub fn row_ptr(&self) -> &[EdgeId] {
        &self.row_ptr
    }

    /// Column indices (global ids)
    #[must_use]
    pub fn col_idx(&self) -> &[VertexId] {
        &self.col_idx
    }

    /// Edge weights
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Global out-degree array
    #[must_use]
    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    /// Columns and weights of a resident vertex's row
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn row(&self, v: VertexId) -> (&[VertexId], &[f32]) {
        let i = (v - self.my_in_vtxs.start) as usize;
        let edges = self.row_ptr[i] as usize..self.row_ptr[i + 1] as usize;
        (&self.col_idx[edges.clone()], &self.weights[edges])
    }

    /// Frontier byte capacity of this partition
    #[must_use]
    pub const fn frontier_capacity(&self) -> u64 {
        self.frontier_capacity
    }

    /// Decode the frontier read this iteration
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if the buffer holds no valid frontier
    pub fn current_frontier(&self) -> Result<Frontier, FormatError> {
        Frontier::decode(self.frontier.current())
    }

    /// Encode `frontier` into the buffer written this iteration
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::FrontierOverflow`] if it exceeds the capacity
    pub fn write_next_frontier(&mut self, frontier: &Frontier) -> Result<(), FormatError> {
        self.check_fits(frontier)?;
        *self.frontier.next_mut() = frontier.encode();
        Ok(())
    }

    /// Swap frontier roles after the iteration barrier
    pub fn swap_frontier(&mut self) {
        self.frontier.swap();
    }

    /// Encoded frontier buffers
    #[must_use]
    pub const fn frontier_buffers(&self) -> &DoubleBuffer<Vec<u8>> {
        &self.frontier
    }

    /// One stream per peer partition
    #[must_use]
    pub fn streams(&self) -> &[ExecStream] {
        &self.streams
    }

    /// Stream towards `peer`
    pub fn stream_mut(&mut self, peer: usize) -> &mut ExecStream {
        &mut self.streams[peer]
    }

    /// Bytes of the resident CSR (row pointers, columns, weights)
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        (self.row_ptr.len() * 8 + self.col_idx.len() * 4 + self.weights.len() * 4) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece() -> GraphPiece {
        // Vertices 2..4: 2 → {0, 1}, 3 → {3}
        let csr = LocalCsr {
            row_ptr: vec![0, 2, 3],
            col_idx: vec![0, 1, 3],
            weights: vec![1.0, 2.0, 3.0],
        };
        let mut piece = GraphPiece::new(1, 2..4, csr, Arc::from(vec![1; 4]), 3);
        piece.init_frontier(&Frontier::empty_dense(2), 9).unwrap();
        piece
    }

    #[test]
    fn test_row_lookup() {
        let p = piece();
        assert_eq!(p.nv(), 2);
        assert_eq!(p.ne(), 3);
        assert_eq!(p.row(2), (&[0, 1][..], &[1.0, 2.0][..]));
        assert_eq!(p.row(3).0, &[3]);
    }

    #[test]
    fn test_streams_sized_from_parts() {
        let mut p = piece();
        assert_eq!(p.streams().len(), 3);
        p.stream_mut(2).record(4, 32);
        assert_eq!(p.streams()[2].messages(), 4);
        assert_eq!(p.streams()[2].peer(), 2);
    }

    #[test]
    fn test_frontier_written_then_swapped() {
        let mut p = piece();
        let mut f = Frontier::empty_dense(2);
        f.insert(3, 2);
        p.write_next_frontier(&f).unwrap();
        assert!(p.current_frontier().unwrap().is_empty());
        p.swap_frontier();
        assert_eq!(p.current_frontier().unwrap(), f);
    }

    #[test]
    fn test_frontier_capacity_enforced() {
        let mut p = piece();
        let big = Frontier::Sparse(vec![2, 3, 2]);
        assert!(matches!(
            p.write_next_frontier(&big),
            Err(FormatError::FrontierOverflow { part: 1, needed: 20, capacity: 9 })
        ));
    }
}
