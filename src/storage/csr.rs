//! CSR (Compressed Sparse Row) graph representation
//!
//! Whole-graph CSR used to produce partitioned graph files and to compute
//! single-process reference results.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! Forward (out-edges, push layout):
//!   row_offsets: [0, 2, 3, 3]   // vertex 0: edges [0..2), vertex 1: [2..3), vertex 2: [3..3)
//!   col_indices: [1, 2, 2]
//!
//! Reverse (in-edges, pull layout):
//!   row_offsets: [0, 0, 1, 3]
//!   col_indices: [0, 0, 1]
//! ```

use super::{EdgeId, Layout, VertexId};
use anyhow::{anyhow, Result};

/// Borrowed view of one CSR direction
#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a> {
    /// Row offsets, length `nv + 1`, first entry 0
    pub row_offsets: &'a [EdgeId],
    /// Column indices, length `ne`
    pub col_indices: &'a [VertexId],
    /// Edge weights, length `ne`
    pub weights: &'a [f32],
}

impl CsrView<'_> {
    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_offsets.len().saturating_sub(1)
    }

    /// Edge range of a row
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn row(&self, v: VertexId) -> std::ops::Range<usize> {
        let v = v as usize;
        self.row_offsets[v] as usize..self.row_offsets[v + 1] as usize
    }
}

/// CSR graph with forward and reverse adjacency
///
/// # Example
///
/// ```
/// use trueno_shard::CsrGraph;
///
/// let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (0, 2, 1.0)]).unwrap();
/// assert_eq!(graph.outgoing_neighbors(0).unwrap(), &[1, 2]);
/// assert_eq!(graph.incoming_neighbors(2).unwrap(), &[0]);
/// ```
#[derive(Debug, Clone)]
pub struct CsrGraph {
    /// Forward CSR: vertex i's out-edges are `[row_offsets[i], row_offsets[i+1])`
    row_offsets: Vec<EdgeId>,
    col_indices: Vec<VertexId>,
    edge_weights: Vec<f32>,

    /// Reverse CSR: vertex i's in-edges
    rev_row_offsets: Vec<EdgeId>,
    rev_col_indices: Vec<VertexId>,
    rev_edge_weights: Vec<f32>,

    num_vertices: usize,
}

impl CsrGraph {
    /// Build from an edge list; vertex count is `max id + 1`
    ///
    /// # Errors
    ///
    /// Returns error if the edge list is empty
    pub fn from_edge_list(edges: &[(VertexId, VertexId, f32)]) -> Result<Self> {
        let max_vertex = edges
            .iter()
            .flat_map(|(src, dst, _)| [*src, *dst])
            .max()
            .ok_or_else(|| anyhow!("Empty edge list"))?;
        Self::with_vertices(max_vertex as usize + 1, edges)
    }

    /// Build with an explicit vertex count (allows trailing isolated vertices)
    ///
    /// # Errors
    ///
    /// Returns error if an edge endpoint is `>= num_vertices`
    pub fn with_vertices(num_vertices: usize, edges: &[(VertexId, VertexId, f32)]) -> Result<Self> {
        if let Some((src, dst, _)) = edges
            .iter()
            .find(|(s, d, _)| *s as usize >= num_vertices || *d as usize >= num_vertices)
        {
            return Err(anyhow!(
                "Edge {src} → {dst} out of bounds for {num_vertices} vertices"
            ));
        }

        let (row_offsets, col_indices, edge_weights) =
            build_direction(num_vertices, edges.iter().map(|&(s, d, w)| (s, d, w)));
        let (rev_row_offsets, rev_col_indices, rev_edge_weights) =
            build_direction(num_vertices, edges.iter().map(|&(s, d, w)| (d, s, w)));

        Ok(Self {
            row_offsets,
            col_indices,
            edge_weights,
            rev_row_offsets,
            rev_col_indices,
            rev_edge_weights,
            num_vertices,
        })
    }

    /// Get outgoing neighbors of a vertex
    ///
    /// # Errors
    ///
    /// Returns error if vertex ID is out of bounds
    pub fn outgoing_neighbors(&self, v: VertexId) -> Result<&[VertexId]> {
        let view = self.out_csr();
        self.check(v)?;
        Ok(&self.col_indices[view.row(v)])
    }

    /// Get incoming neighbors of a vertex
    ///
    /// # Errors
    ///
    /// Returns error if vertex ID is out of bounds
    pub fn incoming_neighbors(&self, v: VertexId) -> Result<&[VertexId]> {
        let view = self.in_csr();
        self.check(v)?;
        Ok(&self.rev_col_indices[view.row(v)])
    }

    fn check(&self, v: VertexId) -> Result<()> {
        if (v as usize) >= self.num_vertices {
            return Err(anyhow!("Vertex ID {v} out of bounds"));
        }
        Ok(())
    }

    /// Out-degree of every vertex
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn out_degrees(&self) -> Vec<u32> {
        self.row_offsets
            .windows(2)
            .map(|w| (w[1] - w[0]) as u32)
            .collect()
    }

    /// Get number of vertices
    #[must_use]
    pub const fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Forward (out-edge) CSR
    #[must_use]
    pub fn out_csr(&self) -> CsrView<'_> {
        CsrView {
            row_offsets: &self.row_offsets,
            col_indices: &self.col_indices,
            weights: &self.edge_weights,
        }
    }

    /// Reverse (in-edge) CSR
    #[must_use]
    pub fn in_csr(&self) -> CsrView<'_> {
        CsrView {
            row_offsets: &self.rev_row_offsets,
            col_indices: &self.rev_col_indices,
            weights: &self.rev_edge_weights,
        }
    }

    /// CSR direction stored on disk for a layout
    ///
    /// Pull partitions by destination (in-edges), push by source (out-edges).
    #[must_use]
    pub fn csr_for(&self, layout: Layout) -> CsrView<'_> {
        match layout {
            Layout::Pull => self.in_csr(),
            Layout::Push => self.out_csr(),
        }
    }
}

/// Counting-sort edges by row, preserving input order within a row
fn build_direction(
    num_rows: usize,
    edges: impl Iterator<Item = (VertexId, VertexId, f32)> + Clone,
) -> (Vec<EdgeId>, Vec<VertexId>, Vec<f32>) {
    let mut row_offsets = vec![0 as EdgeId; num_rows + 1];
    for (row, _, _) in edges.clone() {
        row_offsets[row as usize + 1] += 1;
    }
    for i in 0..num_rows {
        row_offsets[i + 1] += row_offsets[i];
    }

    #[allow(clippy::cast_possible_truncation)]
    let num_edges = row_offsets[num_rows] as usize;
    let mut cursor: Vec<EdgeId> = row_offsets[..num_rows].to_vec();
    let mut col_indices = vec![0; num_edges];
    let mut weights = vec![0.0; num_edges];

    for (row, col, w) in edges {
        let slot = &mut cursor[row as usize];
        #[allow(clippy::cast_possible_truncation)]
        let at = *slot as usize;
        col_indices[at] = col;
        weights[at] = w;
        *slot += 1;
    }

    (row_offsets, col_indices, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edge_list_simple() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (0, 2, 1.0), (1, 2, 1.0)]).unwrap();

        assert_eq!(graph.num_vertices(), 3);
        assert_eq!(graph.num_edges(), 3);
        assert_eq!(graph.row_offsets, vec![0, 2, 3, 3]);
        assert_eq!(graph.col_indices, vec![1, 2, 2]);
        assert_eq!(graph.rev_row_offsets, vec![0, 0, 1, 3]);
        assert_eq!(graph.rev_col_indices, vec![0, 0, 1]);
    }

    #[test]
    fn test_empty_edge_list_rejected() {
        assert!(CsrGraph::from_edge_list(&[]).is_err());
    }

    #[test]
    fn test_with_vertices_keeps_isolated_tail() {
        let graph = CsrGraph::with_vertices(5, &[(0, 1, 1.0)]).unwrap();
        assert_eq!(graph.num_vertices(), 5);
        assert_eq!(graph.out_degrees(), vec![1, 0, 0, 0, 0]);
        assert!(graph.outgoing_neighbors(4).unwrap().is_empty());
    }

    #[test]
    fn test_with_vertices_rejects_out_of_range() {
        assert!(CsrGraph::with_vertices(2, &[(0, 2, 1.0)]).is_err());
    }

    #[test]
    fn test_incoming_neighbors_multi_edges() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0), (0, 1, 2.0), (2, 1, 3.0)]).unwrap();

        let incoming = graph.incoming_neighbors(1).unwrap();
        assert_eq!(incoming, &[0, 0, 2]);
        let view = graph.in_csr();
        assert_eq!(&view.weights[view.row(1)], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_out_of_bounds_query() {
        let graph = CsrGraph::from_edge_list(&[(0, 1, 1.0)]).unwrap();
        assert!(graph.outgoing_neighbors(9).is_err());
        assert!(graph.incoming_neighbors(9).is_err());
    }

    #[test]
    fn test_csr_for_layout() {
        let graph = CsrGraph::from_edge_list(&[(0, 2, 1.0), (1, 2, 1.0)]).unwrap();
        assert_eq!(graph.csr_for(Layout::Push).col_indices, &[2, 2]);
        assert_eq!(graph.csr_for(Layout::Pull).col_indices, &[0, 1]);
        assert_eq!(graph.csr_for(Layout::Pull).num_rows(), 3);
    }
}
