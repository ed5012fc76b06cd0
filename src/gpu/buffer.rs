//! Device mirrors of a piece's resident regions
//!
//! The frame-buffer regions of a Step task (row pointers, column indices,
//! weights) and the two encoded frontier buffers of the piece.

use super::GpuDevice;
use crate::pipeline::GraphPiece;
use crate::storage::{EdgeId, VertexId};
use anyhow::{Context, Result};

const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_DST)
    .union(wgpu::BufferUsages::COPY_SRC);

/// GPU buffers of one graph piece
#[derive(Debug)]
pub struct GpuPieceBuffers {
    /// Partition index
    pub part: usize,
    /// Local vertex count
    pub num_vertices: usize,
    /// Local edge count
    pub num_edges: usize,
    /// Row pointers (`num_vertices + 1` × u64)
    pub row_ptr: wgpu::Buffer,
    /// Column indices (`num_edges` × u32)
    pub col_idx: wgpu::Buffer,
    /// Edge weights (`num_edges` × f32)
    pub weights: wgpu::Buffer,
    /// Encoded frontier buffers, indexed like the piece's double buffer
    pub frontiers: [wgpu::Buffer; 2],
}

impl GpuPieceBuffers {
    /// Upload `piece`
    #[must_use]
    pub fn upload(device: &GpuDevice, piece: &GraphPiece) -> Self {
        let part = piece.part();
        let label = |name: &str| format!("piece {part} {name}");
        let frontier_capacity = usize::try_from(piece.frontier_capacity()).unwrap_or(usize::MAX);
        let frontier = |i: usize| {
            let mut bytes = piece.frontier_buffers().slot(i).clone();
            bytes.resize(frontier_capacity.max(bytes.len()), 0);
            device.create_buffer_init(&label(&format!("frontier[{i}]")), &bytes, USAGE)
        };

        Self {
            part,
            num_vertices: piece.nv() as usize,
            num_edges: piece.col_idx().len(),
            row_ptr: device.create_buffer_init(&label("row_ptr"), bytemuck::cast_slice(piece.row_ptr()), USAGE),
            col_idx: device.create_buffer_init(&label("col_idx"), bytemuck::cast_slice(piece.col_idx()), USAGE),
            weights: device.create_buffer_init(&label("weights"), bytemuck::cast_slice(piece.weights()), USAGE),
            frontiers: [frontier(0), frontier(1)],
        }
    }

    /// Bytes held in frame-buffer regions
    #[must_use]
    pub fn frame_buffer_bytes(&self) -> u64 {
        self.row_ptr.size() + self.col_idx.size() + self.weights.size()
    }

    /// Rewrite both device frontiers from the piece's host buffers
    ///
    /// # Errors
    ///
    /// Returns error if an encoded frontier outgrew its device buffer
    pub fn sync_frontiers(&self, device: &GpuDevice, piece: &GraphPiece) -> Result<()> {
        for (i, buffer) in self.frontiers.iter().enumerate() {
            let mut bytes = piece.frontier_buffers().slot(i).clone();
            let padded = (bytes.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
            anyhow::ensure!(
                padded <= buffer.size(),
                "frontier[{i}] of piece {} needs {padded} bytes, device buffer holds {}",
                self.part,
                buffer.size()
            );
            #[allow(clippy::cast_possible_truncation)]
            bytes.resize(padded as usize, 0);
            device.queue().write_buffer(buffer, 0, &bytes);
        }
        Ok(())
    }

    /// Read the row pointers back
    ///
    /// # Errors
    ///
    /// Returns error if readback fails
    pub async fn read_row_ptr(&self, device: &GpuDevice) -> Result<Vec<EdgeId>> {
        device
            .read_buffer(&self.row_ptr, self.num_vertices + 1)
            .await
            .with_context(|| format!("Failed to read row pointers of piece {}", self.part))
    }

    /// Read the column indices back
    ///
    /// # Errors
    ///
    /// Returns error if readback fails
    pub async fn read_col_idx(&self, device: &GpuDevice) -> Result<Vec<VertexId>> {
        device
            .read_buffer(&self.col_idx, self.num_edges)
            .await
            .with_context(|| format!("Failed to read column indices of piece {}", self.part))
    }
}

/// Upload every piece, in partition order
#[must_use]
pub fn upload_pieces(device: &GpuDevice, pieces: &[GraphPiece]) -> Vec<GpuPieceBuffers> {
    let buffers: Vec<_> = pieces.iter().map(|p| GpuPieceBuffers::upload(device, p)).collect();
    tracing::debug!(
        pieces = buffers.len(),
        bytes = buffers.iter().map(GpuPieceBuffers::frame_buffer_bytes).sum::<u64>(),
        "pieces resident on gpu"
    );
    buffers
}
