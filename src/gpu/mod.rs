//! GPU residency of graph pieces
//!
//! The placement planner binds a Step task's CSR regions (row pointers,
//! vertex range, column indices) to frame-buffer memory. With this feature
//! those regions are mirrored into real `wgpu` storage buffers.
//!
//! # Architecture
//!
//! - `device`: adapter selection, buffer creation and staged readback
//! - `buffer`: per-piece CSR and frontier buffers
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod buffer;
mod device;

pub use buffer::{upload_pieces, GpuPieceBuffers};
pub use device::{GpuDevice, GpuDeviceError};
