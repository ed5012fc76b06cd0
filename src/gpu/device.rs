//! wgpu device wrapper
//!
//! Adapter selection, buffer creation and readback through a mapped staging
//! buffer.

use anyhow::{Context, Result};
use thiserror::Error;
use wgpu::util::DeviceExt;

/// GPU device initialization errors
#[derive(Debug, Error)]
pub enum GpuDeviceError {
    /// No compatible GPU adapter found
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(String),
}

/// GPU device holding graph pieces
#[derive(Debug)]
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

impl GpuDevice {
    /// Whether a device can be created; tests use this to skip on GPU-less hosts
    pub async fn is_gpu_available() -> bool {
        Self::new().await.is_ok()
    }

    /// Device on any backend
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError`] if no adapter is found or the device request fails
    pub async fn new() -> Result<Self, GpuDeviceError> {
        Self::new_with_backend(wgpu::Backends::all()).await
    }

    /// Device on the given backends
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError`] if no adapter is found or the device request fails
    pub async fn new_with_backend(backends: wgpu::Backends) -> Result<Self, GpuDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuDeviceError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("trueno-shard piece device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuDeviceError::DeviceRequest(e.to_string()))?;

        tracing::info!(adapter = %adapter.get_info().name, "gpu device ready");
        Ok(Self { device, queue, adapter })
    }

    /// Adapter info (name, backend)
    #[must_use]
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Storage buffer initialised with `contents`
    #[must_use]
    pub fn create_buffer_init(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        })
    }

    /// Uninitialised buffer
    #[must_use]
    pub fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Copy the first `len` elements of `buffer` back to the host
    ///
    /// # Errors
    ///
    /// Returns error if mapping fails or the bytes do not cast to `T`
    pub async fn read_buffer<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<T>> {
        let bytes = (len * std::mem::size_of::<T>()) as u64;
        if bytes == 0 {
            return Ok(Vec::new());
        }
        let size = bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let staging = self.create_buffer(
            "piece staging",
            size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.receive()
            .await
            .context("Failed to receive map result")?
            .context("Buffer mapping failed")?;

        let data = slice.get_mapped_range();
        #[allow(clippy::cast_possible_truncation)]
        let values = bytemuck::try_cast_slice::<u8, T>(&data[..bytes as usize])
            .map_err(|e| anyhow::anyhow!("Readback cast failed: {e:?}"))?
            .to_vec();
        drop(data);
        staging.unmap();
        Ok(values)
    }

    /// Device reference
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Queue reference
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_backends_fails() {
        let device = GpuDevice::new_with_backend(wgpu::Backends::empty()).await;
        assert!(matches!(device, Err(GpuDeviceError::NoAdapter)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(GpuDeviceError::NoAdapter.to_string(), "No compatible GPU adapter found");
        assert_eq!(
            GpuDeviceError::DeviceRequest("lost".to_string()).to_string(),
            "Failed to request GPU device: lost"
        );
    }

    #[tokio::test]
    async fn test_read_buffer_roundtrip() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("Skipping test_read_buffer_roundtrip: GPU not available");
            return;
        }
        let device = GpuDevice::new().await.unwrap();
        let data: Vec<u32> = vec![7, 8, 9];
        let buffer = device.create_buffer_init(
            "test",
            bytemuck::cast_slice(&data),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        assert_eq!(device.read_buffer::<u32>(&buffer, 3).await.unwrap(), data);
    }
}
