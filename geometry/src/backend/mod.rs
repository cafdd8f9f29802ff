//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction over the buffer memory
//! subsystem, allowing arenas to work with different GPU APIs.
//!
//! # Available Backends
//!
//! - `dummy` (always built): Host-memory backend for testing and development
//! - `wgpu-backend`: Cross-platform backend using wgpu
//! - `vulkan-backend`: Native Vulkan backend using ash
//!
//! # Architecture
//!
//! Each backend implements the [`GpuBackend`] trait, which provides:
//! - Buffer creation and destruction
//! - Synchronous device-side copies between buffers
//! - Host mapping of host-visible buffers
//!
//! Growth, resizing and size validation are layered on top of these
//! primitives by [`GeometryDevice`](crate::GeometryDevice).

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;
mod error;

use std::ptr::NonNull;
use std::sync::Arc;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;
use parking_lot::Mutex;

use crate::config::{BackendType, DeviceParameters};
use crate::types::{BufferCopyRegion, BufferDescriptor};

pub use dummy::DummyBackend;
pub use error::DeviceError;

/// Handle to a GPU buffer resource.
///
/// Handles are not cloneable; each one is owned by exactly one
/// [`Buffer`](crate::Buffer) and released through [`GpuBackend::destroy_buffer`].
#[allow(clippy::large_enum_variant)]
pub enum GpuBuffer {
    /// Dummy backend buffer backed by host memory.
    Dummy { data: Mutex<Vec<u8>> },
    /// wgpu backend buffer.
    ///
    /// wgpu cannot map vertex or index buffers, so mapping reads the buffer
    /// into `shadow` and unmapping writes it back through the queue.
    #[cfg(feature = "wgpu-backend")]
    Wgpu {
        buffer: wgpu::Buffer,
        shadow: Mutex<Option<Vec<u8>>>,
        size: u64,
    },
    /// Vulkan backend buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        buffer: vk::Buffer,
        allocation: Mutex<Option<Allocation>>,
        size: u64,
    },
}

impl GpuBuffer {
    /// Size in bytes as requested at creation.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy { data } => data.lock().len() as u64,
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu { size, .. } => *size,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { size, .. } => *size,
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { data } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("size", &data.lock().len())
                .finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Wgpu")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// Copies are synchronous: when [`copy_buffer`](GpuBackend::copy_buffer)
/// returns, the destination bytes are resident and visible to later
/// submissions from any thread.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a buffer resource.
    ///
    /// The descriptor has already been validated by the device; `size` is
    /// never zero.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, DeviceError>;

    /// Release a buffer's memory. Called exactly once per buffer.
    fn destroy_buffer(&self, buffer: &GpuBuffer);

    /// Copy `region` from `src` into `dst` and wait for completion.
    fn copy_buffer(
        &self,
        src: &GpuBuffer,
        dst: &GpuBuffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError>;

    /// Map `size` bytes of a host-visible buffer starting at `offset`.
    ///
    /// The returned pointer stays valid for `size` bytes until
    /// [`unmap_buffer`](GpuBackend::unmap_buffer) is called on the same buffer.
    fn map_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64)
    -> Result<NonNull<u8>, DeviceError>;

    /// Release a mapping created by [`map_buffer`](GpuBackend::map_buffer),
    /// making host writes visible to the device.
    fn unmap_buffer(&self, buffer: &GpuBuffer) -> Result<(), DeviceError>;
}

/// Selects and creates the backend requested by `params`.
///
/// [`BackendType::Auto`] tries Vulkan first, then wgpu, and falls back to
/// the dummy backend when neither is usable.
pub fn create_backend(params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, DeviceError> {
    match params.backend {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
        BackendType::Vulkan => create_vulkan_backend(params),
        BackendType::Wgpu => create_wgpu_backend(),
        BackendType::Auto => {
            match create_vulkan_backend(params) {
                Ok(backend) => return Ok(backend),
                Err(e) => log::warn!("Failed to create Vulkan backend: {}", e),
            }

            match create_wgpu_backend() {
                Ok(backend) => return Ok(backend),
                Err(e) => log::warn!("Failed to create wgpu backend: {}", e),
            }

            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
    }
}

#[cfg(feature = "vulkan-backend")]
fn create_vulkan_backend(params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, DeviceError> {
    let backend = vulkan::VulkanBackend::with_params(params)?;
    log::info!("Using Vulkan backend (ash)");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "vulkan-backend"))]
fn create_vulkan_backend(_params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, DeviceError> {
    Err(DeviceError::InitializationFailed(
        "built without the vulkan-backend feature".to_string(),
    ))
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend() -> Result<Arc<dyn GpuBackend>, DeviceError> {
    let backend = wgpu_backend::WgpuBackend::new()?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend() -> Result<Arc<dyn GpuBackend>, DeviceError> {
    Err(DeviceError::InitializationFailed(
        "built without the wgpu-backend feature".to_string(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(any(feature = "vulkan-backend", feature = "wgpu-backend"))
}

static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);
