//! GPU buffer resource.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{DeviceError, GpuBuffer};
use crate::device::GeometryDevice;
use crate::types::{BufferDescriptor, BufferKind};

/// An owned GPU buffer.
///
/// Buffers are created by [`GeometryDevice::create_buffer`] and are owned by
/// exactly one holder; the GPU memory is released when the buffer drops.
/// Each buffer keeps its device alive, so a backend is never torn down while
/// one of its buffers still exists.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 1024))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
pub struct Buffer {
    device: Arc<GeometryDevice>,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
    mapped: bool,
}

impl Buffer {
    /// Wrap a backend handle (called by GeometryDevice).
    pub(crate) fn new(
        device: Arc<GeometryDevice>,
        descriptor: BufferDescriptor,
        gpu: GpuBuffer,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
            mapped: false,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GeometryDevice> {
        &self.device
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer kind.
    pub fn kind(&self) -> BufferKind {
        self.descriptor.kind
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Whether the host can map this buffer.
    pub fn is_host_visible(&self) -> bool {
        self.descriptor.is_host_visible()
    }

    /// Whether a mapping is currently open.
    ///
    /// Only observable as `true` if a [`MappedBuffer`] was leaked with
    /// `mem::forget`; the guard otherwise borrows the buffer exclusively.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Get the backend handle.
    pub fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    /// Map `size` bytes starting at `offset` for host access.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NotHostVisible`] if the memory is device-only
    /// - [`DeviceError::InvalidParameter`] if the range is empty or exceeds the buffer
    /// - [`DeviceError::AlreadyMapped`] if a previous mapping was never released
    pub fn map(&mut self, offset: u64, size: u64) -> Result<MappedBuffer<'_>, DeviceError> {
        if !self.is_host_visible() {
            return Err(DeviceError::NotHostVisible);
        }
        if size == 0 {
            return Err(DeviceError::InvalidParameter(
                "map size cannot be zero".to_string(),
            ));
        }
        match offset.checked_add(size) {
            Some(end) if end <= self.size() => {}
            _ => {
                return Err(DeviceError::InvalidParameter(format!(
                    "map range of {} bytes at offset {} exceeds buffer size {}",
                    size,
                    offset,
                    self.size()
                )));
            }
        }
        if self.mapped {
            return Err(DeviceError::AlreadyMapped);
        }

        let ptr = self.device.backend().map_buffer(&self.gpu, offset, size)?;
        self.mapped = true;

        Ok(MappedBuffer {
            buffer: self,
            ptr,
            len: size as usize,
        })
    }

    /// Map the whole buffer.
    pub fn map_all(&mut self) -> Result<MappedBuffer<'_>, DeviceError> {
        let size = self.size();
        self.map(0, size)
    }

    fn unmap(&mut self) -> Result<(), DeviceError> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;
        self.device.backend().unmap_buffer(&self.gpu)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            log::warn!("Failed to unmap {} buffer on drop: {}", self.kind(), e);
        }
        self.device.release_buffer(&self.descriptor, &self.gpu);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.descriptor.size)
            .field("kind", &self.descriptor.kind)
            .field("profile", &self.descriptor.profile)
            .field("label", &self.descriptor.label)
            .field("mapped", &self.mapped)
            .finish()
    }
}

/// Host access to a mapped buffer range.
///
/// Dereferences to the mapped bytes. The range is unmapped when the guard
/// drops, including on early returns and panics.
pub struct MappedBuffer<'a> {
    buffer: &'a mut Buffer,
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedBuffer<'_> {
    /// Release the mapping now and report any unmap failure.
    pub fn unmap(self) -> Result<(), DeviceError> {
        let result = self.buffer.unmap();
        // Already unmapped; Drop would find nothing to do anyway.
        std::mem::forget(self);
        result
    }
}

impl std::ops::Deref for MappedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the backend guarantees `len` valid bytes at `ptr` until unmap,
        // and the guard holds the buffer exclusively.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl std::ops::DerefMut for MappedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see Deref
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.buffer.unmap() {
            log::warn!("Failed to unmap {} buffer: {}", self.buffer.kind(), e);
        }
    }
}

impl std::fmt::Debug for MappedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("buffer", &self.buffer)
            .field("len", &self.len)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
