//! Staging transfers.
//!
//! Device-only memory cannot be written by the host, so every byte that enters
//! or leaves an arena goes through a [`StagingBuffer`]: a transient,
//! host-visible buffer that is filled through a mapping and then copied on
//! the device. Staging buffers are never pooled; each transfer creates its
//! own and the memory is released when it drops.

use std::sync::Arc;

use crate::backend::DeviceError;
use crate::device::GeometryDevice;
use crate::resources::Buffer;
use crate::types::BufferCopyRegion;

/// A transient host-visible buffer.
pub struct StagingBuffer {
    buffer: Buffer,
}

impl StagingBuffer {
    /// Create an uninitialized staging buffer of `size` bytes.
    pub fn new(device: &Arc<GeometryDevice>, size: u64) -> Result<Self, DeviceError> {
        let buffer = device.create_staging_buffer(size)?;
        Ok(Self { buffer })
    }

    /// Create a staging buffer holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidParameter`] if `bytes` is empty.
    pub fn from_bytes(device: &Arc<GeometryDevice>, bytes: &[u8]) -> Result<Self, DeviceError> {
        let mut staging = Self::new(device, bytes.len() as u64)?;
        staging.write(0, bytes)?;
        Ok(staging)
    }

    /// Create a staging buffer holding the raw bytes of `data`.
    pub fn from_slice<T: bytemuck::Pod>(
        device: &Arc<GeometryDevice>,
        data: &[T],
    ) -> Result<Self, DeviceError> {
        Self::from_bytes(device, bytemuck::cast_slice(data))
    }

    /// Copy `size` bytes of `src` starting at `offset` into a new staging buffer.
    pub fn capture(src: &Buffer, offset: u64, size: u64) -> Result<Self, DeviceError> {
        let device = src.device();
        let staging = Self::new(device, size)?;
        device.copy_buffer_region(src, &staging.buffer, BufferCopyRegion::new(offset, 0, size))?;
        Ok(staging)
    }

    /// Write `bytes` at `offset` through a mapping.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), DeviceError> {
        let mut mapped = self.buffer.map(offset, bytes.len() as u64)?;
        mapped.copy_from_slice(bytes);
        mapped.unmap()
    }

    /// Read the whole buffer back to the host.
    pub fn read(&mut self) -> Result<Vec<u8>, DeviceError> {
        let mapped = self.buffer.map_all()?;
        let data = mapped.to_vec();
        mapped.unmap()?;
        Ok(data)
    }

    /// Device-copy the whole staging buffer into `dst` at `dst_offset`.
    pub fn upload_to(&self, dst: &Buffer, dst_offset: u64) -> Result<(), DeviceError> {
        self.buffer.device().copy_buffer_region(
            &self.buffer,
            dst,
            BufferCopyRegion::new(0, dst_offset, self.size()),
        )
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Take the underlying buffer.
    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }
}

impl std::fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StagingBuffer").field(&self.buffer).finish()
    }
}

/// Read the full contents of any buffer, including device-only ones.
pub fn read_buffer(buffer: &Buffer) -> Result<Vec<u8>, DeviceError> {
    StagingBuffer::capture(buffer, 0, buffer.size())?.read()
}
