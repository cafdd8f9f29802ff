//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. Buffers live in host memory, copies are
//! plain `memcpy`s, and every buffer is mappable. That keeps the arena logic
//! testable on machines without GPU hardware, byte for byte.
//!
//! The backend also counts what it does and can be told to fail the n-th
//! allocation or copy, so error paths can be exercised deterministically.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::types::{BufferCopyRegion, BufferDescriptor};

use super::{DeviceError, GpuBackend, GpuBuffer};

/// Snapshot of the dummy backend's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyStats {
    /// Buffers created so far.
    pub buffers_created: usize,
    /// Buffers destroyed so far.
    pub buffers_destroyed: usize,
    /// Device copies performed.
    pub copies: usize,
    /// Total bytes moved by device copies.
    pub bytes_copied: u64,
    /// Map calls that succeeded.
    pub maps: usize,
}

impl DummyStats {
    /// Buffers created and not yet destroyed.
    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_destroyed
    }
}

#[derive(Debug, Default)]
struct Counters {
    buffers_created: AtomicUsize,
    buffers_destroyed: AtomicUsize,
    copies: AtomicUsize,
    bytes_copied: AtomicU64,
    maps: AtomicUsize,
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    counters: Counters,
    fail_allocation_in: Mutex<Option<usize>>,
    fail_copy_in: Mutex<Option<usize>>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub fn stats(&self) -> DummyStats {
        DummyStats {
            buffers_created: self.counters.buffers_created.load(Ordering::Relaxed),
            buffers_destroyed: self.counters.buffers_destroyed.load(Ordering::Relaxed),
            copies: self.counters.copies.load(Ordering::Relaxed),
            bytes_copied: self.counters.bytes_copied.load(Ordering::Relaxed),
            maps: self.counters.maps.load(Ordering::Relaxed),
        }
    }

    /// Make the allocation `skip` calls from now fail with
    /// [`DeviceError::OutOfMemory`]. `0` fails the very next one.
    pub fn fail_allocation_after(&self, skip: usize) {
        *self.fail_allocation_in.lock() = Some(skip);
    }

    /// Make the copy `skip` calls from now fail with [`DeviceError::CopyFailed`].
    pub fn fail_copy_after(&self, skip: usize) {
        *self.fail_copy_in.lock() = Some(skip);
    }

    /// Cancel any pending injected failure.
    pub fn clear_failures(&self) {
        *self.fail_allocation_in.lock() = None;
        *self.fail_copy_in.lock() = None;
    }

    /// Read a buffer's full contents. Test helper; real backends have no
    /// equivalent.
    pub fn contents(&self, buffer: &GpuBuffer) -> Option<Vec<u8>> {
        match buffer {
            GpuBuffer::Dummy { data } => Some(data.lock().clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    fn data<'a>(&self, buffer: &'a GpuBuffer) -> Result<&'a Mutex<Vec<u8>>, DeviceError> {
        match buffer {
            GpuBuffer::Dummy { data } => Ok(data),
            #[allow(unreachable_patterns)]
            _ => Err(DeviceError::BackendMismatch(self.name())),
        }
    }
}

/// Count down an injected failure; `true` when it fires.
fn fire(slot: &Mutex<Option<usize>>) -> bool {
    let mut slot = slot.lock();
    match *slot {
        Some(0) => {
            *slot = None;
            true
        }
        Some(n) => {
            *slot = Some(n - 1);
            false
        }
        None => false,
    }
}

fn out_of_range(region: &BufferCopyRegion, src_len: usize, dst_len: usize) -> DeviceError {
    DeviceError::CopyFailed(format!(
        "region {:?} out of range (src: {} bytes, dst: {} bytes)",
        region, src_len, dst_len
    ))
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        log::trace!(
            "DummyBackend: creating {} buffer {:?} (size: {})",
            descriptor.kind,
            descriptor.label,
            descriptor.size
        );

        if fire(&self.fail_allocation_in) {
            log::trace!("DummyBackend: injected allocation failure");
            return Err(DeviceError::OutOfMemory);
        }

        let size = usize::try_from(descriptor.size).map_err(|_| DeviceError::OutOfMemory)?;
        self.counters.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(GpuBuffer::Dummy {
            data: Mutex::new(vec![0; size]),
        })
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let GpuBuffer::Dummy { data } = buffer {
            log::trace!("DummyBackend: destroying buffer (size: {})", data.lock().len());
            self.counters
                .buffers_destroyed
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    fn copy_buffer(
        &self,
        src: &GpuBuffer,
        dst: &GpuBuffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError> {
        let src_data = self.data(src)?;
        let dst_data = self.data(dst)?;

        if fire(&self.fail_copy_in) {
            log::trace!("DummyBackend: injected copy failure");
            return Err(DeviceError::CopyFailed("injected failure".to_string()));
        }

        let size = region.size as usize;
        let src_start = region.src_offset as usize;
        let dst_start = region.dst_offset as usize;

        if std::ptr::eq(src_data, dst_data) {
            let mut data = src_data.lock();
            let len = data.len();
            if src_start + size > len || dst_start + size > len {
                return Err(out_of_range(&region, len, len));
            }
            data.copy_within(src_start..src_start + size, dst_start);
        } else {
            let src_guard = src_data.lock();
            let mut dst_guard = dst_data.lock();
            let (Some(from), Some(to)) = (
                src_guard.get(src_start..src_start + size),
                dst_guard.get_mut(dst_start..dst_start + size),
            ) else {
                return Err(out_of_range(&region, src_guard.len(), dst_guard.len()));
            };
            to.copy_from_slice(from);
        }

        log::trace!(
            "DummyBackend: copied {} bytes ({} -> {})",
            region.size,
            region.src_offset,
            region.dst_offset
        );
        self.counters.copies.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_copied
            .fetch_add(region.size, Ordering::Relaxed);
        Ok(())
    }

    fn map_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceError> {
        let data = self.data(buffer)?;
        let mut data = data.lock();
        let end = offset.saturating_add(size);
        if end > data.len() as u64 {
            return Err(DeviceError::InvalidParameter(format!(
                "map range {}..{} exceeds buffer size {}",
                offset,
                end,
                data.len()
            )));
        }

        // The Vec is never resized while mapped, so the pointer outlives the lock.
        let ptr = NonNull::new(data.as_mut_ptr().wrapping_add(offset as usize))
            .ok_or_else(|| DeviceError::Internal("null buffer storage".to_string()))?;
        self.counters.maps.fetch_add(1, Ordering::Relaxed);
        Ok(ptr)
    }

    fn unmap_buffer(&self, buffer: &GpuBuffer) -> Result<(), DeviceError> {
        self.data(buffer)?;
        log::trace!("DummyBackend: unmapping buffer");
        Ok(())
    }
}
