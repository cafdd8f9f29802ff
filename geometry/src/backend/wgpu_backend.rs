//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and WebGPU.
//!
//! wgpu only lets `MAP_READ`/`MAP_WRITE` buffers be mapped, and those cannot
//! also be vertex or index buffers. Mapping is therefore emulated: the buffer
//! is read back into a host shadow copy, handed out, and written back through
//! the queue on unmap. wgpu also requires copy offsets and sizes to be
//! multiples of [`wgpu::COPY_BUFFER_ALIGNMENT`]. Allocations are padded to
//! that alignment. Aligned copies go through a command encoder; any other
//! copy reads the source bytes and the enclosing aligned window of the
//! destination back to the host, splices them there and writes the window
//! back through the queue, so bytes outside the region are never touched.

use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::types::{BufferCopyRegion, BufferDescriptor, BufferUsage};

use super::{DeviceError, GpuBackend, GpuBuffer};

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend.
    pub fn new() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| DeviceError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("RedLilium Geometry Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceError::InitializationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn raw<'a>(
        &self,
        buffer: &'a GpuBuffer,
    ) -> Result<(&'a wgpu::Buffer, &'a Mutex<Option<Vec<u8>>>, u64), DeviceError> {
        match buffer {
            GpuBuffer::Wgpu {
                buffer,
                shadow,
                size,
            } => Ok((buffer, shadow, *size)),
            #[allow(unreachable_patterns)]
            _ => Err(DeviceError::BackendMismatch(self.name())),
        }
    }

    /// Block until `submission` has finished on the GPU.
    fn wait(&self, submission: wgpu::SubmissionIndex) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| DeviceError::CopyFailed(format!("Failed to wait for queue: {e}")))
    }

    /// Copy `size` bytes starting at `offset` of `buffer` back to the host.
    ///
    /// The read covers the enclosing aligned window, which stays inside the
    /// padded allocation.
    fn read_back(
        &self,
        buffer: &wgpu::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, DeviceError> {
        let start = align_down(offset);
        let padded = align_copy_size(offset + size) - start;
        if padded == 0 {
            return Ok(Vec::new());
        }

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Readback Buffer"),
            size: padded,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Geometry Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, start, &readback, 0, padded);
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait(submission)?;

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(DeviceError::CopyFailed(format!(
                    "Failed to map readback buffer: {e}"
                )));
            }
            Err(_) => {
                return Err(DeviceError::Internal(
                    "readback map callback dropped".to_string(),
                ));
            }
        }

        let head = (offset - start) as usize;
        let data = slice.get_mapped_range()[head..head + size as usize].to_vec();
        readback.unmap();
        readback.destroy();

        Ok(data)
    }

    /// Copy an unaligned region by assembling the destination window on the host.
    fn splice(
        &self,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError> {
        let bytes = self.read_back(src, region.src_offset, region.size)?;

        let window_start = align_down(region.dst_offset);
        let window_size = align_copy_size(region.dst_offset + region.size) - window_start;
        let mut window = self.read_back(dst, window_start, window_size)?;

        let head = (region.dst_offset - window_start) as usize;
        window[head..head + bytes.len()].copy_from_slice(&bytes);

        self.queue.write_buffer(dst, window_start, &window);
        let submission = self.queue.submit(std::iter::empty());
        self.wait(submission)
    }
}

/// Round `offset` down to wgpu's copy alignment.
fn align_down(offset: u64) -> u64 {
    offset - offset % wgpu::COPY_BUFFER_ALIGNMENT
}

/// Round `size` up to wgpu's copy alignment.
fn align_copy_size(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();

    if usage.contains(BufferUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }

    result
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        let usage = convert_buffer_usage(descriptor.usage());

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: align_copy_size(descriptor.size),
            usage,
            mapped_at_creation: false,
        });

        log::trace!(
            "WgpuBackend: created {} buffer {:?} (size: {})",
            descriptor.kind,
            descriptor.label,
            descriptor.size
        );

        Ok(GpuBuffer::Wgpu {
            buffer,
            shadow: Mutex::new(None),
            size: descriptor.size,
        })
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let Ok((raw, _, size)) = self.raw(buffer) {
            raw.destroy();
            log::trace!("WgpuBackend: destroyed buffer (size: {})", size);
        }
    }

    fn copy_buffer(
        &self,
        src: &GpuBuffer,
        dst: &GpuBuffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError> {
        let (src_raw, _, _) = self.raw(src)?;
        let (dst_raw, _, _) = self.raw(dst)?;

        if region.size == 0 {
            return Ok(());
        }

        let alignment = wgpu::COPY_BUFFER_ALIGNMENT;
        if region.src_offset % alignment != 0
            || region.dst_offset % alignment != 0
            || region.size % alignment != 0
        {
            self.splice(src_raw, dst_raw, region)?;
        } else {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Geometry Copy Encoder"),
                });
            encoder.copy_buffer_to_buffer(
                src_raw,
                region.src_offset,
                dst_raw,
                region.dst_offset,
                region.size,
            );
            let submission = self.queue.submit(std::iter::once(encoder.finish()));
            self.wait(submission)?;
        }

        log::trace!(
            "WgpuBackend: copied {} bytes ({} -> {})",
            region.size,
            region.src_offset,
            region.dst_offset
        );
        Ok(())
    }

    fn map_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceError> {
        let (raw, shadow, buffer_size) = self.raw(buffer)?;
        if offset.saturating_add(size) > buffer_size {
            return Err(DeviceError::InvalidParameter(format!(
                "map range exceeds buffer size {buffer_size}"
            )));
        }

        let mut shadow = shadow.lock();
        if shadow.is_some() {
            return Err(DeviceError::AlreadyMapped);
        }

        let data = shadow.insert(self.read_back(raw, 0, buffer_size)?);

        // The shadow Vec is left untouched until unmap, so the pointer outlives the lock.
        NonNull::new(data.as_mut_ptr().wrapping_add(offset as usize))
            .ok_or_else(|| DeviceError::Internal("null shadow storage".to_string()))
    }

    fn unmap_buffer(&self, buffer: &GpuBuffer) -> Result<(), DeviceError> {
        let (raw, shadow, _) = self.raw(buffer)?;
        let Some(mut data) = shadow.lock().take() else {
            return Ok(());
        };

        data.resize(align_copy_size(data.len() as u64) as usize, 0);
        self.queue.write_buffer(raw, 0, &data);
        let submission = self.queue.submit(std::iter::empty());
        self.wait(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferKind;

    #[test]
    fn test_align_copy_size() {
        assert_eq!(align_copy_size(0), 0);
        assert_eq!(align_copy_size(1), 4);
        assert_eq!(align_copy_size(4), 4);
        assert_eq!(align_copy_size(6), 8);
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(0), 0);
        assert_eq!(align_down(3), 0);
        assert_eq!(align_down(6), 4);
        assert_eq!(align_down(8), 8);
    }

    #[test]
    fn test_usage_never_requests_mapping() {
        let desc = BufferDescriptor::new(BufferKind::Vertex, 16)
            .with_profile(crate::types::MemoryProfile::TransferFriendly);
        let usage = convert_buffer_usage(desc.usage());
        assert!(usage.contains(wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST));
        assert!(!usage.intersects(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE));
    }
}
