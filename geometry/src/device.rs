//! Geometry device.
//!
//! The [`GeometryDevice`] is the buffer memory subsystem arenas are built on.
//! It wraps a [`GpuBackend`] and adds validation, growth and resizing on top
//! of the backend's create/copy/map primitives.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{DeviceError, DummyBackend, GpuBackend, GpuBuffer, create_backend};
use crate::config::DeviceParameters;
use crate::resources::{Buffer, MappedBuffer};
use crate::types::{BufferCopyRegion, BufferDescriptor, ResizeMode};

/// A device for creating and moving geometry buffers.
///
/// # Thread Safety
///
/// `GeometryDevice` is `Send + Sync` and is shared as `Arc<GeometryDevice>`.
/// Every buffer holds a strong reference to its device.
///
/// # Example
///
/// ```ignore
/// let device = GeometryDevice::new(&DeviceParameters::new())?;
///
/// let mut buffer = device.create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 1024))?;
/// device.extend_buffer(&mut buffer, 2048)?;
/// ```
pub struct GeometryDevice {
    backend: Arc<dyn GpuBackend>,
    label_prefix: String,
    max_buffer_size: u64,
    live_buffers: AtomicUsize,
}

impl GeometryDevice {
    /// Create a device on the backend selected by `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly requested backend cannot be initialized.
    pub fn new(params: &DeviceParameters) -> Result<Arc<Self>, DeviceError> {
        let backend = create_backend(params)?;
        Ok(Self::from_parts(backend, params))
    }

    /// Create a device on an existing backend with default parameters.
    pub fn with_backend(backend: Arc<dyn GpuBackend>) -> Arc<Self> {
        Self::from_parts(backend, &DeviceParameters::default())
    }

    /// Create a device on a fresh [`DummyBackend`].
    pub fn dummy() -> Arc<Self> {
        Self::with_backend(Arc::new(DummyBackend::new()))
    }

    fn from_parts(backend: Arc<dyn GpuBackend>, params: &DeviceParameters) -> Arc<Self> {
        log::debug!("GeometryDevice: created on {}", backend.name());
        Arc::new(Self {
            backend,
            label_prefix: params.label_prefix.clone(),
            max_buffer_size: params.max_buffer_size,
            live_buffers: AtomicUsize::new(0),
        })
    }

    /// Get the backend.
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Largest buffer this device will create, in bytes.
    pub fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    /// Number of buffers created by this device that have not been dropped.
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.load(Ordering::Acquire)
    }

    /// Create a GPU buffer.
    ///
    /// Buffers without a label get one derived from the device's label prefix
    /// and the buffer kind.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidParameter`] if the size is zero or exceeds
    /// the device limit, or the backend's error if allocation fails.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
    ) -> Result<Buffer, DeviceError> {
        if descriptor.size == 0 {
            return Err(DeviceError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        if descriptor.size > self.max_buffer_size {
            return Err(DeviceError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.max_buffer_size
            )));
        }

        let mut descriptor = descriptor.clone();
        if descriptor.label.is_none() {
            descriptor.label = Some(format!("{} {}", self.label_prefix, descriptor.kind));
        }

        let gpu = self.backend.create_buffer(&descriptor)?;
        self.live_buffers.fetch_add(1, Ordering::AcqRel);

        log::trace!(
            "GeometryDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(Buffer::new(Arc::clone(self), descriptor, gpu))
    }

    /// Create a staging buffer of `size` bytes.
    pub fn create_staging_buffer(self: &Arc<Self>, size: u64) -> Result<Buffer, DeviceError> {
        self.create_buffer(&BufferDescriptor::staging(size))
    }

    /// Copy a byte range from `src` to `dst` and wait for it to land.
    ///
    /// A zero-sized region is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidParameter`] if either range falls outside
    /// its buffer or the ranges overlap within one buffer.
    pub fn copy_buffer_region(
        &self,
        src: &Buffer,
        dst: &Buffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError> {
        if region.size == 0 {
            return Ok(());
        }

        if !std::ptr::eq(Arc::as_ptr(src.device()), self)
            || !std::ptr::eq(Arc::as_ptr(dst.device()), self)
        {
            return Err(DeviceError::BackendMismatch(self.backend_name()));
        }

        let src_end = region.src_end().filter(|end| *end <= src.size());
        let dst_end = region.dst_end().filter(|end| *end <= dst.size());
        let (Some(src_end), Some(dst_end)) = (src_end, dst_end) else {
            return Err(DeviceError::InvalidParameter(format!(
                "copy region {:?} exceeds buffer sizes (src: {}, dst: {})",
                region,
                src.size(),
                dst.size()
            )));
        };

        if std::ptr::eq(src, dst) && region.src_offset < dst_end && region.dst_offset < src_end {
            return Err(DeviceError::InvalidParameter(format!(
                "copy region {:?} overlaps itself",
                region
            )));
        }

        self.backend.copy_buffer(src.gpu(), dst.gpu(), region)
    }

    /// Create a copy of `buffer` with `new_size` bytes.
    ///
    /// With [`ResizeMode::Preserve`] the first `min(old, new)` bytes are
    /// carried over; with [`ResizeMode::Clear`] the new buffer starts
    /// uninitialized. `buffer` itself is left untouched.
    pub fn resized_buffer(
        self: &Arc<Self>,
        buffer: &Buffer,
        new_size: u64,
        mode: ResizeMode,
    ) -> Result<Buffer, DeviceError> {
        let replacement = self.create_buffer(&buffer.descriptor().with_size(new_size))?;

        if mode == ResizeMode::Preserve {
            let keep = buffer.size().min(new_size);
            self.copy_buffer_region(buffer, &replacement, BufferCopyRegion::whole(keep))?;
        }

        Ok(replacement)
    }

    /// Resize `buffer` in place.
    ///
    /// On error `buffer` still holds its original memory and contents.
    pub fn resize_buffer(
        self: &Arc<Self>,
        buffer: &mut Buffer,
        new_size: u64,
        mode: ResizeMode,
    ) -> Result<(), DeviceError> {
        *buffer = self.resized_buffer(buffer, new_size, mode)?;
        Ok(())
    }

    /// Create a grown copy of `buffer` whose first `buffer.size()` bytes match it.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidParameter`] if `new_size` is smaller than
    /// the current size.
    pub fn extended_buffer(
        self: &Arc<Self>,
        buffer: &Buffer,
        new_size: u64,
    ) -> Result<Buffer, DeviceError> {
        if new_size < buffer.size() {
            return Err(DeviceError::InvalidParameter(format!(
                "cannot extend a {}-byte buffer to {} bytes",
                buffer.size(),
                new_size
            )));
        }
        self.resized_buffer(buffer, new_size, ResizeMode::Preserve)
    }

    /// Grow `buffer` in place to `new_size`, preserving its contents.
    pub fn extend_buffer(
        self: &Arc<Self>,
        buffer: &mut Buffer,
        new_size: u64,
    ) -> Result<(), DeviceError> {
        *buffer = self.extended_buffer(buffer, new_size)?;
        Ok(())
    }

    /// Map `size` bytes of `buffer` starting at `offset`.
    ///
    /// See [`Buffer::map`].
    pub fn map_buffer<'a>(
        &self,
        buffer: &'a mut Buffer,
        offset: u64,
        size: u64,
    ) -> Result<MappedBuffer<'a>, DeviceError> {
        buffer.map(offset, size)
    }

    /// Destroy a buffer now rather than when it goes out of scope.
    pub fn destroy_buffer(&self, buffer: Buffer) {
        drop(buffer);
    }

    /// Release backend memory for a buffer that is being dropped.
    pub(crate) fn release_buffer(&self, descriptor: &BufferDescriptor, gpu: &GpuBuffer) {
        self.backend.destroy_buffer(gpu);
        self.live_buffers.fetch_sub(1, Ordering::AcqRel);
        log::trace!(
            "GeometryDevice: destroyed buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
    }
}

impl std::fmt::Debug for GeometryDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryDevice")
            .field("backend", &self.backend.name())
            .field("live_buffers", &self.live_buffer_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GeometryDevice: Send, Sync);
