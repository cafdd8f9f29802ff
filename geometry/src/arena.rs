//! Geometry arena.
//!
//! A [`GeometryArena`] packs the geometry of many meshes that share one
//! [`AttributeLayout`] into a single vertex buffer and a single index buffer.
//! Each stream is a dense run of elements: adding geometry appends to the end
//! and returns the element offsets the new data starts at, removing geometry
//! compacts everything behind it forward.
//!
//! # Failure Atomicity
//!
//! Every operation builds its replacement buffers while the current ones are
//! still in place and only swaps them in once all device work has succeeded.
//! When an operation returns an error the arena is exactly as it was, for
//! both streams.
//!
//! # Removal
//!
//! Device memory is never resized in place. To remove `[offset, offset + count)`
//! from a stream, the bytes before the range (`A`) and after it (`C`) are each
//! copied into a holding buffer, a new buffer of `|A| + |C|` bytes is created
//! and filled from the holding buffers, and only then is the old buffer
//! released. Offsets of geometry behind the removed range drop by `count`;
//! use [`GeometryRange::shifted_after_removal`] to update them.

use std::sync::Arc;

use crate::backend::DeviceError;
use crate::config::ArenaConfig;
use crate::device::GeometryDevice;
use crate::error::GeometryError;
use crate::layout::AttributeLayout;
use crate::range::{GeometryOffsets, GeometryRange};
use crate::resources::{Buffer, MappedBuffer};
use crate::staging::StagingBuffer;
use crate::types::{BufferDescriptor, BufferKind, ResizeMode};

/// One element stream of an arena.
///
/// Invariant: `buffer` is `None` iff `count == 0`, and otherwise
/// `buffer.size() == count * stride`.
struct Stream {
    template: BufferDescriptor,
    stride: u64,
    count: u64,
    buffer: Option<Buffer>,
}

/// A stream state built off to the side, waiting to be committed.
struct Replacement {
    buffer: Option<Buffer>,
    count: u64,
}

impl Stream {
    fn new(kind: BufferKind, stride: u64, config: &ArenaConfig) -> Self {
        let mut template = BufferDescriptor::new(kind, stride).with_profile(config.profile);
        if let Some(label) = &config.label {
            template = template.with_label(format!("{label} {kind}"));
        }
        Self {
            template,
            stride,
            count: 0,
            buffer: None,
        }
    }

    fn kind(&self) -> BufferKind {
        self.template.kind
    }

    fn byte_size(&self) -> u64 {
        self.buffer.as_ref().map_or(0, Buffer::size)
    }

    fn check_payload(&self, count: u64, bytes: &[u8]) -> Result<(), GeometryError> {
        check_payload(self.kind(), count, self.stride, bytes)
    }

    /// Number of whole elements in `size` bytes.
    fn elements_in(&self, size: u64) -> Result<u64, GeometryError> {
        whole_elements(self.kind(), size, self.stride)
    }

    /// A stream without a buffer accepts any removal as a no-op.
    fn check_range(&self, offset: u64, count: u64) -> Result<(), GeometryError> {
        if self.buffer.is_none() {
            return Ok(());
        }
        match offset.checked_add(count) {
            Some(end) if end <= self.count => Ok(()),
            _ => Err(GeometryError::Bounds {
                stream: self.kind(),
                offset,
                count,
                available: self.count,
            }),
        }
    }

    fn stage(
        &self,
        device: &Arc<GeometryDevice>,
        count: u64,
        bytes: &[u8],
    ) -> Result<Option<StagingBuffer>, DeviceError> {
        if count == 0 {
            return Ok(None);
        }
        StagingBuffer::from_bytes(device, bytes).map(Some)
    }

    /// This stream with `staging` appended.
    fn appended(
        &self,
        device: &Arc<GeometryDevice>,
        staging: &StagingBuffer,
    ) -> Result<Replacement, GeometryError> {
        let added = self.elements_in(staging.size())?;
        let old_size = self.byte_size();

        let grown = match &self.buffer {
            Some(buffer) => device.extended_buffer(buffer, old_size + staging.size())?,
            None => device.create_buffer(&self.template.with_size(staging.size()))?,
        };
        staging.upload_to(&grown, old_size)?;

        Ok(Replacement {
            buffer: Some(grown),
            count: self.count + added,
        })
    }

    /// This stream with elements `[offset, offset + count)` cut out.
    ///
    /// The range must already have passed [`Stream::check_range`].
    fn compacted(
        &self,
        device: &Arc<GeometryDevice>,
        offset: u64,
        count: u64,
    ) -> Result<Option<Replacement>, GeometryError> {
        let Some(buffer) = &self.buffer else {
            return Ok(None);
        };
        if count == 0 {
            return Ok(None);
        }

        let head = offset * self.stride;
        let tail_start = (offset + count) * self.stride;
        let tail = buffer.size() - tail_start;

        let held_head = match head {
            0 => None,
            size => Some(StagingBuffer::capture(buffer, 0, size)?),
        };
        let held_tail = match tail {
            0 => None,
            size => Some(StagingBuffer::capture(buffer, tail_start, size)?),
        };

        let kept = head + tail;
        let compacted = if kept == 0 {
            None
        } else {
            let replacement = device.create_buffer(&buffer.descriptor().with_size(kept))?;
            if let Some(held) = &held_head {
                held.upload_to(&replacement, 0)?;
            }
            if let Some(held) = &held_tail {
                held.upload_to(&replacement, head)?;
            }
            Some(replacement)
        };

        Ok(Some(Replacement {
            buffer: compacted,
            count: self.count - count,
        }))
    }

    /// This stream holding exactly the contents of `staging`.
    fn replaced(
        &self,
        device: &Arc<GeometryDevice>,
        staging: &StagingBuffer,
    ) -> Result<Replacement, GeometryError> {
        let count = self.elements_in(staging.size())?;

        let target = match &self.buffer {
            Some(buffer) => device.resized_buffer(buffer, staging.size(), ResizeMode::Clear)?,
            None => device.create_buffer(&self.template.with_size(staging.size()))?,
        };
        staging.upload_to(&target, 0)?;

        Ok(Replacement {
            buffer: Some(target),
            count,
        })
    }

    fn commit(&mut self, replacement: Replacement) {
        self.buffer = replacement.buffer;
        self.count = replacement.count;
    }

    fn release(&mut self) {
        self.buffer = None;
        self.count = 0;
    }
}

/// Check that `bytes` holds exactly `count` elements of `stride` bytes.
///
/// A zero count accepts any payload.
pub(crate) fn check_payload(
    stream: BufferKind,
    count: u64,
    stride: u64,
    bytes: &[u8],
) -> Result<(), GeometryError> {
    if count == 0 {
        return Ok(());
    }
    let actual = bytes.len() as u64;
    match count.checked_mul(stride) {
        Some(expected) if expected == actual => Ok(()),
        expected => Err(GeometryError::PayloadSize {
            stream,
            expected: expected.unwrap_or(u64::MAX),
            actual,
        }),
    }
}

/// Number of whole `stride`-byte elements in `size` bytes.
pub(crate) fn whole_elements(
    stream: BufferKind,
    size: u64,
    stride: u64,
) -> Result<u64, GeometryError> {
    if size % stride != 0 {
        return Err(GeometryError::Misaligned {
            stream,
            size,
            stride,
        });
    }
    Ok(size / stride)
}

/// A pair of device buffers holding the geometry of one attribute layout.
///
/// # Example
///
/// ```ignore
/// let mut arena = GeometryArena::new(
///     device,
///     AttributeLayout::position_only(),
///     4,
///     ArenaConfig::new(),
/// )?;
///
/// let offsets = arena.add_geometry(3, &vertex_bytes, 3, &index_bytes)?;
/// // ... draw with base vertex offsets.vertex and first index offsets.index ...
/// arena.remove_geometry(offsets.vertex, 3, offsets.index, 3)?;
/// ```
pub struct GeometryArena {
    device: Arc<GeometryDevice>,
    layout: AttributeLayout,
    config: ArenaConfig,
    vertex: Stream,
    index: Stream,
    terminated: bool,
}

impl GeometryArena {
    /// Create an empty arena for `layout` with indices of `index_size` bytes.
    ///
    /// No GPU memory is allocated until geometry is added.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Configuration`] if the layout is empty, its
    /// stride is zero, or `index_size` is zero.
    pub fn new(
        device: Arc<GeometryDevice>,
        layout: AttributeLayout,
        index_size: u64,
        config: ArenaConfig,
    ) -> Result<Self, GeometryError> {
        if layout.is_empty() {
            return Err(GeometryError::Configuration(
                "attribute layout has no attributes".to_string(),
            ));
        }
        let vertex_stride = layout.stride();
        if vertex_stride == 0 {
            return Err(GeometryError::Configuration(
                "attribute layout has a zero stride".to_string(),
            ));
        }
        if index_size == 0 {
            return Err(GeometryError::Configuration(
                "index size cannot be zero".to_string(),
            ));
        }

        log::debug!(
            "GeometryArena: created on {} (vertex stride={}, index size={})",
            device.backend_name(),
            vertex_stride,
            index_size
        );

        Ok(Self {
            vertex: Stream::new(BufferKind::Vertex, vertex_stride, &config),
            index: Stream::new(BufferKind::Index, index_size, &config),
            device,
            layout,
            config,
            terminated: false,
        })
    }

    /// Get the device the arena allocates from.
    pub fn device(&self) -> &Arc<GeometryDevice> {
        &self.device
    }

    /// Get the attribute layout.
    pub fn layout(&self) -> &AttributeLayout {
        &self.layout
    }

    /// Get the arena configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The vertex buffer, if any geometry is stored.
    pub fn vertex_buffer(&self) -> Option<&Buffer> {
        self.vertex.buffer.as_ref()
    }

    /// The index buffer, if any indices are stored.
    pub fn index_buffer(&self) -> Option<&Buffer> {
        self.index.buffer.as_ref()
    }

    /// Bytes per vertex.
    pub fn vertex_stride(&self) -> u64 {
        self.vertex.stride
    }

    /// Bytes per index.
    pub fn index_stride(&self) -> u64 {
        self.index.stride
    }

    /// Number of stored vertices.
    pub fn vertex_count(&self) -> u64 {
        self.vertex.count
    }

    /// Number of stored indices.
    pub fn index_count(&self) -> u64 {
        self.index.count
    }

    /// Offsets the next added geometry will start at.
    pub fn next_offsets(&self) -> GeometryOffsets {
        GeometryOffsets::new(self.vertex.count, self.index.count)
    }

    /// Whether both streams are empty.
    pub fn is_empty(&self) -> bool {
        self.vertex.count == 0 && self.index.count == 0
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn ensure_live(&self) -> Result<(), GeometryError> {
        if self.terminated {
            return Err(GeometryError::Terminated);
        }
        Ok(())
    }

    /// Append geometry and return the offsets it starts at.
    ///
    /// `vertex_bytes` must hold exactly `vertex_count * vertex_stride` bytes and
    /// `index_bytes` exactly `index_count * index_stride`. A count of zero skips
    /// that stream and its bytes are ignored. Returned offsets are the element
    /// counts from before the call.
    ///
    /// The data is resident on the device when this returns.
    ///
    /// # Errors
    ///
    /// - [`GeometryError::PayloadSize`] if a payload length is wrong
    /// - [`GeometryError::Device`] if allocation or a copy fails
    pub fn add_geometry(
        &mut self,
        vertex_count: u64,
        vertex_bytes: &[u8],
        index_count: u64,
        index_bytes: &[u8],
    ) -> Result<GeometryOffsets, GeometryError> {
        crate::profile_function!();
        self.ensure_live()?;
        self.vertex.check_payload(vertex_count, vertex_bytes)?;
        self.index.check_payload(index_count, index_bytes)?;

        let vertex = self.vertex.stage(&self.device, vertex_count, vertex_bytes)?;
        let index = self.index.stage(&self.device, index_count, index_bytes)?;

        self.append(vertex.as_ref(), index.as_ref())
    }

    /// Append typed vertices and indices.
    ///
    /// Counts are derived from the slice byte lengths.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Misaligned`] if a slice is not a whole number
    /// of elements of the arena's strides.
    pub fn add_geometry_typed<V: bytemuck::Pod, I: bytemuck::Pod>(
        &mut self,
        vertices: &[V],
        indices: &[I],
    ) -> Result<GeometryOffsets, GeometryError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_count = self.vertex.elements_in(vertex_bytes.len() as u64)?;
        let index_count = self.index.elements_in(index_bytes.len() as u64)?;
        self.add_geometry(vertex_count, vertex_bytes, index_count, index_bytes)
    }

    /// Append pre-filled staging buffers.
    ///
    /// Element counts are the staging sizes divided by the strides.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Misaligned`] if a staging size is not a whole
    /// number of elements.
    pub fn add_staged(
        &mut self,
        vertex: Option<&StagingBuffer>,
        index: Option<&StagingBuffer>,
    ) -> Result<GeometryOffsets, GeometryError> {
        crate::profile_function!();
        self.ensure_live()?;
        if let Some(staging) = vertex {
            self.vertex.elements_in(staging.size())?;
        }
        if let Some(staging) = index {
            self.index.elements_in(staging.size())?;
        }
        self.append(vertex, index)
    }

    fn append(
        &mut self,
        vertex: Option<&StagingBuffer>,
        index: Option<&StagingBuffer>,
    ) -> Result<GeometryOffsets, GeometryError> {
        let offsets = self.next_offsets();

        let vertex = vertex
            .map(|staging| self.vertex.appended(&self.device, staging))
            .transpose()?;
        let index = index
            .map(|staging| self.index.appended(&self.device, staging))
            .transpose()?;

        if let Some(replacement) = vertex {
            self.vertex.commit(replacement);
        }
        if let Some(replacement) = index {
            self.index.commit(replacement);
        }

        log::trace!(
            "GeometryArena: appended at {:?}, counts now ({}, {})",
            offsets,
            self.vertex.count,
            self.index.count
        );
        crate::profile_plot!("geometry_arena_vertices", self.vertex.count);

        Ok(offsets)
    }

    /// Remove a range of vertices and a range of indices, compacting both
    /// streams.
    ///
    /// Both ranges are validated before anything is copied. A zero count, or
    /// a stream with no buffer, leaves that stream untouched; removing every
    /// element releases the stream's buffer.
    ///
    /// Indices are stored as opaque bytes and are not rewritten, so indices
    /// of surviving geometry stay relative to their own base vertex.
    ///
    /// # Errors
    ///
    /// - [`GeometryError::Bounds`] if `offset + count` exceeds the count of a
    ///   stream that has a buffer
    /// - [`GeometryError::Device`] if a holding copy or allocation fails
    pub fn remove_geometry(
        &mut self,
        vertex_offset: u64,
        vertex_count: u64,
        index_offset: u64,
        index_count: u64,
    ) -> Result<(), GeometryError> {
        crate::profile_function!();
        self.ensure_live()?;
        self.vertex.check_range(vertex_offset, vertex_count)?;
        self.index.check_range(index_offset, index_count)?;

        let vertex = self
            .vertex
            .compacted(&self.device, vertex_offset, vertex_count)?;
        let index = self
            .index
            .compacted(&self.device, index_offset, index_count)?;

        if let Some(replacement) = vertex {
            self.vertex.commit(replacement);
        }
        if let Some(replacement) = index {
            self.index.commit(replacement);
        }

        log::trace!(
            "GeometryArena: removed {} vertices at {} and {} indices at {}",
            vertex_count,
            vertex_offset,
            index_count,
            index_offset
        );
        crate::profile_plot!("geometry_arena_vertices", self.vertex.count);

        Ok(())
    }

    /// Remove the geometry described by `range`.
    pub fn remove_range(&mut self, range: &GeometryRange) -> Result<(), GeometryError> {
        self.remove_geometry(
            range.vertex_offset,
            range.vertex_count,
            range.index_offset,
            range.index_count,
        )
    }

    /// Replace the contents of the given streams wholesale.
    ///
    /// Each provided stream is resized to exactly the staging size and
    /// overwritten; its count becomes `size / stride`. `None` leaves a stream
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Misaligned`] if a staging size is not a whole
    /// number of elements.
    pub fn set_data(
        &mut self,
        vertex: Option<&StagingBuffer>,
        index: Option<&StagingBuffer>,
    ) -> Result<(), GeometryError> {
        crate::profile_function!();
        self.ensure_live()?;
        if let Some(staging) = vertex {
            self.vertex.elements_in(staging.size())?;
        }
        if let Some(staging) = index {
            self.index.elements_in(staging.size())?;
        }

        let vertex = vertex
            .map(|staging| self.vertex.replaced(&self.device, staging))
            .transpose()?;
        let index = index
            .map(|staging| self.index.replaced(&self.device, staging))
            .transpose()?;

        if let Some(replacement) = vertex {
            self.vertex.commit(replacement);
        }
        if let Some(replacement) = index {
            self.index.commit(replacement);
        }
        Ok(())
    }

    /// Adopt externally prepared buffers.
    ///
    /// The arena takes ownership; each stream's count becomes `size / stride`
    /// and its previous buffer is released. `None` leaves a stream untouched.
    ///
    /// # Errors
    ///
    /// - [`GeometryError::Misaligned`] if a buffer is not a whole number of elements
    /// - [`DeviceError::BackendMismatch`] if a buffer belongs to another device
    pub fn set_buffers(
        &mut self,
        vertex: Option<Buffer>,
        index: Option<Buffer>,
    ) -> Result<(), GeometryError> {
        self.ensure_live()?;

        let mut counts = [None, None];
        for (slot, (stream, buffer)) in counts
            .iter_mut()
            .zip([(&self.vertex, &vertex), (&self.index, &index)])
        {
            if let Some(buffer) = buffer {
                if !Arc::ptr_eq(buffer.device(), &self.device) {
                    return Err(DeviceError::BackendMismatch(self.device.backend_name()).into());
                }
                *slot = Some(stream.elements_in(buffer.size())?);
            }
        }

        if let (Some(buffer), Some(count)) = (vertex, counts[0]) {
            self.vertex.commit(Replacement {
                buffer: Some(buffer),
                count,
            });
        }
        if let (Some(buffer), Some(count)) = (index, counts[1]) {
            self.index.commit(Replacement {
                buffer: Some(buffer),
                count,
            });
        }
        Ok(())
    }

    /// Map the whole vertex buffer for host access.
    ///
    /// # Errors
    ///
    /// - [`GeometryError::EmptyStream`] if no vertices are stored
    /// - [`DeviceError::NotHostVisible`] unless the arena uses a host-visible
    ///   memory profile
    pub fn map_vertex_buffer(&mut self) -> Result<MappedBuffer<'_>, GeometryError> {
        self.ensure_live()?;
        map_stream(&mut self.vertex)
    }

    /// Map the whole index buffer for host access.
    ///
    /// See [`map_vertex_buffer`](Self::map_vertex_buffer).
    pub fn map_index_buffer(&mut self) -> Result<MappedBuffer<'_>, GeometryError> {
        self.ensure_live()?;
        map_stream(&mut self.index)
    }

    /// Release both buffers and mark the arena terminated.
    ///
    /// Calling this more than once is a no-op.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.vertex.release();
        self.index.release();
        self.terminated = true;
        log::debug!("GeometryArena: terminated");
    }
}

fn map_stream(stream: &mut Stream) -> Result<MappedBuffer<'_>, GeometryError> {
    let kind = stream.kind();
    let buffer = stream
        .buffer
        .as_mut()
        .ok_or(GeometryError::EmptyStream(kind))?;
    Ok(buffer.map_all()?)
}

impl Drop for GeometryArena {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for GeometryArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryArena")
            .field("vertex_stride", &self.vertex.stride)
            .field("index_stride", &self.index.stride)
            .field("vertex_count", &self.vertex.count)
            .field("index_count", &self.index.count)
            .field("terminated", &self.terminated)
            .finish()
    }
}

static_assertions::assert_impl_all!(GeometryArena: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::layout::{VertexAttribute, VertexAttributeSemantic};
    use crate::staging::read_buffer;
    use crate::types::MemoryProfile;

    fn setup(index_size: u64) -> (Arc<DummyBackend>, GeometryArena) {
        let backend = Arc::new(DummyBackend::new());
        let device = GeometryDevice::with_backend(backend.clone());
        let arena = GeometryArena::new(
            device,
            AttributeLayout::position_only(),
            index_size,
            ArenaConfig::new(),
        )
        .unwrap();
        (backend, arena)
    }

    fn vertices(count: u64, seed: u8) -> Vec<u8> {
        (0..count * 12).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    fn indices(count: u64, seed: u8) -> Vec<u8> {
        (0..count * 4).map(|i| seed.wrapping_mul(3).wrapping_add(i as u8)).collect()
    }

    fn contents(buffer: Option<&Buffer>) -> Vec<u8> {
        buffer.map(|b| read_buffer(b).unwrap()).unwrap_or_default()
    }

    #[test]
    fn test_configuration_errors() {
        let device = GeometryDevice::dummy();
        let result = GeometryArena::new(
            device.clone(),
            AttributeLayout::new(),
            4,
            ArenaConfig::new(),
        );
        assert!(matches!(result, Err(GeometryError::Configuration(_))));

        let zero_width = AttributeLayout::new()
            .with_attribute(VertexAttribute::new(VertexAttributeSemantic::Custom(0), 0));
        let result = GeometryArena::new(device.clone(), zero_width, 4, ArenaConfig::new());
        assert!(matches!(result, Err(GeometryError::Configuration(_))));

        let result = GeometryArena::new(
            device,
            AttributeLayout::position_only(),
            0,
            ArenaConfig::new(),
        );
        assert!(matches!(result, Err(GeometryError::Configuration(_))));
    }

    #[test]
    fn test_new_arena_is_empty() {
        let (backend, arena) = setup(4);
        assert_eq!(arena.vertex_stride(), 12);
        assert_eq!(arena.index_stride(), 4);
        assert!(arena.is_empty());
        assert!(arena.vertex_buffer().is_none());
        assert!(arena.index_buffer().is_none());
        assert_eq!(backend.stats().buffers_created, 0);
    }

    #[test]
    fn test_offsets_are_running_totals() {
        let (_backend, mut arena) = setup(4);
        let counts = [(3, 6), (5, 9), (1, 3), (4, 0)];
        let mut expected = GeometryOffsets::default();

        for (k, &(vc, ic)) in counts.iter().enumerate() {
            let offsets = arena
                .add_geometry(vc, &vertices(vc, k as u8), ic, &indices(ic, k as u8))
                .unwrap();
            assert_eq!(offsets, expected);
            expected = GeometryOffsets::new(expected.vertex + vc, expected.index + ic);
        }

        assert_eq!(arena.vertex_count(), 13);
        assert_eq!(arena.index_count(), 18);
        assert_eq!(arena.vertex_buffer().unwrap().size(), 13 * 12);
        assert_eq!(arena.index_buffer().unwrap().size(), 18 * 4);
    }

    #[test]
    fn test_add_then_remove_front() {
        let (_backend, mut arena) = setup(4);
        let v1 = vertices(3, 1);
        let v2 = vertices(2, 100);
        let i2 = indices(2, 50);

        let first = arena.add_geometry(3, &v1, 3, &indices(3, 1)).unwrap();
        assert_eq!(first, GeometryOffsets::new(0, 0));
        assert_eq!((arena.vertex_count(), arena.index_count()), (3, 3));

        let second = arena.add_geometry(2, &v2, 2, &i2).unwrap();
        assert_eq!(second, GeometryOffsets::new(3, 3));
        assert_eq!((arena.vertex_count(), arena.index_count()), (5, 5));

        arena.remove_geometry(0, 3, 0, 3).unwrap();
        assert_eq!((arena.vertex_count(), arena.index_count()), (2, 2));
        assert_eq!(contents(arena.vertex_buffer()), v2);
        assert_eq!(contents(arena.index_buffer()), i2);
    }

    #[test]
    fn test_remove_middle_keeps_neighbours() {
        let (_backend, mut arena) = setup(2);
        let a = vertices(2, 10);
        let b = vertices(3, 20);
        let c = vertices(4, 30);
        arena.add_geometry(2, &a, 0, &[]).unwrap();
        arena.add_geometry(3, &b, 0, &[]).unwrap();
        arena.add_geometry(4, &c, 0, &[]).unwrap();

        arena.remove_geometry(2, 3, 0, 0).unwrap();

        assert_eq!(arena.vertex_count(), 6);
        assert_eq!(contents(arena.vertex_buffer()), [a, c].concat());
        assert!(arena.index_buffer().is_none());
    }

    #[test]
    fn test_remove_tail() {
        let (_backend, mut arena) = setup(4);
        let a = vertices(2, 1);
        arena.add_geometry(2, &a, 1, &indices(1, 1)).unwrap();
        arena.add_geometry(2, &vertices(2, 9), 1, &indices(1, 9)).unwrap();

        arena.remove_geometry(2, 2, 1, 1).unwrap();
        assert_eq!(contents(arena.vertex_buffer()), a);
        assert_eq!(arena.index_count(), 1);
    }

    #[test]
    fn test_remove_everything_then_add() {
        let (backend, mut arena) = setup(4);
        arena
            .add_geometry(3, &vertices(3, 0), 3, &indices(3, 0))
            .unwrap();
        arena.remove_geometry(0, 3, 0, 3).unwrap();

        assert!(arena.is_empty());
        assert!(arena.vertex_buffer().is_none());
        assert!(arena.index_buffer().is_none());
        assert_eq!(backend.stats().live_buffers(), 0);

        let offsets = arena
            .add_geometry(1, &vertices(1, 5), 2, &indices(2, 5))
            .unwrap();
        assert_eq!(offsets, GeometryOffsets::new(0, 0));
        assert_eq!((arena.vertex_count(), arena.index_count()), (1, 2));
    }

    #[test]
    fn test_remove_out_of_bounds_is_rejected() {
        let (backend, mut arena) = setup(4);
        let v = vertices(3, 7);
        arena.add_geometry(3, &v, 3, &indices(3, 7)).unwrap();
        let copies = backend.stats().copies;

        let result = arena.remove_geometry(0, 1, 2, 2);
        assert!(matches!(
            result,
            Err(GeometryError::Bounds {
                stream: BufferKind::Index,
                offset: 2,
                count: 2,
                available: 3,
            })
        ));
        assert!(matches!(
            arena.remove_geometry(u64::MAX, 2, 0, 0),
            Err(GeometryError::Bounds { .. })
        ));

        assert_eq!(backend.stats().copies, copies);
        assert_eq!((arena.vertex_count(), arena.index_count()), (3, 3));
        assert_eq!(contents(arena.vertex_buffer()), v);
    }

    #[test]
    fn test_remove_on_empty_arena_is_noop() {
        let (_backend, mut arena) = setup(4);
        arena.remove_geometry(0, 0, 0, 0).unwrap();
        arena.remove_geometry(0, 3, 5, 2).unwrap();
        assert!(arena.is_empty());
        assert!(arena.vertex_buffer().is_none());
    }

    #[test]
    fn test_remove_from_stream_without_buffer_is_noop() {
        let (_backend, mut arena) = setup(4);
        arena.add_geometry(2, &vertices(2, 3), 0, &[]).unwrap();

        arena.remove_geometry(0, 1, 0, 4).unwrap();
        assert_eq!((arena.vertex_count(), arena.index_count()), (1, 0));
        assert!(arena.index_buffer().is_none());
    }

    #[test]
    fn test_payload_size_mismatch() {
        let (backend, mut arena) = setup(4);
        let result = arena.add_geometry(2, &vertices(2, 0), 3, &[0; 11]);
        assert_eq!(
            result,
            Err(GeometryError::PayloadSize {
                stream: BufferKind::Index,
                expected: 12,
                actual: 11,
            })
        );
        assert!(arena.is_empty());
        assert_eq!(backend.stats().buffers_created, 0);
    }

    #[test]
    fn test_zero_count_ignores_bytes() {
        let (_backend, mut arena) = setup(4);
        let offsets = arena.add_geometry(0, &[1, 2, 3], 2, &indices(2, 0)).unwrap();
        assert_eq!(offsets, GeometryOffsets::new(0, 0));
        assert_eq!(arena.vertex_count(), 0);
        assert!(arena.vertex_buffer().is_none());
        assert_eq!(arena.index_count(), 2);
    }

    #[test]
    fn test_failed_add_leaves_arena_intact() {
        let (backend, mut arena) = setup(4);
        let v = vertices(2, 3);
        let i = indices(2, 3);
        arena.add_geometry(2, &v, 2, &i).unwrap();

        // Staging and growth for the vertex stream succeed; the index copy fails.
        backend.fail_copy_after(3);
        let result = arena.add_geometry(1, &vertices(1, 0), 1, &indices(1, 0));
        assert!(matches!(result, Err(GeometryError::Device(_))));

        assert_eq!((arena.vertex_count(), arena.index_count()), (2, 2));
        assert_eq!(contents(arena.vertex_buffer()), v);
        assert_eq!(contents(arena.index_buffer()), i);
        assert_eq!(backend.stats().live_buffers(), 2);
    }

    #[test]
    fn test_failed_remove_leaves_arena_intact() {
        let (backend, mut arena) = setup(4);
        let v = [vertices(2, 1), vertices(2, 2), vertices(2, 3)].concat();
        arena.add_geometry(6, &v, 0, &[]).unwrap();

        // Head capture succeeds, tail capture fails.
        backend.fail_copy_after(1);
        let result = arena.remove_geometry(2, 2, 0, 0);
        assert!(matches!(result, Err(GeometryError::Device(_))));
        assert_eq!(arena.vertex_count(), 6);
        assert_eq!(contents(arena.vertex_buffer()), v);

        backend.fail_allocation_after(2);
        let result = arena.remove_geometry(2, 2, 0, 0);
        assert!(matches!(
            result,
            Err(GeometryError::Device(DeviceError::OutOfMemory))
        ));
        assert_eq!(arena.vertex_count(), 6);
        assert_eq!(contents(arena.vertex_buffer()), v);
        assert_eq!(backend.stats().live_buffers(), 1);
    }

    #[test]
    fn test_remove_range_and_shift() {
        let (_backend, mut arena) = setup(4);
        let first = GeometryRange::at(
            arena.add_geometry(3, &vertices(3, 1), 3, &indices(3, 1)).unwrap(),
            3,
            3,
        );
        let b = vertices(2, 2);
        let second = GeometryRange::at(
            arena.add_geometry(2, &b, 6, &indices(6, 2)).unwrap(),
            2,
            6,
        );

        arena.remove_range(&first).unwrap();
        let moved = second.shifted_after_removal(&first).unwrap();
        assert_eq!(moved, GeometryRange::new(0, 2, 0, 6));
        assert_eq!(arena.vertex_count(), moved.ends().vertex);
        assert_eq!(contents(arena.vertex_buffer()), b);
    }

    #[test]
    fn test_add_typed() {
        let (_backend, mut arena) = setup(2);
        let positions: [[f32; 3]; 2] = [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]];
        let offsets = arena.add_geometry_typed(&positions, &[0u16, 1, 1]).unwrap();
        assert_eq!(offsets, GeometryOffsets::new(0, 0));
        assert_eq!((arena.vertex_count(), arena.index_count()), (2, 3));

        let result = arena.add_geometry_typed(&[0u8; 5], &[0u16]);
        assert!(matches!(result, Err(GeometryError::Misaligned { .. })));
    }

    #[test]
    fn test_add_staged() {
        let (_backend, mut arena) = setup(4);
        let device = arena.device().clone();
        let v = vertices(2, 4);
        let staging = StagingBuffer::from_bytes(&device, &v).unwrap();

        let offsets = arena.add_staged(Some(&staging), None).unwrap();
        assert_eq!(offsets, GeometryOffsets::new(0, 0));
        assert_eq!(arena.vertex_count(), 2);
        assert_eq!(arena.index_count(), 0);

        let odd = StagingBuffer::from_bytes(&device, &[0; 13]).unwrap();
        assert!(matches!(
            arena.add_staged(Some(&odd), None),
            Err(GeometryError::Misaligned { .. })
        ));
        assert_eq!(contents(arena.vertex_buffer()), v);
    }

    #[test]
    fn test_set_data_overwrites() {
        let (_backend, mut arena) = setup(4);
        arena
            .add_geometry(4, &vertices(4, 0), 4, &indices(4, 0))
            .unwrap();

        let device = arena.device().clone();
        let v = vertices(1, 77);
        let staging = StagingBuffer::from_bytes(&device, &v).unwrap();
        arena.set_data(Some(&staging), None).unwrap();

        assert_eq!(arena.vertex_count(), 1);
        assert_eq!(contents(arena.vertex_buffer()), v);
        assert_eq!(arena.index_count(), 4);

        let odd = StagingBuffer::from_bytes(&device, &[0; 6]).unwrap();
        assert!(arena.set_data(None, Some(&odd)).is_err());
        assert_eq!(arena.index_count(), 4);
    }

    #[test]
    fn test_set_buffers_adopts_ownership() {
        let (backend, mut arena) = setup(4);
        arena
            .add_geometry(1, &vertices(1, 0), 0, &[])
            .unwrap();

        let device = arena.device().clone();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 48))
            .unwrap();
        arena.set_buffers(Some(buffer), None).unwrap();
        assert_eq!(arena.vertex_count(), 4);
        assert_eq!(backend.stats().live_buffers(), 1);

        let misaligned = device
            .create_buffer(&BufferDescriptor::new(BufferKind::Index, 6))
            .unwrap();
        assert!(matches!(
            arena.set_buffers(None, Some(misaligned)),
            Err(GeometryError::Misaligned { .. })
        ));
        assert_eq!(arena.index_count(), 0);

        let foreign = GeometryDevice::dummy()
            .create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 12))
            .unwrap();
        assert!(matches!(
            arena.set_buffers(Some(foreign), None),
            Err(GeometryError::Device(DeviceError::BackendMismatch(_)))
        ));
        assert_eq!(arena.vertex_count(), 4);
    }

    #[test]
    fn test_map_host_visible_arena() {
        let device = GeometryDevice::dummy();
        let mut arena = GeometryArena::new(
            device,
            AttributeLayout::position_only(),
            4,
            ArenaConfig::new().with_profile(MemoryProfile::TransferFriendly),
        )
        .unwrap();

        assert!(matches!(
            arena.map_vertex_buffer(),
            Err(GeometryError::EmptyStream(BufferKind::Vertex))
        ));

        let v = vertices(3, 42);
        arena.add_geometry(3, &v, 3, &indices(3, 42)).unwrap();
        {
            let mapped = arena.map_vertex_buffer().unwrap();
            assert_eq!(&mapped[0..36], &v[..]);
        }
        let mut mapped = arena.map_index_buffer().unwrap();
        mapped[0] = 0xff;
        drop(mapped);
        assert_eq!(contents(arena.index_buffer())[0], 0xff);
    }

    #[test]
    fn test_map_device_only_arena() {
        let (_backend, mut arena) = setup(4);
        arena
            .add_geometry(1, &vertices(1, 0), 0, &[])
            .unwrap();
        assert!(matches!(
            arena.map_vertex_buffer(),
            Err(GeometryError::Device(DeviceError::NotHostVisible))
        ));
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let (backend, mut arena) = setup(4);
        arena
            .add_geometry(3, &vertices(3, 0), 3, &indices(3, 0))
            .unwrap();

        arena.terminate();
        arena.terminate();
        assert!(arena.is_terminated());
        assert_eq!(backend.stats().live_buffers(), 0);
        assert_eq!(backend.stats().buffers_destroyed, backend.stats().buffers_created);

        assert_eq!(
            arena.add_geometry(1, &vertices(1, 0), 0, &[]),
            Err(GeometryError::Terminated)
        );
        assert_eq!(
            arena.remove_geometry(0, 0, 0, 0),
            Err(GeometryError::Terminated)
        );
        drop(arena);
        assert_eq!(backend.stats().live_buffers(), 0);
    }

    #[test]
    fn test_labels_follow_config() {
        let device = GeometryDevice::dummy();
        let mut arena = GeometryArena::new(
            device,
            AttributeLayout::position_only(),
            4,
            ArenaConfig::new().with_label("terrain"),
        )
        .unwrap();
        arena
            .add_geometry(1, &vertices(1, 0), 1, &indices(1, 0))
            .unwrap();
        assert_eq!(arena.vertex_buffer().unwrap().label(), Some("terrain vertex"));
        assert_eq!(arena.index_buffer().unwrap().label(), Some("terrain index"));
    }
}
