//! Bulk geometry import.
//!
//! Importing a scene one mesh at a time grows the arena buffers once per
//! mesh. A [`GeometryBatch`] concatenates many meshes on the host first and
//! uploads them with a single staging transfer per stream.

use crate::arena::{GeometryArena, check_payload, whole_elements};
use crate::error::GeometryError;
use crate::range::GeometryRange;
use crate::staging::StagingBuffer;
use crate::types::BufferKind;

/// Host-side accumulator of meshes bound for one arena.
///
/// # Example
///
/// ```ignore
/// let mut batch = GeometryBatch::for_arena(&arena);
/// for mesh in &meshes {
///     batch.push_typed(&mesh.vertices, &mesh.indices)?;
/// }
/// let ranges = batch.upload(&mut arena)?;
/// ```
#[derive(Debug, Clone)]
pub struct GeometryBatch {
    vertex_stride: u64,
    index_stride: u64,
    vertices: Vec<u8>,
    indices: Vec<u8>,
    ranges: Vec<GeometryRange>,
}

impl GeometryBatch {
    /// Create an empty batch for the given strides.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Configuration`] if either stride is zero.
    pub fn new(vertex_stride: u64, index_stride: u64) -> Result<Self, GeometryError> {
        if vertex_stride == 0 || index_stride == 0 {
            return Err(GeometryError::Configuration(format!(
                "batch strides must be non-zero (vertex: {vertex_stride}, index: {index_stride})"
            )));
        }
        Ok(Self {
            vertex_stride,
            index_stride,
            vertices: Vec::new(),
            indices: Vec::new(),
            ranges: Vec::new(),
        })
    }

    /// Create an empty batch matching `arena`'s strides.
    pub fn for_arena(arena: &GeometryArena) -> Self {
        Self {
            vertex_stride: arena.vertex_stride(),
            index_stride: arena.index_stride(),
            vertices: Vec::new(),
            indices: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Add one mesh and return its position in the batch.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::PayloadSize`] if a payload length disagrees
    /// with its count.
    pub fn push(
        &mut self,
        vertex_count: u64,
        vertex_bytes: &[u8],
        index_count: u64,
        index_bytes: &[u8],
    ) -> Result<usize, GeometryError> {
        check_payload(BufferKind::Vertex, vertex_count, self.vertex_stride, vertex_bytes)?;
        check_payload(BufferKind::Index, index_count, self.index_stride, index_bytes)?;

        self.ranges.push(GeometryRange::new(
            self.vertex_count(),
            vertex_count,
            self.index_count(),
            index_count,
        ));
        if vertex_count > 0 {
            self.vertices.extend_from_slice(vertex_bytes);
        }
        if index_count > 0 {
            self.indices.extend_from_slice(index_bytes);
        }
        Ok(self.ranges.len() - 1)
    }

    /// Add one mesh from typed slices.
    pub fn push_typed<V: bytemuck::Pod, I: bytemuck::Pod>(
        &mut self,
        vertices: &[V],
        indices: &[I],
    ) -> Result<usize, GeometryError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_count =
            whole_elements(BufferKind::Vertex, vertex_bytes.len() as u64, self.vertex_stride)?;
        let index_count =
            whole_elements(BufferKind::Index, index_bytes.len() as u64, self.index_stride)?;
        self.push(vertex_count, vertex_bytes, index_count, index_bytes)
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total vertices across all meshes.
    pub fn vertex_count(&self) -> u64 {
        self.vertices.len() as u64 / self.vertex_stride
    }

    /// Total indices across all meshes.
    pub fn index_count(&self) -> u64 {
        self.indices.len() as u64 / self.index_stride
    }

    /// Mesh ranges relative to the start of the batch.
    pub fn ranges(&self) -> &[GeometryRange] {
        &self.ranges
    }

    /// Upload every mesh into `arena` and return where each one landed.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Configuration`] if the arena's strides differ
    /// from the batch's, or any error from [`GeometryArena::add_staged`]. On
    /// error the arena is unchanged.
    pub fn upload(&self, arena: &mut GeometryArena) -> Result<Vec<GeometryRange>, GeometryError> {
        crate::profile_function!();
        if arena.vertex_stride() != self.vertex_stride || arena.index_stride() != self.index_stride
        {
            return Err(GeometryError::Configuration(format!(
                "batch strides ({}, {}) do not match arena strides ({}, {})",
                self.vertex_stride,
                self.index_stride,
                arena.vertex_stride(),
                arena.index_stride()
            )));
        }

        let device = arena.device().clone();
        let vertex = (!self.vertices.is_empty())
            .then(|| StagingBuffer::from_bytes(&device, &self.vertices))
            .transpose()?;
        let index = (!self.indices.is_empty())
            .then(|| StagingBuffer::from_bytes(&device, &self.indices))
            .transpose()?;

        let base = arena.add_staged(vertex.as_ref(), index.as_ref())?;

        log::debug!(
            "GeometryBatch: uploaded {} meshes ({} vertices, {} indices) at {:?}",
            self.len(),
            self.vertex_count(),
            self.index_count(),
            base
        );

        Ok(self.ranges.iter().map(|range| range.rebased(base)).collect())
    }
}
