//! Buffer types and descriptors.

use bitflags::bitflags;

/// What a buffer is used for.
///
/// Passed to [`GeometryDevice::create_buffer`](crate::GeometryDevice::create_buffer)
/// as part of the [`BufferDescriptor`]; backends derive usage flags and memory
/// placement from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// Index data.
    Index,
    /// Transient host-visible buffer used to move bytes to or from device memory.
    Staging,
}

impl BufferKind {
    /// Get the kind name for labels and log output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Index => "index",
            Self::Staging => "staging",
        }
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a vertex or index buffer's memory lives.
///
/// Staging buffers ignore the profile and are always host-visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryProfile {
    /// Let the backend pick; device-local for vertex and index buffers.
    #[default]
    Automatic,
    /// Host memory the GPU reads over the bus. Mappable.
    CpuOnly,
    /// Device-local memory. Not mappable.
    DeviceOnly,
    /// Host-visible memory that is also fast for the GPU to read. Mappable.
    TransferFriendly,
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 2;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 3;
        /// Buffer is mappable for CPU reads.
        const MAP_READ = 1 << 4;
        /// Buffer is mappable for CPU writes.
        const MAP_WRITE = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// What happens to existing content when a buffer changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    /// Keep the first `min(old, new)` bytes.
    Preserve,
    /// Discard the old content.
    Clear,
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// What the buffer holds.
    pub kind: BufferKind,
    /// Memory placement.
    pub profile: MemoryProfile,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor with the automatic memory profile.
    pub fn new(kind: BufferKind, size: u64) -> Self {
        Self {
            label: None,
            size,
            kind,
            profile: MemoryProfile::Automatic,
        }
    }

    /// Create a descriptor for a staging buffer of `size` bytes.
    pub fn staging(size: u64) -> Self {
        Self::new(BufferKind::Staging, size)
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the memory profile.
    pub fn with_profile(mut self, profile: MemoryProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Copy of this descriptor with a different size.
    pub fn with_size(&self, size: u64) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    /// Whether the buffer's memory can be mapped by the host.
    pub fn is_host_visible(&self) -> bool {
        match self.kind {
            BufferKind::Staging => true,
            BufferKind::Vertex | BufferKind::Index => matches!(
                self.profile,
                MemoryProfile::CpuOnly | MemoryProfile::TransferFriendly
            ),
        }
    }

    /// Usage flags implied by the kind and profile.
    ///
    /// Every buffer can be a copy source and destination since growth and
    /// compaction move bytes between buffers of the same kind.
    pub fn usage(&self) -> BufferUsage {
        let mut usage = BufferUsage::COPY_SRC | BufferUsage::COPY_DST;
        match self.kind {
            BufferKind::Vertex => usage |= BufferUsage::VERTEX,
            BufferKind::Index => usage |= BufferUsage::INDEX,
            BufferKind::Staging => {}
        }
        if self.is_host_visible() {
            usage |= BufferUsage::MAP_READ | BufferUsage::MAP_WRITE;
        }
        usage
    }
}

/// A region within a buffer for copy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCopyRegion {
    /// Offset in bytes from the start of the source buffer.
    pub src_offset: u64,
    /// Offset in bytes from the start of the destination buffer.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

impl BufferCopyRegion {
    /// Create a new buffer copy region.
    pub fn new(src_offset: u64, dst_offset: u64, size: u64) -> Self {
        Self {
            src_offset,
            dst_offset,
            size,
        }
    }

    /// Create a region that copies `size` bytes from the start of the source
    /// to the start of the destination.
    pub fn whole(size: u64) -> Self {
        Self::new(0, 0, size)
    }

    /// End of the source range, or `None` on overflow.
    pub fn src_end(&self) -> Option<u64> {
        self.src_offset.checked_add(self.size)
    }

    /// End of the destination range, or `None` on overflow.
    pub fn dst_end(&self) -> Option<u64> {
        self.dst_offset.checked_add(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_is_always_host_visible() {
        for profile in [
            MemoryProfile::Automatic,
            MemoryProfile::CpuOnly,
            MemoryProfile::DeviceOnly,
            MemoryProfile::TransferFriendly,
        ] {
            let desc = BufferDescriptor::staging(64).with_profile(profile);
            assert!(desc.is_host_visible(), "{profile:?}");
        }
    }

    #[test]
    fn test_vertex_host_visibility_follows_profile() {
        let desc = BufferDescriptor::new(BufferKind::Vertex, 64);
        assert!(!desc.is_host_visible());
        assert!(!desc.with_profile(MemoryProfile::DeviceOnly).is_host_visible());
        assert!(
            BufferDescriptor::new(BufferKind::Index, 64)
                .with_profile(MemoryProfile::CpuOnly)
                .is_host_visible()
        );
        assert!(
            BufferDescriptor::new(BufferKind::Vertex, 64)
                .with_profile(MemoryProfile::TransferFriendly)
                .is_host_visible()
        );
    }

    #[test]
    fn test_usage_flags() {
        let usage = BufferDescriptor::new(BufferKind::Index, 16).usage();
        assert!(usage.contains(BufferUsage::INDEX | BufferUsage::COPY_SRC | BufferUsage::COPY_DST));
        assert!(!usage.contains(BufferUsage::VERTEX));
        assert!(!usage.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE));

        let usage = BufferDescriptor::staging(16).usage();
        assert!(usage.contains(BufferUsage::MAP_WRITE));
    }

    #[test]
    fn test_with_size_keeps_everything_else() {
        let desc = BufferDescriptor::new(BufferKind::Vertex, 16)
            .with_label("mesh")
            .with_profile(MemoryProfile::CpuOnly);
        let grown = desc.with_size(48);
        assert_eq!(grown.size, 48);
        assert_eq!(grown.label.as_deref(), Some("mesh"));
        assert_eq!(grown.profile, MemoryProfile::CpuOnly);
        assert_eq!(grown.kind, BufferKind::Vertex);
    }

    #[test]
    fn test_copy_region_ends() {
        let region = BufferCopyRegion::new(8, 16, 4);
        assert_eq!(region.src_end(), Some(12));
        assert_eq!(region.dst_end(), Some(20));
        assert_eq!(BufferCopyRegion::new(u64::MAX, 0, 1).src_end(), None);
        assert_eq!(BufferCopyRegion::whole(32), BufferCopyRegion::new(0, 0, 32));
    }
}
