//! Element offsets and ranges inside an arena.
//!
//! Offsets are element indices, not byte offsets: vertex offsets count
//! vertices and index offsets count indices. The arena does not remember what
//! it handed out; callers keep these values in their own draw records.

/// Where a geometry starts in each stream, returned by
/// [`GeometryArena::add_geometry`](crate::GeometryArena::add_geometry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeometryOffsets {
    /// First vertex.
    pub vertex: u64,
    /// First index.
    pub index: u64,
}

impl GeometryOffsets {
    pub fn new(vertex: u64, index: u64) -> Self {
        Self { vertex, index }
    }
}

/// A geometry's full extent in both streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeometryRange {
    pub vertex_offset: u64,
    pub vertex_count: u64,
    pub index_offset: u64,
    pub index_count: u64,
}

impl GeometryRange {
    pub fn new(vertex_offset: u64, vertex_count: u64, index_offset: u64, index_count: u64) -> Self {
        Self {
            vertex_offset,
            vertex_count,
            index_offset,
            index_count,
        }
    }

    /// Range starting at `offsets` with the given counts.
    pub fn at(offsets: GeometryOffsets, vertex_count: u64, index_count: u64) -> Self {
        Self::new(offsets.vertex, vertex_count, offsets.index, index_count)
    }

    /// Start of the range.
    pub fn offsets(&self) -> GeometryOffsets {
        GeometryOffsets::new(self.vertex_offset, self.index_offset)
    }

    /// One past the last element in each stream.
    pub fn ends(&self) -> GeometryOffsets {
        GeometryOffsets::new(
            self.vertex_offset + self.vertex_count,
            self.index_offset + self.index_count,
        )
    }

    /// Where this range lives after `removed` was compacted out of the arena.
    ///
    /// Returns `None` if the two ranges overlap in either stream, because part
    /// of this geometry was destroyed.
    pub fn shifted_after_removal(&self, removed: &GeometryRange) -> Option<Self> {
        let vertex_offset = shift(
            self.vertex_offset,
            self.vertex_count,
            removed.vertex_offset,
            removed.vertex_count,
        )?;
        let index_offset = shift(
            self.index_offset,
            self.index_count,
            removed.index_offset,
            removed.index_count,
        )?;
        Some(Self {
            vertex_offset,
            index_offset,
            ..*self
        })
    }

    /// This range moved forward by `base` in each stream.
    pub fn rebased(&self, base: GeometryOffsets) -> Self {
        Self {
            vertex_offset: base.vertex + self.vertex_offset,
            index_offset: base.index + self.index_offset,
            ..*self
        }
    }
}

fn shift(offset: u64, count: u64, removed_offset: u64, removed_count: u64) -> Option<u64> {
    if removed_count == 0 {
        return Some(offset);
    }
    let removed_end = removed_offset.saturating_add(removed_count);
    if offset >= removed_end {
        return Some(offset - removed_count);
    }
    if count == 0 {
        return Some(offset.min(removed_offset));
    }
    if offset.saturating_add(count) > removed_offset {
        None
    } else {
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ends() {
        let range = GeometryRange::new(3, 2, 10, 6);
        assert_eq!(range.offsets(), GeometryOffsets::new(3, 10));
        assert_eq!(range.ends(), GeometryOffsets::new(5, 16));
    }

    #[test]
    fn test_shift_after_earlier_removal() {
        let removed = GeometryRange::new(0, 3, 0, 3);
        let survivor = GeometryRange::new(3, 2, 3, 2);
        assert_eq!(
            survivor.shifted_after_removal(&removed),
            Some(GeometryRange::new(0, 2, 0, 2))
        );
    }

    #[test]
    fn test_earlier_range_is_unchanged() {
        let removed = GeometryRange::new(4, 4, 6, 6);
        let survivor = GeometryRange::new(0, 4, 0, 6);
        assert_eq!(survivor.shifted_after_removal(&removed), Some(survivor));
    }

    #[test]
    fn test_overlap_is_none() {
        let removed = GeometryRange::new(2, 4, 0, 0);
        assert_eq!(
            GeometryRange::new(4, 4, 0, 0).shifted_after_removal(&removed),
            None
        );
        assert_eq!(
            GeometryRange::new(0, 3, 0, 0).shifted_after_removal(&removed),
            None
        );
    }

    #[test]
    fn test_streams_shift_independently() {
        let removed = GeometryRange::new(0, 5, 10, 3);
        let survivor = GeometryRange::new(5, 1, 0, 10);
        assert_eq!(
            survivor.shifted_after_removal(&removed),
            Some(GeometryRange::new(0, 1, 0, 10))
        );
    }

    #[test]
    fn test_rebased() {
        let range = GeometryRange::new(1, 2, 3, 4);
        assert_eq!(
            range.rebased(GeometryOffsets::new(10, 20)),
            GeometryRange::new(11, 2, 23, 4)
        );
    }
}
