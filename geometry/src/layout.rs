//! Attribute layouts.
//!
//! An [`AttributeLayout`] is the binary shape of one vertex: an ordered list of
//! attributes, each a semantic plus a width in bytes. Attributes are packed
//! back to back, so the stride is the sum of the widths and the order defines
//! both the byte offsets and the binding order.
//!
//! Layouts compare and hash structurally. Two layouts built independently
//! from the same attributes select the same arena in a
//! [`StoreRegistry`](crate::StoreRegistry).
//!
//! # Example
//!
//! ```ignore
//! let layout = AttributeLayout::new()
//!     .with(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3)
//!     .with(VertexAttributeSemantic::Normal, VertexAttributeFormat::Float3)
//!     .with(VertexAttributeSemantic::TexCoord(0), VertexAttributeFormat::Float2);
//!
//! assert_eq!(layout.stride(), 32);
//! assert_eq!(layout.offset_of(VertexAttributeSemantic::TexCoord(0)), Some(24));
//! ```

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeSemantic {
    /// Vertex position.
    Position,
    /// Vertex normal.
    Normal,
    /// Vertex tangent.
    Tangent,
    /// Vertex bitangent.
    Bitangent,
    /// Vertex color, by set index.
    Color(u8),
    /// Texture coordinates, by set index.
    TexCoord(u8),
    /// Bone indices for skinning.
    Joints,
    /// Bone weights for skinning.
    Weights,
    /// Application-defined data, identified by the caller.
    Custom(u32),
}

/// Data format of a vertex attribute.
///
/// Only used to derive attribute widths; the arena stores raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Single 8-bit unsigned integer.
    Uint8,
    /// Single 8-bit signed integer.
    Sint8,
    /// Single 16-bit unsigned integer.
    Uint16,
    /// Single 16-bit signed integer.
    Sint16,
    /// Single 16-bit float.
    Float16,
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit signed integer.
    Int,
    /// Four 32-bit signed integers.
    Int4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Four 32-bit unsigned integers.
    Uint4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
    /// Four 8-bit signed integers (normalized to -1.0-1.0).
    Snorm8x4,
    /// Four 16-bit unsigned integers (normalized to 0.0-1.0).
    Unorm16x4,
    /// Single 64-bit float.
    Double,
    /// Three 64-bit floats.
    Double3,
    /// Single 64-bit unsigned integer.
    Uint64,
    /// Column-major 4x4 matrix of 32-bit floats.
    Mat4,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Uint8 | Self::Sint8 => 1,
            Self::Uint16 | Self::Sint16 | Self::Float16 => 2,
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Unorm8x4 | Self::Snorm8x4 => 4,
            Self::Float2 | Self::Unorm16x4 | Self::Double | Self::Uint64 => 8,
            Self::Float3 => 12,
            Self::Float4 | Self::Int4 | Self::Uint4 => 16,
            Self::Double3 => 24,
            Self::Mat4 => 64,
        }
    }
}

/// A single vertex attribute: a semantic and its width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic meaning of this attribute.
    pub semantic: VertexAttributeSemantic,
    /// Width in bytes.
    pub width: u32,
}

impl VertexAttribute {
    /// Create an attribute with an arbitrary width.
    pub fn new(semantic: VertexAttributeSemantic, width: u32) -> Self {
        Self { semantic, width }
    }

    /// Create an attribute whose width is the size of `format`.
    pub fn from_format(semantic: VertexAttributeSemantic, format: VertexAttributeFormat) -> Self {
        Self::new(semantic, format.size())
    }
}

/// The ordered attribute list describing one vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    attributes: Vec<VertexAttribute>,
}

impl AttributeLayout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layout from an attribute list.
    pub fn from_attributes(attributes: impl Into<Vec<VertexAttribute>>) -> Self {
        Self {
            attributes: attributes.into(),
        }
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append an attribute sized by `format`.
    pub fn with(self, semantic: VertexAttributeSemantic, format: VertexAttributeFormat) -> Self {
        self.with_attribute(VertexAttribute::from_format(semantic, format))
    }

    /// The attributes in binding order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the layout has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> u64 {
        self.attributes.iter().map(|a| u64::from(a.width)).sum()
    }

    /// Byte offset of the first attribute with `semantic`.
    pub fn offset_of(&self, semantic: VertexAttributeSemantic) -> Option<u64> {
        let mut offset = 0;
        for attribute in &self.attributes {
            if attribute.semantic == semantic {
                return Some(offset);
            }
            offset += u64::from(attribute.width);
        }
        None
    }

    /// Check if this layout has a specific semantic.
    pub fn contains(&self, semantic: VertexAttributeSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }

    /// Position-only layout (12 bytes per vertex).
    pub fn position_only() -> Self {
        Self::new().with(
            VertexAttributeSemantic::Position,
            VertexAttributeFormat::Float3,
        )
    }

    /// Position + normal + texcoord layout (32 bytes per vertex).
    pub fn position_normal_uv() -> Self {
        Self::new()
            .with(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3)
            .with(VertexAttributeSemantic::Normal, VertexAttributeFormat::Float3)
            .with(VertexAttributeSemantic::TexCoord(0), VertexAttributeFormat::Float2)
    }
}

impl FromIterator<VertexAttribute> for AttributeLayout {
    fn from_iter<I: IntoIterator<Item = VertexAttribute>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format_sizes() {
        assert_eq!(VertexAttributeFormat::Uint8.size(), 1);
        assert_eq!(VertexAttributeFormat::Float16.size(), 2);
        assert_eq!(VertexAttributeFormat::Float3.size(), 12);
        assert_eq!(VertexAttributeFormat::Uint64.size(), 8);
        assert_eq!(VertexAttributeFormat::Double3.size(), 24);
        assert_eq!(VertexAttributeFormat::Mat4.size(), 64);
    }

    #[test]
    fn test_stride_and_offsets() {
        let layout = AttributeLayout::position_normal_uv();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.stride(), 32);
        assert_eq!(layout.offset_of(VertexAttributeSemantic::Position), Some(0));
        assert_eq!(layout.offset_of(VertexAttributeSemantic::Normal), Some(12));
        assert_eq!(
            layout.offset_of(VertexAttributeSemantic::TexCoord(0)),
            Some(24)
        );
        assert_eq!(layout.offset_of(VertexAttributeSemantic::TexCoord(1)), None);
        assert!(layout.contains(VertexAttributeSemantic::Normal));
        assert!(!layout.contains(VertexAttributeSemantic::Joints));
    }

    #[test]
    fn test_arbitrary_widths() {
        let layout = AttributeLayout::new()
            .with_attribute(VertexAttribute::new(VertexAttributeSemantic::Custom(7), 3))
            .with_attribute(VertexAttribute::new(VertexAttributeSemantic::Color(0), 1));
        assert_eq!(layout.stride(), 4);
    }

    #[test]
    fn test_empty_layout() {
        let layout = AttributeLayout::new();
        assert!(layout.is_empty());
        assert_eq!(layout.stride(), 0);
    }

    #[test]
    fn test_structural_equality() {
        let built = AttributeLayout::position_only();
        let collected: AttributeLayout = [VertexAttribute::new(
            VertexAttributeSemantic::Position,
            12,
        )]
        .into_iter()
        .collect();
        assert_eq!(built, collected);

        let mut set = HashSet::new();
        set.insert(built);
        assert!(set.contains(&collected));
    }

    #[test]
    fn test_order_is_significant() {
        let a = AttributeLayout::new()
            .with(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3)
            .with(VertexAttributeSemantic::Normal, VertexAttributeFormat::Float3);
        let b = AttributeLayout::new()
            .with(VertexAttributeSemantic::Normal, VertexAttributeFormat::Float3)
            .with(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3);
        assert_eq!(a.stride(), b.stride());
        assert_ne!(a, b);
    }
}
