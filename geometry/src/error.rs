//! Geometry error types.

use crate::backend::DeviceError;
use crate::types::BufferKind;

/// Errors returned by arena, registry and batch operations.
///
/// Validation failures ([`Configuration`](Self::Configuration),
/// [`Bounds`](Self::Bounds), [`PayloadSize`](Self::PayloadSize),
/// [`Misaligned`](Self::Misaligned)) are detected before anything is touched,
/// so the arena is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The arena cannot be built with the given layout or index size.
    #[error("invalid arena configuration: {0}")]
    Configuration(String),
    /// A removal range reaches past the stream's element count.
    #[error("{stream} range of {count} elements at offset {offset} exceeds element count {available}")]
    Bounds {
        /// Stream the range was checked against.
        stream: BufferKind,
        /// First element of the range.
        offset: u64,
        /// Number of elements in the range.
        count: u64,
        /// Elements currently stored.
        available: u64,
    },
    /// A payload's byte length disagrees with its element count.
    #[error("{stream} payload is {actual} bytes, expected {expected}")]
    PayloadSize {
        /// Stream the payload was meant for.
        stream: BufferKind,
        /// `count * stride`.
        expected: u64,
        /// Bytes actually supplied.
        actual: u64,
    },
    /// A buffer's size is not a whole number of elements.
    #[error("{stream} payload of {size} bytes is not a multiple of the {stride}-byte stride")]
    Misaligned {
        /// Stream the buffer was meant for.
        stream: BufferKind,
        /// Buffer size in bytes.
        size: u64,
        /// Element stride in bytes.
        stride: u64,
    },
    /// The stream has no buffer to operate on.
    #[error("{0} stream has no buffer")]
    EmptyStream(BufferKind),
    /// The arena was terminated.
    #[error("arena has been terminated")]
    Terminated,
    /// The buffer memory subsystem failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeometryError::Bounds {
            stream: BufferKind::Vertex,
            offset: 4,
            count: 3,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "vertex range of 3 elements at offset 4 exceeds element count 5"
        );

        let err = GeometryError::Misaligned {
            stream: BufferKind::Index,
            size: 10,
            stride: 4,
        };
        assert_eq!(
            err.to_string(),
            "index payload of 10 bytes is not a multiple of the 4-byte stride"
        );
    }

    #[test]
    fn test_device_errors_pass_through() {
        let err = GeometryError::from(DeviceError::OutOfMemory);
        assert_eq!(err, GeometryError::Device(DeviceError::OutOfMemory));
        assert_eq!(err.to_string(), "out of GPU memory");
    }
}
