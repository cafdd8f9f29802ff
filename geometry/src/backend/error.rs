//! Backend error types.

/// Errors reported by the buffer memory subsystem.
///
/// Arena operations never retry on these; they are handed back to the caller
/// unchanged inside [`GeometryError::Device`](crate::GeometryError::Device).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Failed to initialize the backend.
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// Invalid parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The buffer's memory cannot be accessed from the host.
    #[error("buffer memory is not host-visible")]
    NotHostVisible,
    /// The buffer is already mapped.
    #[error("buffer is already mapped")]
    AlreadyMapped,
    /// A device-side copy failed to complete.
    #[error("buffer copy failed: {0}")]
    CopyFailed(String),
    /// A buffer created by one backend was handed to another.
    #[error("buffer belongs to a different backend than {0}")]
    BackendMismatch(&'static str),
    /// Internal backend error.
    #[error("internal backend error: {0}")]
    Internal(String),
}
