//! Common types and descriptors for geometry buffers.
//!
//! This module contains the buffer kind and memory profile enums, usage
//! flags, and descriptor structs used throughout the crate.

mod buffer;

pub use buffer::{
    BufferCopyRegion, BufferDescriptor, BufferKind, BufferUsage, MemoryProfile, ResizeMode,
};
