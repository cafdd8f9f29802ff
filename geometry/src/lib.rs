//! # RedLilium Geometry
//!
//! GPU geometry storage for RedLilium. Many meshes that share a vertex layout
//! are packed into one vertex buffer and one index buffer so the renderer can
//! issue many draws from few bindings.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GeometryArena`] - Vertex/index buffer pair for one attribute layout
//! - [`StoreRegistry`] - One arena per [`AttributeLayout`], created on demand
//! - [`GeometryBatch`] - Bulk import through a single staging transfer
//! - [`GeometryDevice`] - Buffer creation, growth, copies and mapping
//! - Multiple backend support: Vulkan, wgpu, and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_geometry::{AttributeLayout, DeviceParameters, GeometryDevice, RegistryConfig, StoreRegistry};
//!
//! let device = GeometryDevice::new(&DeviceParameters::new())?;
//! let mut registry = StoreRegistry::new(device, RegistryConfig::new(4));
//!
//! let arena = registry.get_or_create(&AttributeLayout::position_only())?;
//! let offsets = arena.add_geometry(3, &vertex_bytes, 3, &index_bytes)?;
//!
//! // Bind arena.vertex_buffer() / arena.index_buffer() and draw at `offsets`.
//!
//! arena.remove_geometry(offsets.vertex, 3, offsets.index, 3)?;
//! ```

pub mod arena;
pub mod backend;
pub mod batch;
pub mod config;
pub mod device;
pub mod error;
pub mod layout;
pub mod profiling;
pub mod range;
pub mod registry;
pub mod resources;
pub mod staging;
pub mod types;

// Re-export main types for convenience
pub use arena::GeometryArena;
pub use backend::{DeviceError, DummyBackend, GpuBackend};
pub use batch::GeometryBatch;
pub use config::{ArenaConfig, BackendType, DeviceParameters, RegistryConfig};
pub use device::GeometryDevice;
pub use error::GeometryError;
pub use layout::{AttributeLayout, VertexAttribute, VertexAttributeFormat, VertexAttributeSemantic};
pub use range::{GeometryOffsets, GeometryRange};
pub use registry::StoreRegistry;
pub use resources::{Buffer, MappedBuffer};
pub use staging::{StagingBuffer, read_buffer};
pub use types::{
    BufferCopyRegion, BufferDescriptor, BufferKind, BufferUsage, MemoryProfile, ResizeMode,
};

/// Geometry library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the geometry subsystem.
///
/// Starts the Tracy client when the `profiling` feature is enabled. Safe to
/// call more than once.
pub fn init() {
    #[cfg(feature = "profiling")]
    tracy_client::Client::start();

    log::info!("RedLilium Geometry v{} initialized", VERSION);
}
