//! Common utilities for geometry integration tests.
//!
//! This module provides shared test infrastructure that runs the same
//! scenarios against every backend.

use std::sync::Arc;

use redlilium_geometry::{
    ArenaConfig, AttributeLayout, BackendType, Buffer, DeviceParameters, GeometryArena,
    GeometryDevice, MemoryProfile, RegistryConfig, StoreRegistry, read_buffer,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (host memory only).
    Dummy,
    /// Vulkan backend (native via ash).
    Vulkan,
    /// wgpu backend on whatever native API it picks.
    Wgpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            #[cfg(feature = "vulkan-backend")]
            Backend::Vulkan => true,
            #[cfg(not(feature = "vulkan-backend"))]
            Backend::Vulkan => false,
            #[cfg(feature = "wgpu-backend")]
            Backend::Wgpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::Wgpu => false,
        }
    }

    /// Convert to DeviceParameters for creating a GeometryDevice.
    pub fn to_device_parameters(self) -> DeviceParameters {
        let backend = match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Vulkan => BackendType::Vulkan,
            Backend::Wgpu => BackendType::Wgpu,
        };
        DeviceParameters::new()
            .with_backend(backend)
            .with_validation(false)
            .with_label_prefix("test")
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context holding a device on one backend.
pub struct TestContext {
    /// The backend being tested.
    #[allow(dead_code)]
    pub backend: Backend,
    /// Device for creating arenas and buffers.
    pub device: Arc<GeometryDevice>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not compiled in or no suitable GPU
    /// is present.
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        redlilium_geometry::init();

        if !backend.is_available() {
            return None;
        }

        let device = GeometryDevice::new(&backend.to_device_parameters()).ok()?;
        Some(Self { backend, device })
    }

    /// Create an arena with device-only memory.
    #[allow(dead_code)]
    pub fn create_arena(&self, layout: AttributeLayout, index_size: u64) -> GeometryArena {
        GeometryArena::new(self.device.clone(), layout, index_size, ArenaConfig::new())
            .expect("Failed to create arena")
    }

    /// Create an arena whose buffers the host can map.
    #[allow(dead_code)]
    pub fn create_mappable_arena(&self, layout: AttributeLayout, index_size: u64) -> GeometryArena {
        GeometryArena::new(
            self.device.clone(),
            layout,
            index_size,
            ArenaConfig::new().with_profile(MemoryProfile::TransferFriendly),
        )
        .expect("Failed to create arena")
    }

    /// Create a registry with 4-byte indices.
    #[allow(dead_code)]
    pub fn create_registry(&self) -> StoreRegistry {
        StoreRegistry::new(self.device.clone(), RegistryConfig::new(4))
    }
}

// ============================================================================
// Data Helpers
// ============================================================================

/// Generate `count` elements of `stride` bytes with a recognizable pattern.
pub fn generate_pattern(count: u64, stride: u64, seed: u8) -> Vec<u8> {
    (0..count * stride)
        .map(|i| seed.wrapping_mul(31).wrapping_add(i as u8))
        .collect()
}

/// Read an optional buffer back to the host; `None` reads as empty.
pub fn read_back(buffer: Option<&Buffer>) -> Vec<u8> {
    buffer
        .map(|buffer| read_buffer(buffer).expect("Failed to read back buffer"))
        .unwrap_or_default()
}
