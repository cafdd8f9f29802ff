//! Device, arena and registry configuration.
//!
//! All configuration types are plain values with builder-style setters:
//!
//! ```ignore
//! let params = DeviceParameters::new()
//!     .with_backend(BackendType::Vulkan)
//!     .with_validation(true);
//! let device = GeometryDevice::new(&params)?;
//!
//! let registry = StoreRegistry::new(
//!     device,
//!     RegistryConfig::new(4).with_arena(ArenaConfig::new().with_profile(MemoryProfile::DeviceOnly)),
//! );
//! ```

use crate::types::MemoryProfile;

/// Which GPU backend a [`GeometryDevice`](crate::GeometryDevice) should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Try Vulkan, then wgpu, then fall back to the dummy backend.
    #[default]
    Auto,
    /// Host-memory backend without GPU access.
    Dummy,
    /// Native Vulkan through ash and gpu-allocator.
    Vulkan,
    /// wgpu on whatever native API it selects.
    Wgpu,
}

impl BackendType {
    /// Parse a backend name as accepted on command lines and in environment
    /// variables. Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "dummy" => Some(Self::Dummy),
            "vulkan" => Some(Self::Vulkan),
            "wgpu" | "webgpu" => Some(Self::Wgpu),
            _ => None,
        }
    }
}

/// Default per-buffer size limit (4 GiB).
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 1 << 32;

/// Parameters for creating a [`GeometryDevice`](crate::GeometryDevice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Backend selection.
    pub backend: BackendType,
    /// Enable Vulkan validation layers when available.
    pub validation: bool,
    /// Prefix for buffer debug labels.
    pub label_prefix: String,
    /// Largest buffer the device will create, in bytes.
    pub max_buffer_size: u64,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            validation: cfg!(debug_assertions),
            label_prefix: "geometry".to_string(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

impl DeviceParameters {
    /// Create parameters with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend type.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the prefix used for buffer debug labels.
    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = prefix.into();
        self
    }

    /// Set the largest buffer the device will create.
    pub fn with_max_buffer_size(mut self, size: u64) -> Self {
        self.max_buffer_size = size;
        self
    }
}

/// Per-arena settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArenaConfig {
    /// Memory placement of the arena's vertex and index buffers.
    pub profile: MemoryProfile,
    /// Debug label attached to the arena's buffers.
    pub label: Option<String>,
}

impl ArenaConfig {
    /// Create a config with the automatic memory profile and no label.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory profile.
    pub fn with_profile(mut self, profile: MemoryProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Settings shared by every arena a [`StoreRegistry`](crate::StoreRegistry) creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Size of one index in bytes.
    pub index_size: u64,
    /// Config applied to each new arena.
    pub arena: ArenaConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(4)
    }
}

impl RegistryConfig {
    /// Create a config with the given index size.
    pub fn new(index_size: u64) -> Self {
        Self {
            index_size,
            arena: ArenaConfig::default(),
        }
    }

    /// Set the config used for new arenas.
    pub fn with_arena(mut self, arena: ArenaConfig) -> Self {
        self.arena = arena;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_name() {
        assert_eq!(BackendType::from_name("Vulkan"), Some(BackendType::Vulkan));
        assert_eq!(BackendType::from_name("webgpu"), Some(BackendType::Wgpu));
        assert_eq!(BackendType::from_name("DUMMY"), Some(BackendType::Dummy));
        assert_eq!(BackendType::from_name("metal"), None);
    }

    #[test]
    fn test_device_parameters_builder() {
        let params = DeviceParameters::new()
            .with_backend(BackendType::Dummy)
            .with_validation(false)
            .with_label_prefix("meshes")
            .with_max_buffer_size(1024);
        assert_eq!(params.backend, BackendType::Dummy);
        assert_eq!(params.max_buffer_size, 1024);
        assert!(!params.validation);
        assert_eq!(params.label_prefix, "meshes");
    }

    #[test]
    fn test_registry_config_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.index_size, 4);
        assert_eq!(config.arena.profile, MemoryProfile::Automatic);
        assert!(config.arena.label.is_none());

        let config = RegistryConfig::new(2)
            .with_arena(ArenaConfig::new().with_profile(MemoryProfile::CpuOnly).with_label("ui"));
        assert_eq!(config.index_size, 2);
        assert_eq!(config.arena.profile, MemoryProfile::CpuOnly);
        assert_eq!(config.arena.label.as_deref(), Some("ui"));
    }
}
