//! Arena registry.
//!
//! The [`StoreRegistry`] owns one [`GeometryArena`] per distinct
//! [`AttributeLayout`] and creates arenas lazily the first time a layout is
//! requested. Layouts are compared structurally, so independently built but
//! identical layouts share an arena.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::arena::GeometryArena;
use crate::config::RegistryConfig;
use crate::device::GeometryDevice;
use crate::error::GeometryError;
use crate::layout::AttributeLayout;

/// Map from attribute layout to the arena holding its geometry.
///
/// # Example
///
/// ```ignore
/// let mut registry = StoreRegistry::new(device, RegistryConfig::new(4));
///
/// let arena = registry.get_or_create(&AttributeLayout::position_normal_uv())?;
/// let offsets = arena.add_geometry(vertex_count, &vertices, index_count, &indices)?;
/// ```
pub struct StoreRegistry {
    device: Arc<GeometryDevice>,
    config: RegistryConfig,
    arenas: HashMap<AttributeLayout, GeometryArena>,
}

impl StoreRegistry {
    /// Create an empty registry.
    pub fn new(device: Arc<GeometryDevice>, config: RegistryConfig) -> Self {
        Self {
            device,
            config,
            arenas: HashMap::new(),
        }
    }

    /// Get the device new arenas allocate from.
    pub fn device(&self) -> &Arc<GeometryDevice> {
        &self.device
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the arena for `layout`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Fails the way [`GeometryArena::new`] fails; nothing is inserted then.
    pub fn get_or_create(
        &mut self,
        layout: &AttributeLayout,
    ) -> Result<&mut GeometryArena, GeometryError> {
        match self.arenas.entry(layout.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let arena = GeometryArena::new(
                    self.device.clone(),
                    layout.clone(),
                    self.config.index_size,
                    self.config.arena.clone(),
                )?;
                log::debug!(
                    "StoreRegistry: created arena for {}-attribute layout (stride={})",
                    layout.len(),
                    layout.stride()
                );
                Ok(entry.insert(arena))
            }
        }
    }

    pub fn get(&self, layout: &AttributeLayout) -> Option<&GeometryArena> {
        self.arenas.get(layout)
    }

    pub fn get_mut(&mut self, layout: &AttributeLayout) -> Option<&mut GeometryArena> {
        self.arenas.get_mut(layout)
    }

    pub fn contains(&self, layout: &AttributeLayout) -> bool {
        self.arenas.contains_key(layout)
    }

    /// Remove and terminate the arena for `layout`.
    ///
    /// Returns `false` if no arena existed.
    pub fn remove(&mut self, layout: &AttributeLayout) -> bool {
        match self.arenas.remove(layout) {
            Some(mut arena) => {
                arena.terminate();
                log::debug!("StoreRegistry: removed arena (stride={})", layout.stride());
                true
            }
            None => false,
        }
    }

    /// Number of arenas.
    pub fn len(&self) -> usize {
        self.arenas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }

    /// Iterate over all arenas with their layouts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeLayout, &GeometryArena)> {
        self.arenas.iter()
    }

    /// Terminate and drop every arena.
    pub fn terminate_all(&mut self) {
        let count = self.arenas.len();
        for arena in self.arenas.values_mut() {
            arena.terminate();
        }
        self.arenas.clear();
        log::debug!("StoreRegistry: terminated {} arenas", count);
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("backend", &self.device.backend_name())
            .field("index_size", &self.config.index_size)
            .field("arenas", &self.arenas.len())
            .finish()
    }
}
