//! Registry of live surfaces, addressable by id.
//!
//! Hover state and other cross-tick references hold [`SurfaceId`]s rather
//! than the surfaces themselves, so being hovered never keeps a surface
//! alive; a stale id simply fails the lookup.

use crate::host::RenderBackend;
use crate::surface::Surface;
use std::collections::HashMap;

/// Handle to a registered surface.
pub type SurfaceId = u64;

/// Owns every registered surface and hands out ids.
#[derive(Default)]
pub struct SurfaceManager {
    surfaces: HashMap<SurfaceId, Surface>,
    next_id: SurfaceId,
}

impl SurfaceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a surface and return its id.
    pub fn insert(&mut self, surface: Surface) -> SurfaceId {
        let id = self.next_id;
        self.next_id += 1;
        self.surfaces.insert(id, surface);
        id
    }

    /// Unregister a surface, releasing its resources.
    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        let mut surface = self.surfaces.remove(&id)?;
        surface.release_resources();
        Some(surface)
    }

    /// Look up a surface.
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Look up a surface mutably.
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    /// Request a redraw on a surface, if it still exists.
    pub fn request_redraw(&mut self, id: SurfaceId) {
        if let Some(surface) = self.surfaces.get_mut(&id) {
            surface.request_redraw();
        }
    }

    /// Tick every registered surface.
    pub fn tick_all(&mut self, now: f32, delta_time: f32, backend: &mut dyn RenderBackend) {
        for surface in self.surfaces.values_mut() {
            surface.tick(now, delta_time, backend);
        }
    }

    /// Number of registered surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether no surfaces are registered.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceSettings;

    #[test]
    fn test_insert_assigns_unique_ids() {
        let mut manager = SurfaceManager::new();
        let a = manager.insert(Surface::new(SurfaceSettings::default()));
        let b = manager.insert(Surface::new(SurfaceSettings::default()));
        assert_ne!(a, b);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_remove_releases_and_invalidates_lookups() {
        let mut manager = SurfaceManager::new();
        let id = manager.insert(Surface::new(SurfaceSettings::default()));
        let removed = manager.remove(id).expect("surface existed");
        assert!(!removed.is_registered());
        assert!(manager.get(id).is_none());
        // Stale ids are harmless.
        manager.request_redraw(id);
    }
}
