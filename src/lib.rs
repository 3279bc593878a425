//! In-world UI surfaces for 3D scenes.
//!
//! This crate renders retained UI content onto world-space geometry and
//! routes 3D interaction back into it. A [`Surface`] owns a backing texture
//! and decides each tick whether to redraw it; an [`InteractionRouter`]
//! traces the scene, maps ray hits through mesh UVs into surface-local
//! pixels, and synthesizes the pointer and keyboard events the UI engine
//! understands.
//!
//! # Features
//!
//! - **Render scheduling**: visibility, staleness, cadence and manual
//!   redraw gates, independently combinable per surface
//! - **Surface management**: lazy render-target allocation, in-place
//!   resizing, blend-mode-driven materials with redundant-write elision
//! - **Hit-testing**: ray hit → UV → local pixel → element bubble path
//! - **Input routing**: synthesized moves, clicks, wheel, keys and
//!   characters with hover-transition tracking
//! - **Versioned persistence**: saved surfaces upgrade across data
//!   versions on load
//!
//! # Example
//!
//! ```rust,no_run
//! use worldui::testing::{MemoryBackend, RecordingRouter, StaticScene, StubContent};
//! use worldui::{InteractionRouter, Surface, SurfaceManager, SurfaceSettings};
//!
//! let mut backend = MemoryBackend::new();
//! let mut surfaces = SurfaceManager::new();
//!
//! let mut surface = Surface::new(SurfaceSettings::default());
//! surface.on_register(&mut backend, Box::new(StubContent::default()));
//! let id = surfaces.insert(surface);
//!
//! let mut router = InteractionRouter::new();
//! let scene = StaticScene::miss();
//! let mut input = RecordingRouter::active();
//!
//! // In your frame loop:
//! surfaces.tick_all(0.0, 0.016, &mut backend);
//! router.tick(&scene, &mut surfaces, None, &mut input);
//! ```

pub mod config;
pub mod events;
pub mod host;
pub mod interaction;
pub mod manager;
pub mod mapper;
pub mod scheduler;
pub mod surface;
pub mod testing;

// Re-export commonly used types
pub use config::{SavedSurface, UpgradedSurface, SAVED_SURFACE_VERSION};
pub use events::{CharEvent, InputKey, KeyEvent, Modifiers, PointerEvent, PressedKeys};
pub use host::{
    ContentHost, HitPath, InputRouter, LegacyWidgetHost, LegacyWidgetId, MaterialInstance,
    PathEntry, Rect, RenderBackend, RenderTarget, SceneEntityId, SceneQuery, SurfaceRasterizer,
    TextureId, UiElement, WeakHitPath,
};
pub use interaction::{HoverChange, HoverFlags, InteractionRouter, InteractionSource};
pub use manager::{SurfaceId, SurfaceManager};
pub use mapper::{local_hit_location, HitTarget, RayHit};
pub use scheduler::{BaseMaterial, RedrawDecision, RenderScheduler};
pub use surface::{settings_diff, BlendMode, DirtyFlags, Surface, SurfaceSettings};

use anyhow::Result;

/// Version of the worldui crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the in-world UI system with default settings
pub fn init() -> Result<()> {
    tracing::info!("Initializing worldui v{}", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }
}
