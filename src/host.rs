//! Interfaces to the host engine's collaborators.
//!
//! The retained UI engine, the 3D scene, and the GPU resource system are
//! external to this crate; these traits pin down exactly what each seam
//! provides. [`crate::testing`] ships in-memory implementations for tests
//! and headless hosts.

use crate::events::{CharEvent, KeyEvent, PointerEvent};
use crate::mapper::RayHit;
use crate::scheduler::BaseMaterial;
use glam::{UVec2, Vec2, Vec3};
use std::rc::{Rc, Weak};

/// Handle identifying a legacy screen-space widget component in the host.
pub type LegacyWidgetId = u64;

/// Handle identifying an object in the host's 3D scene, used to exclude
/// the interactor's own geometry from hit-testing.
pub type SceneEntityId = u64;

/// Opaque identity of a GPU texture, used for material parameter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Axis-aligned rectangle in surface-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Top-left corner.
    pub min: Vec2,
    /// Bottom-right corner.
    pub max: Vec2,
}

impl Rect {
    /// Create a rectangle from corners.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create a rectangle from an origin and a size.
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    /// Width and height.
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Whether the point lies inside (min-inclusive, max-exclusive).
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// A retained UI element reachable through hit-testing.
///
/// Only the capabilities the router classifies on are exposed here; layout,
/// styling and painting stay inside the UI engine.
pub trait UiElement {
    /// Whether the element responds to pointer interaction.
    fn is_interactable(&self) -> bool;
    /// Whether the element can receive keyboard focus.
    fn supports_focus(&self) -> bool;
    /// Whether the element's visibility allows it to be hit-test.
    fn is_hit_test_visible(&self) -> bool;
    /// Whether the element is currently enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// One element on a bubble path with its arranged geometry.
#[derive(Clone)]
pub struct PathEntry {
    /// The element itself.
    pub element: Rc<dyn UiElement>,
    /// The element's arranged rectangle in surface-local coordinates.
    pub geometry: Rect,
}

/// Ordered root-to-leaf path of elements under a local point, tagged with
/// the current and previous pointer positions for velocity-aware gesture
/// recognition downstream.
#[derive(Clone, Default)]
pub struct HitPath {
    /// Elements from outermost to innermost.
    pub entries: Vec<PathEntry>,
    /// Current local hit location.
    pub current: Vec2,
    /// Local hit location of the previous tick.
    pub previous: Vec2,
}

impl HitPath {
    /// An empty path. Still routable: delivering an empty path lets the UI
    /// tree clear stale hover state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the path contains no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weak form of this path, safe to hold across ticks.
    pub fn downgrade(&self) -> WeakHitPath {
        WeakHitPath {
            entries: self
                .entries
                .iter()
                .map(|e| (Rc::downgrade(&e.element), e.geometry))
                .collect(),
            current: self.current,
            previous: self.previous,
        }
    }
}

/// A [`HitPath`] that does not keep its elements alive.
///
/// Hovered elements must never be kept alive solely by being hovered, so the
/// router stores the last resolved path in this form and upgrades it when an
/// input event needs delivering.
#[derive(Clone, Default)]
pub struct WeakHitPath {
    entries: Vec<(Weak<dyn UiElement>, Rect)>,
    current: Vec2,
    previous: Vec2,
}

impl WeakHitPath {
    /// An empty weak path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the path has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve back to a strong path, dropping elements that have died.
    pub fn upgrade(&self) -> HitPath {
        HitPath {
            entries: self
                .entries
                .iter()
                .filter_map(|(weak, geometry)| {
                    weak.upgrade().map(|element| PathEntry {
                        element,
                        geometry: *geometry,
                    })
                })
                .collect(),
            current: self.current,
            previous: self.previous,
        }
    }
}

/// Ray queries against the 3D scene.
pub trait SceneQuery {
    /// Trace a ray and report the closest blocking hit, if any. Entities in
    /// `ignore` never block the trace.
    fn ray_query(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[SceneEntityId],
    ) -> Option<RayHit>;
    /// World-space ray under the OS cursor, when a cursor exists.
    fn cursor_ray(&self) -> Option<(Vec3, Vec3)>;
    /// World-space ray through the viewport center.
    fn center_ray(&self) -> Option<(Vec3, Vec3)>;
}

/// The retained UI engine's application-level event router.
pub trait InputRouter {
    /// Whether a pointer/keyboard session is active. Every input operation
    /// is a neutral no-op until this returns true.
    fn is_session_active(&self) -> bool;
    /// Deliver a pointer move along the path. An empty path must still be
    /// delivered so the tree can clear stale hover state.
    fn route_pointer_move(&mut self, path: &HitPath, event: &PointerEvent);
    /// Deliver a pointer press. Returns whether anything handled it.
    fn route_pointer_down(&mut self, path: &HitPath, event: &PointerEvent) -> bool;
    /// Deliver a pointer release. Returns whether anything handled it.
    fn route_pointer_up(&mut self, path: &HitPath, event: &PointerEvent) -> bool;
    /// Deliver a wheel event along the path.
    fn route_wheel(&mut self, path: &HitPath, event: &PointerEvent) -> bool;
    /// Process a key press through the focus system.
    fn process_key_down(&mut self, event: &KeyEvent) -> bool;
    /// Process a key release through the focus system.
    fn process_key_up(&mut self, event: &KeyEvent) -> bool;
    /// Process a character entry through the focus system.
    fn process_char(&mut self, event: &CharEvent) -> bool;
}

/// Per-surface retained content: the layout window plus the spatial
/// hit-test index scoped to one surface.
pub trait ContentHost {
    /// Swap the content root. `None` clears the surface.
    fn set_root(&mut self, root: Option<Rc<dyn UiElement>>);
    /// Run the layout pre-pass and report the content's desired size.
    fn desired_size(&mut self, scale: f32) -> Vec2;
    /// Recreate the layout at the given size.
    fn rebuild_layout(&mut self, size: Vec2);
    /// Whether the content window may take keyboard focus.
    fn set_focusable(&mut self, focusable: bool);
    /// Ordered root-to-leaf interactive elements under the local point.
    fn bubble_path(&self, local: Vec2, radius: f32, ignore_disabled: bool) -> Vec<PathEntry>;
}

/// GPU render target handle.
///
/// The backing memory belongs to the backend and is reference-counted
/// there: dropping this handle stops further submissions but the texture
/// survives until any in-flight consumer releases it.
pub trait RenderTarget {
    /// Identity of the underlying texture, for material binding.
    fn texture_id(&self) -> TextureId;
    /// Current pixel dimensions.
    fn size(&self) -> UVec2;
    /// Resize in place. Contents become undefined until the next draw.
    fn resize(&mut self, size: UVec2);
    /// Color the target is cleared to before each draw.
    fn clear_color(&self) -> [f32; 4];
    /// Change the clear color.
    fn set_clear_color(&mut self, color: [f32; 4]);
}

/// Dynamic material instance bound to a surface's backing texture.
///
/// Getters exist so callers can skip redundant writes; a parameter write
/// invalidates GPU state even when the value is unchanged.
pub trait MaterialInstance {
    /// Base material variant this instance was created from.
    fn base(&self) -> BaseMaterial;
    /// Read a texture parameter.
    fn texture_parameter(&self, name: &str) -> Option<TextureId>;
    /// Write a texture parameter.
    fn set_texture_parameter(&mut self, name: &str, value: TextureId);
    /// Read a vector parameter.
    fn vector_parameter(&self, name: &str) -> Option<[f32; 4]>;
    /// Write a vector parameter.
    fn set_vector_parameter(&mut self, name: &str, value: [f32; 4]);
    /// Read a scalar parameter.
    fn scalar_parameter(&self, name: &str) -> Option<f32>;
    /// Write a scalar parameter.
    fn set_scalar_parameter(&mut self, name: &str, value: f32);
}

/// Rasterizes retained content into a render target.
///
/// Submission is fire-and-forget with respect to GPU completion; the
/// texture is only guaranteed populated at a later engine-managed sync
/// point. Successive draws to the same target complete in FIFO order, so a
/// surface never displays a frame older than its most recent submission.
pub trait SurfaceRasterizer {
    /// Whether the draw should run its own layout pre-pass. Disabled when
    /// the caller already laid the content out at the draw size.
    fn set_prepass_needed(&mut self, needed: bool);
    /// Submit one rasterization of `content` into `target`.
    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        content: &mut dyn ContentHost,
        scale: f32,
        size: UVec2,
        delta_time: f32,
    );
}

/// The GPU resource system.
pub trait RenderBackend {
    /// True when running with a null rendering backend (dedicated server);
    /// every GPU-dependent operation becomes a safe no-op.
    fn is_null(&self) -> bool;
    /// Acquire a rasterizer handle for one surface.
    fn create_rasterizer(&mut self) -> Box<dyn SurfaceRasterizer>;
    /// Allocate a render target.
    fn create_render_target(&mut self, size: UVec2, clear_color: [f32; 4])
        -> Box<dyn RenderTarget>;
    /// Instantiate a dynamic material from a base variant.
    fn create_material(&mut self, base: BaseMaterial) -> Box<dyn MaterialInstance>;
}

/// Legacy screen-space widget components that remain hit-testable in the
/// scene alongside mesh surfaces. Owned entirely by the host; the router
/// only records hover identity and forwards redraw requests.
pub trait LegacyWidgetHost {
    /// Local hit location on the legacy widget, if one resolves.
    fn local_hit(&mut self, id: LegacyWidgetId, hit: &RayHit) -> Option<Vec2>;
    /// Bubble path on the legacy widget for the given hit.
    fn hit_path(&mut self, id: LegacyWidgetId, hit: &RayHit, previous: Vec2) -> HitPath;
    /// Ask the legacy widget to schedule a redraw.
    fn request_redraw(&mut self, id: LegacyWidgetId);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;
    impl UiElement for Leaf {
        fn is_interactable(&self) -> bool {
            true
        }
        fn supports_focus(&self) -> bool {
            false
        }
        fn is_hit_test_visible(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_rect_contains() {
        let rect = Rect::from_origin_size(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
        assert!(rect.contains(Vec2::new(10.0, 10.0)));
        assert!(rect.contains(Vec2::new(29.9, 29.9)));
        assert!(!rect.contains(Vec2::new(30.0, 30.0)));
        assert!(!rect.contains(Vec2::new(5.0, 15.0)));
    }

    #[test]
    fn test_weak_path_drops_dead_elements() {
        let keep: Rc<dyn UiElement> = Rc::new(Leaf);
        let drop_me: Rc<dyn UiElement> = Rc::new(Leaf);
        let geometry = Rect::from_origin_size(Vec2::ZERO, Vec2::ONE);
        let path = HitPath {
            entries: vec![
                PathEntry {
                    element: keep.clone(),
                    geometry,
                },
                PathEntry {
                    element: drop_me.clone(),
                    geometry,
                },
            ],
            current: Vec2::ZERO,
            previous: Vec2::ZERO,
        };

        let weak = path.downgrade();
        assert_eq!(weak.len(), 2);

        drop(path);
        drop(drop_me);

        let upgraded = weak.upgrade();
        assert_eq!(upgraded.entries.len(), 1);
        assert!(Rc::ptr_eq(&upgraded.entries[0].element, &keep));
    }
}
