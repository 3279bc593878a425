//! The addressable 3D UI surface entity.
//!
//! A [`Surface`] aggregates the render scheduler, the retained content
//! binding, and the GPU-backed resources, and exposes the lifecycle hooks
//! the host engine drives: register, tick, release.

use crate::host::{
    ContentHost, HitPath, MaterialInstance, RenderBackend, RenderTarget, SurfaceRasterizer,
    UiElement,
};
use crate::mapper::{local_hit_location, RayHit};
use crate::scheduler::{BaseMaterial, RedrawDecision, RenderScheduler};
use bitflags::bitflags;
use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};

/// How a surface's pixels blend into the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Fully opaque.
    Opaque,
    /// Alpha-masked: pixels are either fully opaque or discarded.
    #[default]
    Masked,
    /// Alpha-blended translucency.
    Transparent,
}

bitflags! {
    /// Derived state invalidated by configuration mutators, resolved at the
    /// next render pass (or consumed by the host for proxy/collision
    /// rebuilds).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        /// The scene proxy must be rebuilt.
        const RENDER_STATE = 1 << 0;
        /// Collision geometry must be recreated.
        const PHYSICS_STATE = 1 << 1;
        /// The material instance must be recreated from a new base variant.
        const MATERIAL_BASE = 1 << 2;
        /// Material parameter values must be re-synced.
        const MATERIAL_PARAMS = 1 << 3;
    }
}

/// Configuration of one surface. All fields are plain data; behavior lives
/// on [`Surface`] and [`RenderScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSettings {
    /// Backing texture size in pixels. A zero component suppresses all
    /// rendering and hit-testing.
    pub draw_size: UVec2,
    /// Normalized anchor the surface is placed about, in [0,1]^2.
    pub pivot: Vec2,
    /// Blend mode, which also dictates the clear-color alpha policy.
    pub blend_mode: BlendMode,
    /// Whether the surface renders from both sides.
    pub two_sided: bool,
    /// Background color the backing texture clears to.
    pub background_color: [f32; 4],
    /// Tint color and opacity applied in the material.
    pub tint_color_and_opacity: [f32; 4],
    /// How much the texture's alpha contributes to final opacity (0..=1).
    pub texture_alpha_weight: f32,
    /// Lens-distortion weight applied in the material.
    pub distortion_weight: f32,
    /// Only redraw when explicitly requested.
    pub manually_redraw: bool,
    /// Minimum time between redraws. Zero redraws every eligible tick.
    pub min_redraw_interval: f32,
    /// Keep redrawing while the surface is not on screen.
    pub tick_when_offscreen: bool,
    /// Size the backing texture to the content's desired size each draw.
    pub draw_at_desired_size: bool,
    /// Whether the content window may take keyboard focus.
    pub window_focusable: bool,
    /// Euler rotation in degrees; carried for the versioned orientation
    /// upgrade of old saved data.
    pub rotation: Vec3,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            draw_size: UVec2::new(500, 500),
            pivot: Vec2::new(0.5, 0.5),
            blend_mode: BlendMode::Masked,
            two_sided: false,
            background_color: [0.0, 0.0, 0.0, 0.0],
            tint_color_and_opacity: [1.0, 1.0, 1.0, 1.0],
            texture_alpha_weight: 1.0,
            distortion_weight: 0.0,
            manually_redraw: false,
            min_redraw_interval: 0.0,
            tick_when_offscreen: false,
            draw_at_desired_size: false,
            window_focusable: true,
            rotation: Vec3::ZERO,
        }
    }
}

/// Dirty flags produced by a configuration change from `old` to `new`.
///
/// This is the explicit replacement for editor property-change
/// notifications: hosts diff the whole settings struct instead of wiring a
/// callback per property.
pub fn settings_diff(old: &SurfaceSettings, new: &SurfaceSettings) -> DirtyFlags {
    let mut dirty = DirtyFlags::empty();
    if old.draw_size != new.draw_size || old.pivot != new.pivot {
        dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::PHYSICS_STATE;
    }
    if old.blend_mode != new.blend_mode || old.two_sided != new.two_sided {
        dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::MATERIAL_BASE;
    }
    if old.background_color != new.background_color
        || old.distortion_weight != new.distortion_weight
    {
        dirty |= DirtyFlags::RENDER_STATE;
    }
    if old.tint_color_and_opacity != new.tint_color_and_opacity
        || old.texture_alpha_weight != new.texture_alpha_weight
    {
        dirty |= DirtyFlags::MATERIAL_PARAMS;
    }
    dirty
}

/// An interactive UI surface rendered onto 3D geometry.
pub struct Surface {
    settings: SurfaceSettings,
    scheduler: RenderScheduler,
    rasterizer: Option<Box<dyn SurfaceRasterizer>>,
    content: Option<Box<dyn ContentHost>>,
    render_target: Option<Box<dyn RenderTarget>>,
    material: Option<Box<dyn MaterialInstance>>,
    /// Root the host asked us to display.
    source_root: Option<Rc<dyn UiElement>>,
    /// Root the content window currently displays.
    bound_root: Option<Weak<dyn UiElement>>,
    last_local_hit: Vec2,
    last_visible_time: f32,
    dirty: DirtyFlags,
    legacy_rotation: bool,
    registered: bool,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(SurfaceSettings::default())
    }
}

impl Surface {
    /// Create an unregistered surface with the given settings.
    pub fn new(settings: SurfaceSettings) -> Self {
        Self {
            settings,
            scheduler: RenderScheduler::new(),
            rasterizer: None,
            content: None,
            render_target: None,
            material: None,
            source_root: None,
            bound_root: None,
            last_local_hit: Vec2::ZERO,
            last_visible_time: 0.0,
            dirty: DirtyFlags::empty(),
            legacy_rotation: false,
            registered: false,
        }
    }

    /// Create a surface from upgraded saved data.
    pub fn from_saved(saved: &crate::config::SavedSurface) -> Self {
        let upgraded = saved.upgrade();
        let mut surface = Self::new(upgraded.settings);
        surface.legacy_rotation = upgraded.legacy_rotation;
        surface
    }

    /// Registration hook: acquire a rasterizer handle and bind the content
    /// window. Safe no-op GPU-wise on a null backend.
    pub fn on_register(&mut self, backend: &mut dyn RenderBackend, content: Box<dyn ContentHost>) {
        if self.rasterizer.is_none() && !backend.is_null() {
            self.rasterizer = Some(backend.create_rasterizer());
        }
        let mut content = content;
        content.set_focusable(self.settings.window_focusable);
        self.content = Some(content);
        self.registered = true;
        self.update_content();
        tracing::debug!(draw_size = ?self.settings.draw_size, "surface registered");
    }

    /// Release rasterizer, content binding, and GPU resources, in that
    /// order. Idempotent: safe to call twice.
    pub fn release_resources(&mut self) {
        self.rasterizer = None;
        self.source_root = None;
        self.bound_root = None;
        self.content = None;
        self.render_target = None;
        self.material = None;
        self.registered = false;
    }

    /// Set the content root displayed by this surface. `None` clears it.
    pub fn set_content(&mut self, root: Option<Rc<dyn UiElement>>) {
        self.source_root = root;
        self.update_content();
    }

    /// Rebind the content window when the source root changed identity, and
    /// keep the layout sized to the draw size.
    fn update_content(&mut self) {
        let Some(content) = self.content.as_mut() else {
            return;
        };
        content.rebuild_layout(self.settings.draw_size.as_vec2());

        let same = match (&self.source_root, &self.bound_root) {
            (Some(new), Some(bound)) => bound
                .upgrade()
                .is_some_and(|bound| Rc::ptr_eq(&bound, new)),
            (None, None) => true,
            _ => false,
        };
        if !same {
            content.set_root(self.source_root.clone());
            self.bound_root = self.source_root.as_ref().map(Rc::downgrade);
        }
    }

    /// Per-tick hook: refresh the content binding, evaluate the redraw
    /// decision, and render when accepted.
    pub fn tick(&mut self, now: f32, delta_time: f32, backend: &mut dyn RenderBackend) {
        if !self.registered {
            return;
        }
        self.update_content();
        if self.source_root.is_none() {
            return;
        }
        // Without GPU resources nothing can draw, and evaluating anyway
        // would consume a pending manual-redraw request that a live backend
        // could still honor later.
        if backend.is_null() || self.rasterizer.is_none() {
            return;
        }

        // A changed base variant invalidates the material instance.
        if self.dirty.contains(DirtyFlags::MATERIAL_BASE) {
            self.dirty.remove(DirtyFlags::MATERIAL_BASE);
            if self.material.take().is_some() {
                self.dirty |= DirtyFlags::MATERIAL_PARAMS;
            }
        }

        let decision = self.scheduler.evaluate(&self.settings, now, self.last_visible_time);
        if decision.is_draw() {
            self.draw(now, delta_time, backend);
        }
    }

    fn draw(&mut self, now: f32, delta_time: f32, backend: &mut dyn RenderBackend) {
        let (Some(content), Some(rasterizer)) = (self.content.as_deref_mut(), self.rasterizer.as_deref_mut())
        else {
            return;
        };

        if self.material.is_none() {
            let base = BaseMaterial::resolve(self.settings.blend_mode, self.settings.two_sided);
            self.material = Some(backend.create_material(base));
            self.dirty |= DirtyFlags::MATERIAL_PARAMS;
        }

        let outcome = self.scheduler.render(
            &mut self.settings,
            content,
            rasterizer,
            backend,
            &mut self.render_target,
            &mut self.material,
            now,
            delta_time,
        );
        if outcome.size_changed {
            self.dirty |= DirtyFlags::PHYSICS_STATE;
        }

        if let Some(material) = self.material.as_deref_mut() {
            self.scheduler.sync_material_parameters(
                &self.settings,
                self.render_target.as_deref(),
                material,
            );
        }
        self.dirty.remove(DirtyFlags::MATERIAL_PARAMS);
    }

    /// Bubble path of interactive elements under a ray hit, tagged with the
    /// current and previous local points.
    ///
    /// `None` when no valid local hit exists: missing UV channel, zero draw
    /// size, or no bound content. A `Some` with no entries means the local
    /// point resolved but nothing interactive lies under it.
    pub fn hit_widget_path(
        &mut self,
        hit: &RayHit,
        radius: f32,
        ignore_disabled: bool,
    ) -> Option<HitPath> {
        if self.settings.draw_size.x == 0 || self.settings.draw_size.y == 0 {
            return None;
        }
        let content = self.content.as_deref()?;
        let local = local_hit_location(hit, self.settings.draw_size)?;

        let previous = self.last_local_hit;
        self.last_local_hit = local;

        Some(HitPath {
            entries: content.bubble_path(local, radius, ignore_disabled),
            current: local,
            previous,
        })
    }

    /// Local hit location for a ray hit, without touching hover state.
    pub fn local_hit(&self, hit: &RayHit) -> Option<Vec2> {
        local_hit_location(hit, self.settings.draw_size)
    }

    // --- configuration mutators; each marks dirty state rather than
    // recomputing eagerly ---

    /// Set the draw size in pixels.
    pub fn set_draw_size(&mut self, size: UVec2) {
        if size != self.settings.draw_size {
            self.settings.draw_size = size;
            self.dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::PHYSICS_STATE;
        }
    }

    /// Set the normalized pivot.
    pub fn set_pivot(&mut self, pivot: Vec2) {
        if pivot != self.settings.pivot {
            self.settings.pivot = pivot;
            self.dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::PHYSICS_STATE;
        }
    }

    /// Set the blend mode.
    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if blend_mode != self.settings.blend_mode {
            self.settings.blend_mode = blend_mode;
            self.dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::MATERIAL_BASE;
        }
    }

    /// Set whether the surface is visible from behind.
    pub fn set_two_sided(&mut self, two_sided: bool) {
        if two_sided != self.settings.two_sided {
            self.settings.two_sided = two_sided;
            self.dirty |= DirtyFlags::RENDER_STATE | DirtyFlags::MATERIAL_BASE;
        }
    }

    /// Set the background color.
    pub fn set_background_color(&mut self, color: [f32; 4]) {
        if color != self.settings.background_color {
            self.settings.background_color = color;
            self.dirty |= DirtyFlags::RENDER_STATE;
        }
    }

    /// Set tint color and opacity.
    pub fn set_tint_color_and_opacity(&mut self, color: [f32; 4]) {
        if color != self.settings.tint_color_and_opacity {
            self.settings.tint_color_and_opacity = color;
            self.dirty |= DirtyFlags::MATERIAL_PARAMS;
        }
    }

    /// Set the texture-alpha-to-opacity weight.
    pub fn set_texture_alpha_weight(&mut self, weight: f32) {
        if weight != self.settings.texture_alpha_weight {
            self.settings.texture_alpha_weight = weight;
            self.dirty |= DirtyFlags::MATERIAL_PARAMS;
        }
    }

    /// Set the lens-distortion weight.
    pub fn set_distortion_weight(&mut self, weight: f32) {
        if weight != self.settings.distortion_weight {
            self.settings.distortion_weight = weight;
            self.dirty |= DirtyFlags::RENDER_STATE;
        }
    }

    /// Replace the whole configuration, accumulating the dirty flags the
    /// diff produces.
    pub fn apply_settings(&mut self, new: SurfaceSettings) {
        self.dirty |= settings_diff(&self.settings, &new);
        self.settings = new;
    }

    /// Request a redraw; consumed by the next accepted draw.
    pub fn request_redraw(&mut self) {
        self.scheduler.request_redraw();
    }

    /// Record that the surface was rendered on screen at `now`.
    pub fn mark_visible(&mut self, now: f32) {
        self.scheduler.set_visible(true);
        self.last_visible_time = now;
    }

    /// Record whether the surface is currently visible.
    pub fn set_visible(&mut self, visible: bool) {
        self.scheduler.set_visible(visible);
    }

    /// Forget render history after the host rebuilt the scene proxy, so the
    /// next evaluation draws unconditionally.
    pub fn mark_proxy_recreated(&mut self) {
        self.scheduler.mark_proxy_recreated();
    }

    // --- accessors ---

    /// Current configuration.
    pub fn settings(&self) -> &SurfaceSettings {
        &self.settings
    }

    /// Current draw size in pixels.
    pub fn draw_size(&self) -> UVec2 {
        self.settings.draw_size
    }

    /// The backing render target, once created.
    pub fn render_target(&self) -> Option<&dyn RenderTarget> {
        self.render_target.as_deref()
    }

    /// The bound material instance, once created.
    pub fn material(&self) -> Option<&dyn MaterialInstance> {
        self.material.as_deref()
    }

    /// Base material variant the current configuration resolves to.
    pub fn base_material(&self) -> BaseMaterial {
        BaseMaterial::resolve(self.settings.blend_mode, self.settings.two_sided)
    }

    /// The last local location that was hit.
    pub fn last_local_hit(&self) -> Vec2 {
        self.last_local_hit
    }

    /// Whether this surface was loaded from data predating the orientation
    /// fix with an explicit all-zero rotation.
    pub fn uses_legacy_rotation(&self) -> bool {
        self.legacy_rotation
    }

    /// Dirty flags accumulated since the last [`Surface::take_dirty`].
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Take and clear the dirty flags the host resolves itself
    /// (proxy and collision rebuilds).
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.dirty)
    }

    /// Whether the surface is currently registered.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Redraw decision the scheduler would make now; exposed for hosts that
    /// drive rendering themselves.
    pub fn evaluate_redraw(&mut self, now: f32) -> RedrawDecision {
        self.scheduler
            .evaluate(&self.settings, now, self.last_visible_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::HitTarget;
    use crate::testing::{MemoryBackend, StubContent, StubElement};
    use glam::Vec3;

    fn surface_hit(uv: Option<Vec2>) -> RayHit {
        RayHit {
            target: HitTarget::Surface(1),
            impact_point: Vec3::ZERO,
            distance: 1.0,
            uv,
            face_index: None,
            trace_start: Vec3::ZERO,
            trace_end: Vec3::ONE,
        }
    }

    fn registered_surface(settings: SurfaceSettings, backend: &mut MemoryBackend) -> Surface {
        let mut surface = Surface::new(settings);
        surface.on_register(backend, Box::new(StubContent::default()));
        surface.set_content(Some(StubElement::interactable()));
        surface
    }

    #[test]
    fn test_settings_diff_maps_properties_to_flags() {
        let old = SurfaceSettings::default();

        let mut new = old.clone();
        new.draw_size = UVec2::new(64, 64);
        assert_eq!(
            settings_diff(&old, &new),
            DirtyFlags::RENDER_STATE | DirtyFlags::PHYSICS_STATE
        );

        let mut new = old.clone();
        new.blend_mode = BlendMode::Opaque;
        assert_eq!(
            settings_diff(&old, &new),
            DirtyFlags::RENDER_STATE | DirtyFlags::MATERIAL_BASE
        );

        let mut new = old.clone();
        new.tint_color_and_opacity = [1.0, 0.0, 0.0, 1.0];
        assert_eq!(settings_diff(&old, &new), DirtyFlags::MATERIAL_PARAMS);

        assert_eq!(settings_diff(&old, &old.clone()), DirtyFlags::empty());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut backend = MemoryBackend::new();
        let mut surface = registered_surface(SurfaceSettings::default(), &mut backend);
        surface.mark_visible(0.0);
        surface.tick(0.0, 0.016, &mut backend);
        assert!(surface.render_target().is_some());

        surface.release_resources();
        assert!(surface.render_target().is_none());
        assert!(!surface.is_registered());

        // Second release and post-release ticks are safe no-ops.
        surface.release_resources();
        surface.tick(1.0, 0.016, &mut backend);
        assert_eq!(backend.log().borrow().draws.len(), 1);
    }

    #[test]
    fn test_tick_draws_and_binds_material() {
        let mut backend = MemoryBackend::new();
        let mut surface = registered_surface(SurfaceSettings::default(), &mut backend);
        surface.mark_visible(0.0);
        surface.tick(0.0, 0.016, &mut backend);

        assert_eq!(backend.log().borrow().draws.len(), 1);
        let material = surface.material().expect("material created on first draw");
        let texture = surface.render_target().unwrap().texture_id();
        assert_eq!(
            material.texture_parameter(crate::scheduler::PARAM_UI_TEXTURE),
            Some(texture)
        );
    }

    #[test]
    fn test_no_content_root_suppresses_draw() {
        let mut backend = MemoryBackend::new();
        let mut surface = Surface::new(SurfaceSettings::default());
        surface.on_register(&mut backend, Box::new(StubContent::default()));
        surface.mark_visible(0.0);
        surface.tick(0.0, 0.016, &mut backend);
        assert!(backend.log().borrow().draws.is_empty());
    }

    #[test]
    fn test_blend_mode_change_recreates_material() {
        let mut backend = MemoryBackend::new();
        let mut surface = registered_surface(SurfaceSettings::default(), &mut backend);
        surface.mark_visible(0.0);
        surface.tick(0.0, 0.016, &mut backend);
        assert_eq!(
            backend.log().borrow().materials_created,
            vec![BaseMaterial::MaskedOneSided]
        );

        surface.set_blend_mode(BlendMode::Opaque);
        surface.set_two_sided(true);
        surface.mark_visible(1.0);
        surface.tick(1.0, 0.016, &mut backend);
        assert_eq!(
            backend.log().borrow().materials_created,
            vec![BaseMaterial::MaskedOneSided, BaseMaterial::OpaqueTwoSided]
        );
        assert_eq!(surface.base_material(), BaseMaterial::OpaqueTwoSided);
    }

    #[test]
    fn test_zero_draw_size_yields_no_hit_path() {
        let mut backend = MemoryBackend::new();
        let mut settings = SurfaceSettings::default();
        settings.draw_size = UVec2::ZERO;
        let mut surface = registered_surface(settings, &mut backend);

        assert!(surface
            .hit_widget_path(&surface_hit(Some(Vec2::new(0.5, 0.5))), 0.0, false)
            .is_none());
    }

    #[test]
    fn test_missing_uv_yields_no_hit_path() {
        let mut backend = MemoryBackend::new();
        let mut surface = registered_surface(SurfaceSettings::default(), &mut backend);
        assert!(surface.hit_widget_path(&surface_hit(None), 0.0, false).is_none());
        // Hover state untouched by the failed mapping.
        assert_eq!(surface.last_local_hit(), Vec2::ZERO);
    }

    #[test]
    fn test_hit_path_tracks_previous_location() {
        let mut backend = MemoryBackend::new();
        let mut surface = registered_surface(SurfaceSettings::default(), &mut backend);

        let first = surface
            .hit_widget_path(&surface_hit(Some(Vec2::new(0.5, 0.5))), 0.0, false)
            .unwrap();
        assert_eq!(first.current, Vec2::new(250.0, 250.0));
        assert_eq!(first.previous, Vec2::ZERO);

        let second = surface
            .hit_widget_path(&surface_hit(Some(Vec2::new(0.1, 0.1))), 0.0, false)
            .unwrap();
        assert_eq!(second.current, Vec2::new(50.0, 50.0));
        assert_eq!(second.previous, Vec2::new(250.0, 250.0));
    }

    #[test]
    fn test_null_backend_tick_preserves_pending_redraw_request() {
        let mut backend = MemoryBackend::null();
        let settings = SurfaceSettings {
            manually_redraw: true,
            ..SurfaceSettings::default()
        };
        let mut surface = Surface::new(settings);
        surface.on_register(&mut backend, Box::new(StubContent::default()));
        surface.set_content(Some(StubElement::interactable()));

        surface.mark_visible(0.0);
        surface.tick(0.0, 0.016, &mut backend);
        assert!(backend.log().borrow().draws.is_empty());

        // The initial request is still pending for a backend that can draw.
        assert!(surface.evaluate_redraw(0.0).is_draw());
    }

    #[test]
    fn test_from_saved_carries_upgraded_settings() {
        use crate::config::{SavedSurface, VERSION_ADD_BLEND_MODE};

        let mut saved = SavedSurface::default();
        saved.version = VERSION_ADD_BLEND_MODE;
        saved.blend_mode = Some(BlendMode::Opaque);
        saved.rotation = [0.0, 0.0, 0.0];

        let surface = Surface::from_saved(&saved);
        assert!(surface.uses_legacy_rotation());
        assert_eq!(surface.settings().blend_mode, BlendMode::Opaque);
        assert_eq!(surface.base_material(), BaseMaterial::OpaqueOneSided);

        saved.rotation = [0.0, 0.0, 30.0];
        let surface = Surface::from_saved(&saved);
        assert!(!surface.uses_legacy_rotation());
        assert_eq!(surface.settings().rotation, Vec3::new(0.0, 0.0, 120.0));
    }

    #[test]
    fn test_content_rebinds_only_on_identity_change() {
        let mut backend = MemoryBackend::new();
        let mut surface = Surface::new(SurfaceSettings::default());
        let content = StubContent::default();
        let probe = content.probe();
        surface.on_register(&mut backend, Box::new(content));

        let root = StubElement::interactable();
        surface.set_content(Some(root.clone()));
        assert_eq!(probe.borrow().set_root_calls, 1);

        // Same identity: no rebind.
        surface.set_content(Some(root));
        assert_eq!(probe.borrow().set_root_calls, 1);

        // New identity: rebind.
        surface.set_content(Some(StubElement::interactable()));
        assert_eq!(probe.borrow().set_root_calls, 2);
    }
}
