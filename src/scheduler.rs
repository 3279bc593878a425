//! Redraw scheduling and backing-texture upkeep for a surface.
//!
//! The scheduler decides *when* a surface redraws (visibility x staleness x
//! cadence x manual-request, independently combinable), keeps the backing
//! texture sized to the effective draw size, and mirrors rendering state
//! into the bound material instance.

use crate::host::{ContentHost, MaterialInstance, RenderBackend, RenderTarget, SurfaceRasterizer};
use crate::surface::{BlendMode, SurfaceSettings};
use glam::UVec2;

/// How long a surface may stay unseen before redraws are skipped, unless
/// tick-when-offscreen is enabled.
const OFFSCREEN_STALENESS: f32 = 0.5;

/// Layout scale used for all rasterization.
const DRAW_SCALE: f32 = 1.0;

/// Material parameter receiving the backing texture.
pub const PARAM_UI_TEXTURE: &str = "ui_texture";
/// Material parameter receiving the clear color.
pub const PARAM_BACK_COLOR: &str = "back_color";
/// Material parameter receiving tint color and opacity.
pub const PARAM_TINT_COLOR: &str = "tint_color";
/// Material parameter receiving the texture-alpha-to-opacity weight.
pub const PARAM_TEXTURE_ALPHA: &str = "texture_alpha";
/// Material parameter receiving the lens-distortion weight.
pub const PARAM_DISTORTION: &str = "distortion";

/// Outcome of a redraw evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawDecision {
    /// Redraw this tick.
    Draw,
    /// Nothing to do this tick.
    Skip,
}

impl RedrawDecision {
    /// Whether the decision is [`RedrawDecision::Draw`].
    pub fn is_draw(self) -> bool {
        matches!(self, RedrawDecision::Draw)
    }
}

/// Base material variant resolved from blend mode and sidedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseMaterial {
    /// Opaque, visible from both sides.
    OpaqueTwoSided,
    /// Opaque, front face only.
    OpaqueOneSided,
    /// Alpha-masked, visible from both sides.
    MaskedTwoSided,
    /// Alpha-masked, front face only.
    MaskedOneSided,
    /// Translucent, visible from both sides.
    TranslucentTwoSided,
    /// Translucent, front face only.
    TranslucentOneSided,
}

impl BaseMaterial {
    /// Pick the variant for a blend mode and sidedness.
    pub fn resolve(blend_mode: BlendMode, two_sided: bool) -> Self {
        match (blend_mode, two_sided) {
            (BlendMode::Opaque, true) => BaseMaterial::OpaqueTwoSided,
            (BlendMode::Opaque, false) => BaseMaterial::OpaqueOneSided,
            (BlendMode::Masked, true) => BaseMaterial::MaskedTwoSided,
            (BlendMode::Masked, false) => BaseMaterial::MaskedOneSided,
            (BlendMode::Transparent, true) => BaseMaterial::TranslucentTwoSided,
            (BlendMode::Transparent, false) => BaseMaterial::TranslucentOneSided,
        }
    }
}

/// Clear color for the backing texture. The blend mode dictates the alpha:
/// opaque surfaces clear to alpha 1, masked and transparent ones to 0.
pub fn clear_color_for(blend_mode: BlendMode, background: [f32; 4]) -> [f32; 4] {
    let mut color = background;
    color[3] = match blend_mode {
        BlendMode::Opaque => 1.0,
        BlendMode::Masked | BlendMode::Transparent => 0.0,
    };
    color
}

/// Report of one accepted render pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOutcome {
    /// The effective size differed from the stored draw size; size-derived
    /// state (collision geometry) must be recreated by the owner.
    pub size_changed: bool,
    /// The pixel dimensions this pass rendered at.
    pub effective_size: UVec2,
}

/// Decides when a surface redraws and keeps its GPU-facing state current.
#[derive(Debug)]
pub struct RenderScheduler {
    visible: bool,
    redraw_requested: bool,
    last_render_time: Option<f32>,
    current_draw_size: UVec2,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderScheduler {
    /// New scheduler. Starts with a pending redraw request so a surface in
    /// manual mode still produces its first frame.
    pub fn new() -> Self {
        Self {
            visible: true,
            redraw_requested: true,
            last_render_time: None,
            current_draw_size: UVec2::ZERO,
        }
    }

    /// Record whether the surface is currently visible.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Flag that a redraw was explicitly requested.
    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    /// The size of the most recent render pass.
    pub fn current_draw_size(&self) -> UVec2 {
        self.current_draw_size
    }

    /// Timestamp of the last accepted render, if any.
    pub fn last_render_time(&self) -> Option<f32> {
        self.last_render_time
    }

    /// Forget render history after the host recreated the render proxy, so
    /// the next evaluation draws unconditionally.
    pub fn mark_proxy_recreated(&mut self) {
        self.redraw_requested = true;
        self.last_render_time = None;
    }

    /// Decide whether the surface should redraw now.
    ///
    /// Draws when all of: the draw size is nonzero; the surface is visible;
    /// either tick-when-offscreen is set or the surface was seen within the
    /// staleness threshold; the minimum redraw interval has elapsed; and, in
    /// manual mode, a redraw request is pending. Accepting a draw consumes
    /// the pending request exactly once.
    pub fn evaluate(
        &mut self,
        settings: &SurfaceSettings,
        now: f32,
        last_visible_time: f32,
    ) -> RedrawDecision {
        if settings.draw_size.x == 0 || settings.draw_size.y == 0 {
            return RedrawDecision::Skip;
        }
        if !self.visible {
            return RedrawDecision::Skip;
        }
        if !settings.tick_when_offscreen && now - last_visible_time > OFFSCREEN_STALENESS {
            return RedrawDecision::Skip;
        }
        if let Some(last) = self.last_render_time {
            if now - last < settings.min_redraw_interval {
                return RedrawDecision::Skip;
            }
        }
        if settings.manually_redraw {
            if !self.redraw_requested {
                return RedrawDecision::Skip;
            }
            self.redraw_requested = false;
        }
        RedrawDecision::Draw
    }

    /// Execute one accepted render pass.
    ///
    /// With fit-to-content enabled the content computes its desired size
    /// and the layout is recreated at that size, which makes the
    /// rasterizer's own pre-pass redundant. A changed effective size is
    /// persisted into `settings` and reported so the owner can recreate
    /// size-derived state.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        settings: &mut SurfaceSettings,
        content: &mut dyn ContentHost,
        rasterizer: &mut dyn SurfaceRasterizer,
        backend: &mut dyn RenderBackend,
        target: &mut Option<Box<dyn RenderTarget>>,
        material: &mut Option<Box<dyn MaterialInstance>>,
        now: f32,
        delta_time: f32,
    ) -> RenderOutcome {
        if backend.is_null() {
            return RenderOutcome::default();
        }
        if settings.draw_size.x == 0 || settings.draw_size.y == 0 {
            return RenderOutcome::default();
        }

        let mut effective = settings.draw_size;
        if settings.draw_at_desired_size {
            let desired = content.desired_size(DRAW_SCALE);
            effective = UVec2::new(
                desired.x.round().max(0.0) as u32,
                desired.y.round().max(0.0) as u32,
            );
            content.rebuild_layout(effective.as_vec2());
            // Layout already ran at the effective size.
            rasterizer.set_prepass_needed(false);
        } else {
            rasterizer.set_prepass_needed(true);
        }

        let size_changed = effective != settings.draw_size;
        if size_changed {
            tracing::debug!(
                from = ?settings.draw_size,
                to = ?effective,
                "surface draw size follows content"
            );
            settings.draw_size = effective;
        }
        self.current_draw_size = effective;

        self.update_render_target(settings, backend, target, material, effective);

        if let Some(target) = target.as_deref_mut() {
            rasterizer.draw(target, content, DRAW_SCALE, effective, delta_time);
        }
        self.last_render_time = Some(now);

        RenderOutcome {
            size_changed,
            effective_size: effective,
        }
    }

    /// Ensure the backing texture exists, matches `desired`, and clears to
    /// the color the blend mode dictates. Creation is lazy; size changes
    /// resize in place rather than recreating.
    fn update_render_target(
        &mut self,
        settings: &SurfaceSettings,
        backend: &mut dyn RenderBackend,
        target: &mut Option<Box<dyn RenderTarget>>,
        material: &mut Option<Box<dyn MaterialInstance>>,
        desired: UVec2,
    ) {
        if desired.x == 0 || desired.y == 0 {
            return;
        }

        let clear = clear_color_for(settings.blend_mode, settings.background_color);
        let mut clear_changed = false;

        match target {
            None => {
                *target = Some(backend.create_render_target(desired, clear));
                clear_changed = true;
            }
            Some(existing) => {
                if existing.size() != desired {
                    existing.resize(desired);
                }
                if existing.clear_color() != clear {
                    existing.set_clear_color(clear);
                    clear_changed = true;
                }
            }
        }

        if let (Some(target), Some(material)) = (target.as_deref(), material.as_deref_mut()) {
            if clear_changed {
                material.set_vector_parameter(PARAM_BACK_COLOR, clear);
            }
            let id = target.texture_id();
            if material.texture_parameter(PARAM_UI_TEXTURE) != Some(id) {
                material.set_texture_parameter(PARAM_UI_TEXTURE, id);
            }
            if material.scalar_parameter(PARAM_DISTORTION) != Some(settings.distortion_weight) {
                material.set_scalar_parameter(PARAM_DISTORTION, settings.distortion_weight);
            }
        }
    }

    /// Mirror the current rendering state into the material instance.
    /// Idempotent: each parameter is compared first and only written when
    /// its value actually changed.
    pub fn sync_material_parameters(
        &self,
        settings: &SurfaceSettings,
        target: Option<&dyn RenderTarget>,
        material: &mut dyn MaterialInstance,
    ) {
        if let Some(target) = target {
            let id = target.texture_id();
            if material.texture_parameter(PARAM_UI_TEXTURE) != Some(id) {
                material.set_texture_parameter(PARAM_UI_TEXTURE, id);
            }
        }
        if material.vector_parameter(PARAM_TINT_COLOR) != Some(settings.tint_color_and_opacity) {
            material.set_vector_parameter(PARAM_TINT_COLOR, settings.tint_color_and_opacity);
        }
        if material.scalar_parameter(PARAM_TEXTURE_ALPHA) != Some(settings.texture_alpha_weight) {
            material.set_scalar_parameter(PARAM_TEXTURE_ALPHA, settings.texture_alpha_weight);
        }
        if material.scalar_parameter(PARAM_DISTORTION) != Some(settings.distortion_weight) {
            material.set_scalar_parameter(PARAM_DISTORTION, settings.distortion_weight);
        }
    }
}
