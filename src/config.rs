//! Versioned surface persistence.
//!
//! Saved surfaces carry the data version they were written at; loading
//! upgrades older data in order, one version step at a time, so every
//! surface ends up with current semantics regardless of how old its save
//! is.

use crate::surface::{BlendMode, SurfaceSettings};
use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Version that introduced an explicit pivot. Older data rendered anchored
/// at the top-left corner.
pub const VERSION_ADD_PIVOT: u32 = 1;
/// Version that replaced the opaque flag with a three-state blend mode.
pub const VERSION_ADD_BLEND_MODE: u32 = 2;
/// Version that fixed the default orientation to face along +X.
pub const VERSION_FIX_DEFAULT_ORIENTATION: u32 = 3;
/// Version newly written data carries.
pub const SAVED_SURFACE_VERSION: u32 = VERSION_FIX_DEFAULT_ORIENTATION;

fn oldest_version() -> u32 {
    0
}

/// Errors from strict surface-data loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file contents were not valid surface data.
    #[error("failed to parse {path}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk form of a surface's configuration.
///
/// All fields default so partial files from any version deserialize; the
/// version field then drives the upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedSurface {
    /// Data version this surface was written at. A file with no version
    /// field predates versioning entirely, so the missing-field default is
    /// 0, not the current version.
    #[serde(default = "oldest_version")]
    pub version: u32,
    /// Backing texture size in pixels.
    pub draw_size: [u32; 2],
    /// Normalized anchor in [0,1]^2.
    pub pivot: [f32; 2],
    /// Blend mode, present from [`VERSION_ADD_BLEND_MODE`] onward.
    pub blend_mode: Option<BlendMode>,
    /// Pre-blend-mode opacity flag, meaningful only below
    /// [`VERSION_ADD_BLEND_MODE`].
    pub opaque: bool,
    /// Whether the surface renders from both sides.
    pub two_sided: bool,
    /// Background color the backing texture clears to.
    pub background_color: [f32; 4],
    /// Tint color and opacity.
    pub tint_color_and_opacity: [f32; 4],
    /// Texture-alpha-to-opacity weight.
    pub texture_alpha_weight: f32,
    /// Lens-distortion weight.
    pub distortion_weight: f32,
    /// Only redraw when explicitly requested.
    pub manually_redraw: bool,
    /// Minimum time between redraws.
    pub min_redraw_interval: f32,
    /// Keep redrawing while off-screen.
    pub tick_when_offscreen: bool,
    /// Size the backing texture to the content's desired size.
    pub draw_at_desired_size: bool,
    /// Whether the content window may take keyboard focus.
    pub window_focusable: bool,
    /// Euler rotation in degrees.
    pub rotation: [f32; 3],
}

impl Default for SavedSurface {
    fn default() -> Self {
        Self::from_settings(&SurfaceSettings::default())
    }
}

/// A [`SavedSurface`] upgraded to current semantics.
#[derive(Debug, Clone)]
pub struct UpgradedSurface {
    /// The upgraded configuration.
    pub settings: SurfaceSettings,
    /// The data predates the orientation fix and carried an explicit
    /// all-zero rotation, so the old orientation must be preserved.
    pub legacy_rotation: bool,
}

impl SavedSurface {
    /// Snapshot current settings at the current data version.
    pub fn from_settings(settings: &SurfaceSettings) -> Self {
        Self {
            version: SAVED_SURFACE_VERSION,
            draw_size: settings.draw_size.to_array(),
            pivot: settings.pivot.to_array(),
            blend_mode: Some(settings.blend_mode),
            opaque: settings.blend_mode == BlendMode::Opaque,
            two_sided: settings.two_sided,
            background_color: settings.background_color,
            tint_color_and_opacity: settings.tint_color_and_opacity,
            texture_alpha_weight: settings.texture_alpha_weight,
            distortion_weight: settings.distortion_weight,
            manually_redraw: settings.manually_redraw,
            min_redraw_interval: settings.min_redraw_interval,
            tick_when_offscreen: settings.tick_when_offscreen,
            draw_at_desired_size: settings.draw_at_desired_size,
            window_focusable: settings.window_focusable,
            rotation: settings.rotation.to_array(),
        }
    }

    /// Upgrade to current semantics, applying each version step in order.
    pub fn upgrade(&self) -> UpgradedSurface {
        let mut settings = SurfaceSettings {
            draw_size: UVec2::from_array(self.draw_size),
            pivot: Vec2::from_array(self.pivot),
            blend_mode: self.blend_mode.unwrap_or_default(),
            two_sided: self.two_sided,
            background_color: self.background_color,
            tint_color_and_opacity: self.tint_color_and_opacity,
            texture_alpha_weight: self.texture_alpha_weight,
            distortion_weight: self.distortion_weight,
            manually_redraw: self.manually_redraw,
            min_redraw_interval: self.min_redraw_interval,
            tick_when_offscreen: self.tick_when_offscreen,
            draw_at_desired_size: self.draw_at_desired_size,
            window_focusable: self.window_focusable,
            rotation: Vec3::from_array(self.rotation),
        };
        let mut legacy_rotation = false;

        // Pre-pivot data rendered anchored at the top-left corner.
        if self.version < VERSION_ADD_PIVOT {
            settings.pivot = Vec2::ZERO;
        }

        // Pre-blend-mode data only distinguished opaque from translucent.
        if self.version < VERSION_ADD_BLEND_MODE {
            settings.blend_mode = if self.opaque {
                BlendMode::Opaque
            } else {
                BlendMode::Transparent
            };
        }

        // The orientation fix rotated the default-facing axis by 90 degrees.
        // An explicit all-zero rotation is indistinguishable from an
        // untouched default, so it keeps the old orientation instead of
        // being silently corrected.
        if self.version < VERSION_FIX_DEFAULT_ORIENTATION {
            if settings.rotation == Vec3::ZERO {
                legacy_rotation = true;
            } else {
                settings.rotation.z += 90.0;
            }
        }

        UpgradedSurface {
            settings,
            legacy_rotation,
        }
    }

    /// Load surface data, returning errors to the caller.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load surface data, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::load(path) {
            Ok(saved) => saved,
            Err(err) => {
                warn!("{err:#}. Using defaults");
                Self::default()
            }
        }
    }

    /// Save surface data at the current version.
    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn saved_at_version(version: u32) -> SavedSurface {
        SavedSurface {
            version,
            ..SavedSurface::default()
        }
    }

    #[test]
    fn test_current_version_upgrades_unchanged() {
        let saved = SavedSurface::default();
        let upgraded = saved.upgrade();
        assert_eq!(upgraded.settings, SurfaceSettings::default());
        assert!(!upgraded.legacy_rotation);
    }

    #[test]
    fn test_pre_pivot_data_anchors_at_top_left() {
        let saved = saved_at_version(0);
        let upgraded = saved.upgrade();
        assert_eq!(upgraded.settings.pivot, Vec2::ZERO);
    }

    #[test]
    fn test_opaque_flag_maps_to_blend_mode() {
        let mut saved = saved_at_version(VERSION_ADD_PIVOT);
        saved.blend_mode = None;
        saved.opaque = true;
        assert_eq!(saved.upgrade().settings.blend_mode, BlendMode::Opaque);

        saved.opaque = false;
        assert_eq!(saved.upgrade().settings.blend_mode, BlendMode::Transparent);

        // From the blend-mode version onward, the explicit field wins.
        let mut saved = saved_at_version(VERSION_ADD_BLEND_MODE);
        saved.blend_mode = Some(BlendMode::Masked);
        saved.opaque = true;
        assert_eq!(saved.upgrade().settings.blend_mode, BlendMode::Masked);
    }

    #[test]
    fn test_orientation_fix_preserves_explicit_zero_rotation() {
        let mut saved = saved_at_version(VERSION_ADD_BLEND_MODE);
        saved.rotation = [0.0, 0.0, 0.0];
        let upgraded = saved.upgrade();
        assert!(upgraded.legacy_rotation);
        assert_eq!(upgraded.settings.rotation, Vec3::ZERO);
    }

    #[test]
    fn test_orientation_fix_corrects_nonzero_rotation() {
        let mut saved = saved_at_version(VERSION_ADD_BLEND_MODE);
        saved.rotation = [0.0, 0.0, 45.0];
        let upgraded = saved.upgrade();
        assert!(!upgraded.legacy_rotation);
        assert_eq!(upgraded.settings.rotation, Vec3::new(0.0, 0.0, 135.0));

        // Data at the current version is never corrected.
        let mut saved = saved_at_version(SAVED_SURFACE_VERSION);
        saved.rotation = [0.0, 0.0, 45.0];
        assert_eq!(
            saved.upgrade().settings.rotation,
            Vec3::new(0.0, 0.0, 45.0)
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("worldui_surface_{timestamp}.toml"));

        let mut saved = SavedSurface::default();
        saved.draw_size = [800, 600];
        saved.blend_mode = Some(BlendMode::Transparent);
        saved.save_to_path(&path).expect("save");

        let loaded = SavedSurface::load(&path).expect("load");
        assert_eq!(loaded.version, SAVED_SURFACE_VERSION);
        assert_eq!(loaded.draw_size, [800, 600]);
        assert_eq!(loaded.blend_mode, Some(BlendMode::Transparent));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_versionless_data_is_treated_as_oldest() {
        let saved: SavedSurface = toml::from_str(
            r#"
            draw_size = [300, 200]
            opaque = true
            rotation = [0.0, 0.0, 45.0]
            "#,
        )
        .expect("parse");
        assert_eq!(saved.version, 0);

        // All upgrade steps apply.
        let upgraded = saved.upgrade();
        assert_eq!(upgraded.settings.pivot, Vec2::ZERO);
        assert_eq!(upgraded.settings.blend_mode, BlendMode::Opaque);
        assert_eq!(upgraded.settings.rotation, Vec3::new(0.0, 0.0, 135.0));
    }

    #[test]
    fn test_lenient_load_falls_back_to_defaults() {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("worldui_garbage_{timestamp}.toml"));
        fs::write(&path, "not = [valid").expect("write");

        let loaded = SavedSurface::load_from_path(&path);
        assert_eq!(loaded.version, SAVED_SURFACE_VERSION);
        assert_eq!(loaded.draw_size, [500, 500]);

        let _ = fs::remove_file(&path);

        // Missing file also falls back.
        let missing = SavedSurface::load_from_path(Path::new("/nonexistent/surface.toml"));
        assert_eq!(missing.version, SAVED_SURFACE_VERSION);
    }
}
