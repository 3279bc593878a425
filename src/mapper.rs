//! Converts 3D ray hits into surface-local 2D points.

use crate::host::LegacyWidgetId;
use crate::manager::SurfaceId;
use glam::{UVec2, Vec2, Vec3};

/// What kind of thing a scene query hit, resolved once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// A surface managed by this crate.
    Surface(SurfaceId),
    /// A legacy screen-space widget component owned by the host.
    LegacyWidget(LegacyWidgetId),
    /// Scene geometry with no UI attached.
    Geometry,
}

/// Result of a scene ray query.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// What was hit.
    pub target: HitTarget,
    /// World-space impact point.
    pub impact_point: Vec3,
    /// Distance from the ray origin to the impact point.
    pub distance: f32,
    /// Per-triangle UV attribute at the impact point, when the collision
    /// geometry carries a UV channel.
    pub uv: Option<Vec2>,
    /// Index of the triangle that was hit, when available.
    pub face_index: Option<u32>,
    /// Where the trace started.
    pub trace_start: Vec3,
    /// Where the trace would have ended on a miss.
    pub trace_end: Vec3,
}

/// Maps a ray hit onto a surface's pixel space: `(w * u, h * v)`.
///
/// Returns `None` when the collision geometry has no UV channel. Callers
/// must treat that as "no valid local hit" rather than falling back to
/// (0, 0), which would silently misroute input to the surface's corner.
pub fn local_hit_location(hit: &RayHit, draw_size: UVec2) -> Option<Vec2> {
    let uv = hit.uv?;
    Some(Vec2::new(
        draw_size.x as f32 * uv.x,
        draw_size.y as f32 * uv.y,
    ))
}
