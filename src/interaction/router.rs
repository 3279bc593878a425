//! The per-tick pipeline that turns scene ray hits into UI input.

use crate::events::{CharEvent, InputKey, KeyEvent, Modifiers, PointerEvent, PressedKeys};
use crate::host::{
    HitPath, InputRouter, LegacyWidgetHost, LegacyWidgetId, SceneEntityId, SceneQuery, WeakHitPath,
};
use crate::manager::{SurfaceId, SurfaceManager};
use crate::mapper::{HitTarget, RayHit};
use bitflags::bitflags;
use glam::{Vec2, Vec3};

bitflags! {
    /// Capabilities found anywhere on the hovered bubble path, OR-ed across
    /// all elements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HoverFlags: u8 {
        /// Some element on the path responds to pointer interaction.
        const INTERACTABLE = 1 << 0;
        /// Some element on the path can take keyboard focus.
        const FOCUSABLE = 1 << 1;
        /// Some element on the path is hit-test visible.
        const HIT_TEST_VISIBLE = 1 << 2;
    }
}

/// Where the router's per-tick trace originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionSource {
    /// World-space ray along the router's forward axis, capped at the
    /// maximum interaction distance.
    #[default]
    World,
    /// Screen-space ray at the cursor position.
    Cursor,
    /// Screen-space ray through the viewport center.
    CenterScreen,
    /// An externally supplied hit result.
    Custom,
}

/// Notification that a hovered target changed identity between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverChange {
    /// The hovered surface changed. Either side may be absent.
    Surface {
        /// Previously hovered surface.
        old: Option<SurfaceId>,
        /// Newly hovered surface.
        new: Option<SurfaceId>,
    },
    /// The hovered legacy widget changed. Either side may be absent.
    LegacyWidget {
        /// Previously hovered legacy widget.
        old: Option<LegacyWidgetId>,
        /// Newly hovered legacy widget.
        new: Option<LegacyWidgetId>,
    },
}

/// Routes scene hits into the UI tree as synthesized pointer and keyboard
/// events, tracking hover transitions and the pressed-key set.
///
/// One router per interaction source (a player's pointer, a motion
/// controller, ...). All per-tick mutation happens inside [`tick`]
/// (single writer); accessors read the state settled at the last tick.
///
/// [`tick`]: InteractionRouter::tick
pub struct InteractionRouter {
    user_index: u32,
    pointer_index: u32,
    interaction_distance: f32,
    source: InteractionSource,
    hit_testing_enabled: bool,
    custom_hit: Option<RayHit>,
    ignored_entities: Vec<SceneEntityId>,
    origin: Vec3,
    direction: Vec3,
    modifiers: Modifiers,
    pressed_keys: PressedKeys,
    local_hit: Vec2,
    last_local_hit: Vec2,
    hovered_surface: Option<SurfaceId>,
    hovered_legacy: Option<LegacyWidgetId>,
    last_path: WeakHitPath,
    hover_flags: HoverFlags,
    last_hit: Option<RayHit>,
}

impl Default for InteractionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionRouter {
    /// New router with the default world-space source and a 500-unit reach.
    pub fn new() -> Self {
        Self {
            user_index: 0,
            pointer_index: 0,
            interaction_distance: 500.0,
            source: InteractionSource::World,
            hit_testing_enabled: true,
            custom_hit: None,
            ignored_entities: Vec::new(),
            origin: Vec3::ZERO,
            direction: Vec3::X,
            modifiers: Modifiers::empty(),
            pressed_keys: PressedKeys::new(),
            local_hit: Vec2::ZERO,
            last_local_hit: Vec2::ZERO,
            hovered_surface: None,
            hovered_legacy: None,
            last_path: WeakHitPath::empty(),
            hover_flags: HoverFlags::empty(),
            last_hit: None,
        }
    }

    /// Set the virtual user and pointer indices stamped on every event.
    pub fn set_user(&mut self, user_index: u32, pointer_index: u32) {
        self.user_index = user_index;
        self.pointer_index = pointer_index;
    }

    /// Set the world-space pose the world source traces from: origin and
    /// forward axis.
    pub fn set_pose(&mut self, origin: Vec3, direction: Vec3) {
        self.origin = origin;
        self.direction = direction;
    }

    /// Choose the interaction source.
    pub fn set_source(&mut self, source: InteractionSource) {
        self.source = source;
    }

    /// Cap on how far interaction reaches.
    pub fn set_interaction_distance(&mut self, distance: f32) {
        self.interaction_distance = distance;
    }

    /// Supply the hit used by [`InteractionSource::Custom`].
    pub fn set_custom_hit(&mut self, hit: Option<RayHit>) {
        self.custom_hit = hit;
    }

    /// Enable or disable the hit-testing pipeline entirely.
    pub fn set_hit_testing_enabled(&mut self, enabled: bool) {
        self.hit_testing_enabled = enabled;
    }

    /// Scene entities excluded from traces, typically the interactor's own
    /// geometry.
    pub fn set_ignored_entities(&mut self, entities: Vec<SceneEntityId>) {
        self.ignored_entities = entities;
    }

    /// Modifier keys stamped on synthesized events.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Trace the scene according to the configured source. Distance-capped
    /// sources report a hit beyond the maximum distance as a miss.
    fn perform_trace(&self, scene: &dyn SceneQuery) -> Option<RayHit> {
        match self.source {
            InteractionSource::World => {
                let hit = scene.ray_query(
                    self.origin,
                    self.direction,
                    self.interaction_distance,
                    &self.ignored_entities,
                )?;
                self.capped(hit)
            }
            InteractionSource::Cursor => {
                let (origin, direction) = scene.cursor_ray()?;
                let hit = scene.ray_query(
                    origin,
                    direction,
                    self.interaction_distance,
                    &self.ignored_entities,
                )?;
                self.capped(hit)
            }
            InteractionSource::CenterScreen => {
                let (origin, direction) = scene.center_ray()?;
                let hit = scene.ray_query(
                    origin,
                    direction,
                    self.interaction_distance,
                    &self.ignored_entities,
                )?;
                self.capped(hit)
            }
            InteractionSource::Custom => self.custom_hit,
        }
    }

    fn capped(&self, hit: RayHit) -> Option<RayHit> {
        (hit.distance <= self.interaction_distance).then_some(hit)
    }

    /// Run one routing pass: trace, map, and route.
    ///
    /// A synthesized move is always delivered; on a miss it carries an
    /// empty path so the UI tree can clear stale hover state. Returns the
    /// hover-changed notifications produced this pass.
    pub fn tick(
        &mut self,
        scene: &dyn SceneQuery,
        surfaces: &mut SurfaceManager,
        mut legacy: Option<&mut dyn LegacyWidgetHost>,
        input: &mut dyn InputRouter,
    ) -> Vec<HoverChange> {
        self.hover_flags = HoverFlags::empty();
        let mut changes = Vec::new();

        if !self.hit_testing_enabled || !input.is_session_active() {
            return changes;
        }

        self.local_hit = Vec2::ZERO;
        let hit = self.perform_trace(scene);
        self.last_hit = hit;

        let old_surface = self.hovered_surface;
        let old_legacy = self.hovered_legacy;
        self.hovered_surface = None;
        self.hovered_legacy = None;

        let mut path = HitPath::empty();
        if let Some(hit) = hit {
            match hit.target {
                HitTarget::Surface(id) => {
                    if let Some(surface) = surfaces.get_mut(id) {
                        if let Some(resolved) = surface.hit_widget_path(&hit, 0.0, false) {
                            self.hovered_surface = Some(id);
                            self.local_hit = resolved.current;
                            path = resolved;
                        }
                    }
                }
                HitTarget::LegacyWidget(id) => {
                    if let Some(host) = legacy.as_deref_mut() {
                        if let Some(local) = host.local_hit(id, &hit) {
                            self.hovered_legacy = Some(id);
                            self.local_hit = local;
                            path = host.hit_path(id, &hit, self.last_local_hit);
                        }
                    }
                }
                HitTarget::Geometry => {}
            }
        }

        let move_event = PointerEvent {
            user_index: self.user_index,
            pointer_index: self.pointer_index,
            position: self.local_hit,
            last_position: self.last_local_hit,
            pressed_keys: self.pressed_keys.clone(),
            effecting_key: None,
            wheel_delta: 0.0,
            modifiers: self.modifiers,
        };
        input.route_pointer_move(&path, &move_event);

        self.last_path = if path.is_empty() {
            WeakHitPath::empty()
        } else {
            path.downgrade()
        };

        if let Some(id) = self.hovered_surface {
            surfaces.request_redraw(id);
        }
        if let Some(id) = self.hovered_legacy {
            if let Some(host) = legacy.as_deref_mut() {
                host.request_redraw(id);
            }
        }

        self.last_local_hit = self.local_hit;

        for entry in &path.entries {
            if entry.element.is_interactable() {
                self.hover_flags |= HoverFlags::INTERACTABLE;
            }
            if entry.element.supports_focus() {
                self.hover_flags |= HoverFlags::FOCUSABLE;
            }
            if entry.element.is_hit_test_visible() {
                self.hover_flags |= HoverFlags::HIT_TEST_VISIBLE;
            }
        }

        if self.hovered_surface != old_surface {
            if let Some(old) = old_surface {
                surfaces.request_redraw(old);
            }
            changes.push(HoverChange::Surface {
                old: old_surface,
                new: self.hovered_surface,
            });
        }
        if self.hovered_legacy != old_legacy {
            if let (Some(old), Some(host)) = (old_legacy, legacy.as_deref_mut()) {
                host.request_redraw(old);
            }
            changes.push(HoverChange::LegacyWidget {
                old: old_legacy,
                new: self.hovered_legacy,
            });
        }

        changes
    }

    /// Press a pointer key. A duplicate press of an already-pressed key is
    /// dropped before dispatch, so the pressed set exactly mirrors
    /// physically-down keys. Neutral no-op without an active session.
    pub fn press_pointer_key(&mut self, key: InputKey, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        if !self.pressed_keys.insert(key) {
            return false;
        }
        let path = self.last_path.upgrade();
        let event = self.pointer_event(Some(key), 0.0);
        input.route_pointer_down(&path, &event)
    }

    /// Release a pointer key. Releasing a key that is not pressed is
    /// dropped before dispatch.
    pub fn release_pointer_key(&mut self, key: InputKey, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        if !self.pressed_keys.remove(&key) {
            return false;
        }
        let path = self.last_path.upgrade();
        let event = self.pointer_event(Some(key), 0.0);
        input.route_pointer_up(&path, &event)
    }

    /// Send a key press through the UI focus system, followed by the
    /// character it produces, if any.
    pub fn press_key(&mut self, key: InputKey, repeat: bool, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        let event = KeyEvent {
            key,
            modifiers: self.modifiers,
            user_index: self.user_index,
            repeat,
            key_code: key.key_code(),
            char_code: key.char_code(),
        };
        let down = input.process_key_down(&event);
        if let Some(character) = key.char_code() {
            return input.process_char(&CharEvent {
                character,
                modifiers: self.modifiers,
                user_index: self.user_index,
                repeat,
            });
        }
        down
    }

    /// Send a key release through the UI focus system.
    pub fn release_key(&mut self, key: InputKey, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        let event = KeyEvent {
            key,
            modifiers: self.modifiers,
            user_index: self.user_index,
            repeat: false,
            key_code: key.key_code(),
            char_code: key.char_code(),
        };
        input.process_key_up(&event)
    }

    /// Press and immediately release a key.
    pub fn press_and_release_key(&mut self, key: InputKey, input: &mut dyn InputRouter) -> bool {
        let pressed = self.press_key(key, false, input);
        let released = self.release_key(key, input);
        pressed || released
    }

    /// Send every character of `text` as character input.
    pub fn send_chars(&mut self, text: &str, repeat: bool, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        let mut handled = false;
        for character in text.chars() {
            handled |= input.process_char(&CharEvent {
                character,
                modifiers: self.modifiers,
                user_index: self.user_index,
                repeat,
            });
        }
        handled
    }

    /// Route a wheel event along the last resolved path.
    pub fn scroll_wheel(&mut self, delta: f32, input: &mut dyn InputRouter) -> bool {
        if !input.is_session_active() {
            return false;
        }
        let path = self.last_path.upgrade();
        let event = self.pointer_event(Some(InputKey::PointerWheelAxis), delta);
        input.route_wheel(&path, &event)
    }

    fn pointer_event(&self, effecting_key: Option<InputKey>, wheel_delta: f32) -> PointerEvent {
        PointerEvent {
            user_index: self.user_index,
            pointer_index: self.pointer_index,
            position: self.local_hit,
            last_position: self.last_local_hit,
            pressed_keys: self.pressed_keys.clone(),
            effecting_key,
            wheel_delta,
            modifiers: self.modifiers,
        }
    }

    // --- accessors ---

    /// The surface hovered at the last tick, if any.
    pub fn hovered_surface(&self) -> Option<SurfaceId> {
        self.hovered_surface
    }

    /// The legacy widget hovered at the last tick, if any.
    pub fn hovered_legacy_widget(&self) -> Option<LegacyWidgetId> {
        self.hovered_legacy
    }

    /// Capabilities found on the hovered path.
    pub fn hover_flags(&self) -> HoverFlags {
        self.hover_flags
    }

    /// Whether any hovered element responds to pointer interaction.
    pub fn is_over_interactable(&self) -> bool {
        self.hover_flags.contains(HoverFlags::INTERACTABLE)
    }

    /// Whether any hovered element can take keyboard focus.
    pub fn is_over_focusable(&self) -> bool {
        self.hover_flags.contains(HoverFlags::FOCUSABLE)
    }

    /// Whether any hovered element is hit-test visible.
    pub fn is_over_hit_test_visible(&self) -> bool {
        self.hover_flags.contains(HoverFlags::HIT_TEST_VISIBLE)
    }

    /// The raw result of the last trace.
    pub fn last_hit(&self) -> Option<&RayHit> {
        self.last_hit.as_ref()
    }

    /// The current local hit location.
    pub fn local_hit(&self) -> Vec2 {
        self.local_hit
    }

    /// Keys currently held down.
    pub fn pressed_keys(&self) -> &PressedKeys {
        &self.pressed_keys
    }

    /// The last resolved path, in weak form.
    pub fn hovered_path(&self) -> &WeakHitPath {
        &self.last_path
    }
}
