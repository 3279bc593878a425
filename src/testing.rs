//! In-memory collaborator implementations for tests and headless hosts.
//!
//! Everything here is deterministic and allocation-only: no GPU, no UI
//! engine, no scene. Mocks that outlive a `Box<dyn ...>` handoff expose
//! their observations through shared `Rc<RefCell<...>>` logs.

use crate::events::{CharEvent, KeyEvent, PointerEvent};
use crate::host::{
    ContentHost, HitPath, InputRouter, LegacyWidgetHost, LegacyWidgetId, MaterialInstance,
    PathEntry, Rect, RenderBackend, RenderTarget, SceneEntityId, SceneQuery, SurfaceRasterizer,
    TextureId, UiElement,
};
use crate::mapper::RayHit;
use crate::scheduler::BaseMaterial;
use glam::{UVec2, Vec2, Vec3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Scene that reports one fixed hit (or none) for every query.
pub struct StaticScene {
    hit: Option<RayHit>,
    entity: Option<SceneEntityId>,
    cursor: Option<(Vec3, Vec3)>,
    center: Option<(Vec3, Vec3)>,
}

impl StaticScene {
    /// Scene in which every trace misses.
    pub fn miss() -> Self {
        Self {
            hit: None,
            entity: None,
            cursor: Some((Vec3::ZERO, Vec3::X)),
            center: Some((Vec3::ZERO, Vec3::X)),
        }
    }

    /// Scene in which every trace reports `hit`.
    pub fn hit(hit: RayHit) -> Self {
        Self {
            hit: Some(hit),
            ..Self::miss()
        }
    }

    /// Tag the hit as belonging to a scene entity, so ignore sets apply.
    pub fn with_entity(mut self, entity: SceneEntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Remove the cursor ray, as on a platform without an OS cursor.
    pub fn without_cursor(mut self) -> Self {
        self.cursor = None;
        self
    }
}

impl SceneQuery for StaticScene {
    fn ray_query(
        &self,
        _origin: Vec3,
        _direction: Vec3,
        _max_distance: f32,
        ignore: &[SceneEntityId],
    ) -> Option<RayHit> {
        if let Some(entity) = self.entity {
            if ignore.contains(&entity) {
                return None;
            }
        }
        self.hit
    }

    fn cursor_ray(&self) -> Option<(Vec3, Vec3)> {
        self.cursor
    }

    fn center_ray(&self) -> Option<(Vec3, Vec3)> {
        self.center
    }
}

/// Element with fixed capability answers.
pub struct StubElement {
    interactable: bool,
    focusable: bool,
    hit_test_visible: bool,
    enabled: bool,
}

impl StubElement {
    /// A visible element that responds to pointer interaction.
    pub fn interactable() -> Rc<dyn UiElement> {
        Rc::new(Self {
            interactable: true,
            focusable: false,
            hit_test_visible: true,
            enabled: true,
        })
    }

    /// A visible element that can take keyboard focus.
    pub fn focusable() -> Rc<dyn UiElement> {
        Rc::new(Self {
            interactable: false,
            focusable: true,
            hit_test_visible: true,
            enabled: true,
        })
    }

    /// A visible element with no interactive capabilities.
    pub fn passive() -> Rc<dyn UiElement> {
        Rc::new(Self {
            interactable: false,
            focusable: false,
            hit_test_visible: true,
            enabled: true,
        })
    }

    /// An interactable element that is currently disabled.
    pub fn disabled() -> Rc<dyn UiElement> {
        Rc::new(Self {
            interactable: true,
            focusable: false,
            hit_test_visible: true,
            enabled: false,
        })
    }
}

impl UiElement for StubElement {
    fn is_interactable(&self) -> bool {
        self.interactable
    }

    fn supports_focus(&self) -> bool {
        self.focusable
    }

    fn is_hit_test_visible(&self) -> bool {
        self.hit_test_visible
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Observations a [`StubContent`] records, shared so they stay readable
/// after the content is boxed into a surface.
#[derive(Default)]
pub struct ContentProbe {
    /// Number of root rebinds.
    pub set_root_calls: usize,
    /// Last focusability the surface pushed down.
    pub focusable: Option<bool>,
}

/// Content host with a fixed desired size and a fixed bubble path.
#[derive(Default)]
pub struct StubContent {
    /// Desired size reported by the layout pre-pass.
    pub desired: Vec2,
    /// Every layout size requested, in order.
    pub layout_rebuilds: Vec<Vec2>,
    path: Vec<PathEntry>,
    probe: Rc<RefCell<ContentProbe>>,
}

impl StubContent {
    /// Shared handle to the recorded observations.
    pub fn probe(&self) -> Rc<RefCell<ContentProbe>> {
        self.probe.clone()
    }

    /// Append an element to the bubble path reported under any local point.
    pub fn push_path_element(&mut self, element: Rc<dyn UiElement>) {
        self.path.push(PathEntry {
            element,
            geometry: Rect::from_origin_size(Vec2::ZERO, Vec2::new(500.0, 500.0)),
        });
    }
}

impl ContentHost for StubContent {
    fn set_root(&mut self, _root: Option<Rc<dyn UiElement>>) {
        self.probe.borrow_mut().set_root_calls += 1;
    }

    fn desired_size(&mut self, _scale: f32) -> Vec2 {
        self.desired
    }

    fn rebuild_layout(&mut self, size: Vec2) {
        self.layout_rebuilds.push(size);
    }

    fn set_focusable(&mut self, focusable: bool) {
        self.probe.borrow_mut().focusable = Some(focusable);
    }

    fn bubble_path(&self, _local: Vec2, _radius: f32, ignore_disabled: bool) -> Vec<PathEntry> {
        self.path
            .iter()
            .filter(|entry| !ignore_disabled || entry.element.is_enabled())
            .cloned()
            .collect()
    }
}

/// Input router that records every delivered event. Pointer events are
/// stored with the length of the path they traveled.
pub struct RecordingRouter {
    /// Whether a session is active.
    pub session_active: bool,
    /// Delivered moves as (path length, event).
    pub moves: Vec<(usize, PointerEvent)>,
    /// Delivered presses as (path length, event).
    pub downs: Vec<(usize, PointerEvent)>,
    /// Delivered releases as (path length, event).
    pub ups: Vec<(usize, PointerEvent)>,
    /// Delivered wheel events as (path length, event).
    pub wheels: Vec<(usize, PointerEvent)>,
    /// Key presses processed through the focus system.
    pub key_downs: Vec<KeyEvent>,
    /// Key releases processed through the focus system.
    pub key_ups: Vec<KeyEvent>,
    /// Character entries processed through the focus system.
    pub chars: Vec<CharEvent>,
}

impl RecordingRouter {
    /// Router with an active session.
    pub fn active() -> Self {
        Self {
            session_active: true,
            moves: Vec::new(),
            downs: Vec::new(),
            ups: Vec::new(),
            wheels: Vec::new(),
            key_downs: Vec::new(),
            key_ups: Vec::new(),
            chars: Vec::new(),
        }
    }

    /// Router with no active session; everything routed at it is refused.
    pub fn inactive() -> Self {
        Self {
            session_active: false,
            ..Self::active()
        }
    }
}

impl InputRouter for RecordingRouter {
    fn is_session_active(&self) -> bool {
        self.session_active
    }

    fn route_pointer_move(&mut self, path: &HitPath, event: &PointerEvent) {
        self.moves.push((path.entries.len(), event.clone()));
    }

    fn route_pointer_down(&mut self, path: &HitPath, event: &PointerEvent) -> bool {
        self.downs.push((path.entries.len(), event.clone()));
        !path.is_empty()
    }

    fn route_pointer_up(&mut self, path: &HitPath, event: &PointerEvent) -> bool {
        self.ups.push((path.entries.len(), event.clone()));
        !path.is_empty()
    }

    fn route_wheel(&mut self, path: &HitPath, event: &PointerEvent) -> bool {
        self.wheels.push((path.entries.len(), event.clone()));
        !path.is_empty()
    }

    fn process_key_down(&mut self, event: &KeyEvent) -> bool {
        self.key_downs.push(*event);
        true
    }

    fn process_key_up(&mut self, event: &KeyEvent) -> bool {
        self.key_ups.push(*event);
        true
    }

    fn process_char(&mut self, event: &CharEvent) -> bool {
        self.chars.push(*event);
        true
    }
}

/// Everything a [`MemoryBackend`] and its rasterizers observe.
#[derive(Default)]
pub struct BackendLog {
    /// Render targets allocated (resizes do not count).
    pub targets_created: usize,
    /// Rasterization submissions as (size, delta time).
    pub draws: Vec<(UVec2, f32)>,
    /// Base variant of every material instantiated, in order.
    pub materials_created: Vec<BaseMaterial>,
}

/// CPU-only render backend.
pub struct MemoryBackend {
    null: bool,
    next_texture: u64,
    log: Rc<RefCell<BackendLog>>,
}

impl MemoryBackend {
    /// A live backend.
    pub fn new() -> Self {
        Self {
            null: false,
            next_texture: 1,
            log: Rc::new(RefCell::new(BackendLog::default())),
        }
    }

    /// A null backend, as on a dedicated server.
    pub fn null() -> Self {
        Self {
            null: true,
            ..Self::new()
        }
    }

    /// Shared handle to the backend's log.
    pub fn log(&self) -> Rc<RefCell<BackendLog>> {
        self.log.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MemoryBackend {
    fn is_null(&self) -> bool {
        self.null
    }

    fn create_rasterizer(&mut self) -> Box<dyn SurfaceRasterizer> {
        Box::new(RecordingRasterizer::new(self.log.clone()))
    }

    fn create_render_target(
        &mut self,
        size: UVec2,
        clear_color: [f32; 4],
    ) -> Box<dyn RenderTarget> {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.log.borrow_mut().targets_created += 1;
        Box::new(MemoryTexture {
            id,
            size,
            clear: clear_color,
        })
    }

    fn create_material(&mut self, base: BaseMaterial) -> Box<dyn MaterialInstance> {
        self.log.borrow_mut().materials_created.push(base);
        Box::new(MemoryMaterial::new(base))
    }
}

/// Render target that is just a size and a clear color.
pub struct MemoryTexture {
    id: TextureId,
    size: UVec2,
    clear: [f32; 4],
}

impl RenderTarget for MemoryTexture {
    fn texture_id(&self) -> TextureId {
        self.id
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn resize(&mut self, size: UVec2) {
        self.size = size;
    }

    fn clear_color(&self) -> [f32; 4] {
        self.clear
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear = color;
    }
}

/// Material instance backed by hash maps, counting writes so tests can
/// assert that redundant parameter syncs are skipped.
pub struct MemoryMaterial {
    base: BaseMaterial,
    /// Total parameter writes since creation.
    pub writes: usize,
    textures: HashMap<String, TextureId>,
    vectors: HashMap<String, [f32; 4]>,
    scalars: HashMap<String, f32>,
}

impl MemoryMaterial {
    /// New instance of the given base variant with no parameters set.
    pub fn new(base: BaseMaterial) -> Self {
        Self {
            base,
            writes: 0,
            textures: HashMap::new(),
            vectors: HashMap::new(),
            scalars: HashMap::new(),
        }
    }
}

impl MaterialInstance for MemoryMaterial {
    fn base(&self) -> BaseMaterial {
        self.base
    }

    fn texture_parameter(&self, name: &str) -> Option<TextureId> {
        self.textures.get(name).copied()
    }

    fn set_texture_parameter(&mut self, name: &str, value: TextureId) {
        self.writes += 1;
        self.textures.insert(name.to_owned(), value);
    }

    fn vector_parameter(&self, name: &str) -> Option<[f32; 4]> {
        self.vectors.get(name).copied()
    }

    fn set_vector_parameter(&mut self, name: &str, value: [f32; 4]) {
        self.writes += 1;
        self.vectors.insert(name.to_owned(), value);
    }

    fn scalar_parameter(&self, name: &str) -> Option<f32> {
        self.scalars.get(name).copied()
    }

    fn set_scalar_parameter(&mut self, name: &str, value: f32) {
        self.writes += 1;
        self.scalars.insert(name.to_owned(), value);
    }
}

/// Rasterizer that records submissions into a shared [`BackendLog`].
pub struct RecordingRasterizer {
    log: Rc<RefCell<BackendLog>>,
    prepass: bool,
}

impl RecordingRasterizer {
    /// New rasterizer appending to `log`.
    pub fn new(log: Rc<RefCell<BackendLog>>) -> Self {
        Self { log, prepass: true }
    }

    /// Whether the last caller asked for a layout pre-pass.
    pub fn prepass_needed(&self) -> bool {
        self.prepass
    }
}

impl SurfaceRasterizer for RecordingRasterizer {
    fn set_prepass_needed(&mut self, needed: bool) {
        self.prepass = needed;
    }

    fn draw(
        &mut self,
        _target: &mut dyn RenderTarget,
        _content: &mut dyn ContentHost,
        _scale: f32,
        size: UVec2,
        delta_time: f32,
    ) {
        self.log.borrow_mut().draws.push((size, delta_time));
    }
}

/// Legacy widget host that resolves every hit to one fixed local point.
pub struct RecordingLegacyHost {
    local: Vec2,
    /// Redraw requests received, in order.
    pub redraws: Vec<LegacyWidgetId>,
}

impl RecordingLegacyHost {
    /// Host whose widgets all report `local` as the hit location.
    pub fn new(local: Vec2) -> Self {
        Self {
            local,
            redraws: Vec::new(),
        }
    }
}

impl LegacyWidgetHost for RecordingLegacyHost {
    fn local_hit(&mut self, _id: LegacyWidgetId, _hit: &RayHit) -> Option<Vec2> {
        Some(self.local)
    }

    fn hit_path(&mut self, _id: LegacyWidgetId, _hit: &RayHit, previous: Vec2) -> HitPath {
        HitPath {
            entries: Vec::new(),
            current: self.local,
            previous,
        }
    }

    fn request_redraw(&mut self, id: LegacyWidgetId) {
        self.redraws.push(id);
    }
}
