//! End-to-end pipeline test: surface rendering plus interaction routing
//! against a fully in-memory host.

use glam::{Vec2, Vec3};
use worldui::testing::{
    MemoryBackend, RecordingRouter, StaticScene, StubContent, StubElement,
};
use worldui::{
    HitTarget, HoverChange, InputKey, InteractionRouter, RayHit, Surface, SurfaceId,
    SurfaceManager, SurfaceSettings,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn hit_on(id: SurfaceId, uv: Vec2) -> RayHit {
    RayHit {
        target: HitTarget::Surface(id),
        impact_point: Vec3::new(2.0, 0.0, 1.0),
        distance: 2.0,
        uv: Some(uv),
        face_index: Some(0),
        trace_start: Vec3::ZERO,
        trace_end: Vec3::new(500.0, 0.0, 0.0),
    }
}

fn spawn_surface(
    surfaces: &mut SurfaceManager,
    backend: &mut MemoryBackend,
    settings: SurfaceSettings,
) -> SurfaceId {
    let mut content = StubContent::default();
    content.push_path_element(StubElement::interactable());
    content.push_path_element(StubElement::focusable());
    let mut surface = Surface::new(settings);
    surface.on_register(backend, Box::new(content));
    surface.set_content(Some(StubElement::passive()));
    surfaces.insert(surface)
}

#[test]
fn full_frame_renders_then_routes_interaction() {
    init_tracing();
    let mut backend = MemoryBackend::new();
    let mut surfaces = SurfaceManager::new();
    let id = spawn_surface(&mut surfaces, &mut backend, SurfaceSettings::default());

    // Frame: render, then interact.
    surfaces.get_mut(id).unwrap().mark_visible(0.0);
    surfaces.tick_all(0.0, 0.016, &mut backend);
    assert_eq!(backend.log().borrow().draws.len(), 1);
    assert!(surfaces.get(id).unwrap().render_target().is_some());

    let mut router = InteractionRouter::new();
    let mut input = RecordingRouter::active();
    let scene = StaticScene::hit(hit_on(id, Vec2::new(0.4, 0.6)));

    let changes = router.tick(&scene, &mut surfaces, None, &mut input);
    assert_eq!(
        changes,
        vec![HoverChange::Surface {
            old: None,
            new: Some(id)
        }]
    );
    assert_eq!(router.hovered_surface(), Some(id));
    assert_eq!(router.local_hit(), Vec2::new(200.0, 300.0));
    assert!(router.is_over_interactable());
    assert!(router.is_over_focusable());

    // The move traveled the two-element bubble path.
    let (path_len, event) = &input.moves[0];
    assert_eq!(*path_len, 2);
    assert_eq!(event.position, Vec2::new(200.0, 300.0));

    // Click lands on the same path.
    assert!(router.press_pointer_key(InputKey::PointerLeft, &mut input));
    assert!(router.release_pointer_key(InputKey::PointerLeft, &mut input));
    assert_eq!(input.downs.len(), 1);
    assert_eq!(input.ups.len(), 1);
    assert_eq!(input.downs[0].0, 2);
}

#[test]
fn hover_stays_stable_across_repeated_frames() {
    let mut backend = MemoryBackend::new();
    let mut surfaces = SurfaceManager::new();
    let id = spawn_surface(&mut surfaces, &mut backend, SurfaceSettings::default());

    let mut router = InteractionRouter::new();
    let mut input = RecordingRouter::active();
    let scene = StaticScene::hit(hit_on(id, Vec2::new(0.5, 0.5)));

    assert_eq!(router.tick(&scene, &mut surfaces, None, &mut input).len(), 1);
    for _ in 0..5 {
        assert!(router.tick(&scene, &mut surfaces, None, &mut input).is_empty());
    }

    // Leaving the surface notifies exactly once, then stays quiet.
    let gone = StaticScene::miss();
    assert_eq!(
        router.tick(&gone, &mut surfaces, None, &mut input),
        vec![HoverChange::Surface {
            old: Some(id),
            new: None
        }]
    );
    assert!(router.tick(&gone, &mut surfaces, None, &mut input).is_empty());
}

#[test]
fn hover_drives_manual_redraw_surfaces() {
    init_tracing();
    let mut backend = MemoryBackend::new();
    let mut surfaces = SurfaceManager::new();
    let settings = SurfaceSettings {
        manually_redraw: true,
        ..SurfaceSettings::default()
    };
    let id = spawn_surface(&mut surfaces, &mut backend, settings);

    // First frame consumes the initial pending request.
    surfaces.get_mut(id).unwrap().mark_visible(0.0);
    surfaces.tick_all(0.0, 0.016, &mut backend);
    assert_eq!(backend.log().borrow().draws.len(), 1);

    // No hover, no request: the surface stays as drawn.
    surfaces.get_mut(id).unwrap().mark_visible(0.1);
    surfaces.tick_all(0.1, 0.016, &mut backend);
    assert_eq!(backend.log().borrow().draws.len(), 1);

    // Hovering requests a redraw, which the next frame consumes.
    let mut router = InteractionRouter::new();
    let mut input = RecordingRouter::active();
    let scene = StaticScene::hit(hit_on(id, Vec2::new(0.5, 0.5)));
    router.tick(&scene, &mut surfaces, None, &mut input);

    surfaces.get_mut(id).unwrap().mark_visible(0.2);
    surfaces.tick_all(0.2, 0.016, &mut backend);
    assert_eq!(backend.log().borrow().draws.len(), 2);
}

#[test]
fn removed_surface_clears_hover_without_routing_to_it() {
    let mut backend = MemoryBackend::new();
    let mut surfaces = SurfaceManager::new();
    let id = spawn_surface(&mut surfaces, &mut backend, SurfaceSettings::default());

    let mut router = InteractionRouter::new();
    let mut input = RecordingRouter::active();
    let scene = StaticScene::hit(hit_on(id, Vec2::new(0.5, 0.5)));
    router.tick(&scene, &mut surfaces, None, &mut input);
    assert_eq!(router.hovered_surface(), Some(id));

    // The surface disappears but the scene still reports a stale hit.
    surfaces.remove(id);
    let changes = router.tick(&scene, &mut surfaces, None, &mut input);
    assert_eq!(router.hovered_surface(), None);
    assert_eq!(
        changes,
        vec![HoverChange::Surface {
            old: Some(id),
            new: None
        }]
    );
    // The follow-up move carried an empty path.
    assert_eq!(input.moves.last().unwrap().0, 0);
}

#[test]
fn keyboard_text_entry_reaches_the_focus_system() {
    let mut router = InteractionRouter::new();
    let mut input = RecordingRouter::active();

    router.press_and_release_key(InputKey::Enter, &mut input);
    router.send_chars("hi", false, &mut input);
    router.press_and_release_key(InputKey::Escape, &mut input);

    assert_eq!(input.key_downs.len(), 2);
    assert_eq!(input.key_ups.len(), 2);
    let typed: String = input.chars.iter().map(|c| c.character).collect();
    assert_eq!(typed, "hi");
}
