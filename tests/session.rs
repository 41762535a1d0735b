//! End-to-end viewer session tests

mod common;

use std::rc::Rc;
use std::time::Duration;

use approx::assert_relative_eq;
use common::{
    external_buffer_gltf, glb_bytes, gltf_json, obj_archive, wide_triangle_bytes, NeverSource,
    BOX_OBJ,
};
use glam::Vec3;
use model_viewer::asset::{NoProgress, ProgressLog, ProgressSink};
use model_viewer::config::DefaultToggles;
use model_viewer::resources::{TextureChannel, TextureSlot};
use model_viewer::scene::Projection;
use model_viewer::RenderBackend;
use model_viewer::{
    AssetLoader, CameraSource, CameraSpec, Container, FrameStatus, HeadlessBackend,
    HeadlessContainer, LoadError, MemorySource, NormalizeOutcome, SessionState, ViewerConfig,
    ViewerError, ViewerSession,
};

type Session = ViewerSession<HeadlessContainer, HeadlessBackend>;

fn session(container: &HeadlessContainer, config: ViewerConfig) -> Session {
    ViewerSession::new(container.clone(), HeadlessBackend::default(), config).unwrap()
}

fn no_progress() -> Rc<dyn ProgressSink> {
    Rc::new(NoProgress)
}

fn obj_source() -> MemorySource {
    MemorySource::new()
        .with("/m/a.obj", BOX_OBJ.as_bytes().to_vec())
        .with("/m/a.zip", obj_archive())
}

#[test]
fn second_session_on_same_container_is_rejected() {
    let container = HeadlessContainer::new(800, 600);
    let _first = session(&container, ViewerConfig::from_url("/m/a.obj"));
    let mutations = container.mutations();

    let second = ViewerSession::new(
        container.clone(),
        HeadlessBackend::default(),
        ViewerConfig::from_url("/m/a.obj"),
    );
    assert!(matches!(second, Err(ViewerError::DuplicateSession)));
    assert_eq!(container.mutations(), mutations);
    assert!(container.is_loaded());
    assert!(container.has_surface());
}

#[test]
fn obj_with_archive_binds_textures() {
    let container = HeadlessContainer::new(800, 600);
    let config = ViewerConfig::from_url("/m/a.obj").with_materials_archive("/m/a.zip");
    let mut session = session(&container, config);
    let loader = AssetLoader::new(obj_source());

    pollster::block_on(session.load(&loader, no_progress())).unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let scene = session.scene();
    assert_eq!(scene.materials.len(), 1);
    let texture = scene.materials[0]
        .texture(TextureChannel::Diffuse)
        .and_then(TextureSlot::texture)
        .cloned()
        .expect("diffuse texture bound");
    assert_eq!(scene.nodes[0].children[0].meshes[0].material, Some(0));
    assert!(!texture.is_resident());

    assert_eq!(
        session.frame(1.0 / 60.0).unwrap(),
        FrameStatus::Rendered { resized: false }
    );
    assert_eq!(session.state(), SessionState::Rendering);
    assert!(texture.is_resident());
    assert_eq!(texture.cpu_bytes(), 0);
    assert_eq!(session.backend().last_frame().unwrap().draw_calls, 1);
}

#[test]
fn obj_is_normalized_and_defaults_applied() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    let loader = AssetLoader::new(obj_source());

    pollster::block_on(session.load(&loader, no_progress())).unwrap();

    let Some(NormalizeOutcome::Normalized { scale, .. }) = session.normalize_outcome() else {
        panic!("OBJ models are normalized");
    };
    assert_relative_eq!(scale, 0.75);
    let bounds = session.scene().bounds();
    assert_relative_eq!(bounds.size().max_element(), 3.0, epsilon = 1e-4);

    // No archive: the model loads with default materials
    assert!(session.scene().materials.is_empty());
    assert_eq!(session.scene().nodes[0].children[0].meshes[0].material, None);

    assert_eq!(session.camera_source(), Some(CameraSource::Default));
    assert_eq!(session.applied_defaults(), DefaultToggles::DEFAULT_LIGHTS);
}

#[test]
fn resize_follows_container_and_keeps_pose() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();
    session.frame(0.016).unwrap();

    let pose = session.camera().map(|c| (c.position, c.rotation)).unwrap();
    container.set_display_size(400, 300);
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: true }
    );

    let camera = session.camera().unwrap();
    assert_relative_eq!(camera.projection.aspect().unwrap(), 4.0 / 3.0);
    assert_eq!((camera.position, camera.rotation), pose);
    assert_eq!(session.backend().surface_size(), (400, 300));
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: false }
    );

    // A collapsed container is not a resize
    container.set_display_size(0, 0);
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: false }
    );
    assert_eq!(session.backend().resizes().last(), Some(&(400, 300)));
}

#[test]
fn steady_size_leaves_surface_alone() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    assert_eq!(container.surface_size(), (800, 600));
    assert_eq!(container.surface_resizes(), 1);

    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();
    for _ in 0..5 {
        session.frame(0.016).unwrap();
    }
    assert_eq!(container.surface_resizes(), 1);

    container.set_display_size(640, 480);
    session.frame(0.016).unwrap();
    session.frame(0.016).unwrap();
    assert_eq!(container.surface_resizes(), 2);
    assert_eq!(container.surface_size(), (640, 480));
}

#[test]
fn window_resize_applies_without_a_frame() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();

    container.set_display_size(400, 300);
    session.on_window_resize();

    assert!(session.backend().frames().is_empty());
    assert_eq!(session.backend().surface_size(), (400, 300));
    assert_eq!(container.surface_size(), (400, 300));
    let aspect = session.camera().and_then(|c| c.projection.aspect()).unwrap();
    assert_relative_eq!(aspect, 4.0 / 3.0);

    // Already applied, so the next frame has nothing to resize
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: false }
    );
}

#[test]
fn progress_ends_with_empty_text() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    let log = Rc::new(ProgressLog::new());

    pollster::block_on(session.load(&AssetLoader::new(obj_source()), log.clone())).unwrap();

    let reports = log.reports();
    assert_eq!(log.last().as_deref(), Some(""));
    assert_eq!(reports.iter().filter(|r| r.is_empty()).count(), 1, "{reports:?}");
    assert!(reports.iter().all(|r| r.is_empty() || r.ends_with('%')));
}

#[test]
fn stalled_fetch_times_out() {
    let container = HeadlessContainer::new(800, 600);
    let config =
        ViewerConfig::from_url("/m/a.glb").with_load_timeout(Some(Duration::from_millis(50)));
    let mut session = session(&container, config);

    let result = pollster::block_on(session.load(&AssetLoader::new(NeverSource), no_progress()));
    assert!(matches!(
        result,
        Err(ViewerError::Load(LoadError::TimedOut(after))) if after == Duration::from_millis(50)
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.frame(0.016).unwrap(), FrameStatus::NotReady);
}

#[test]
fn cancelled_session_does_not_load() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    session.cancel_handle().cancel();

    let result = pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress()));
    assert!(matches!(result, Err(ViewerError::Load(LoadError::Cancelled))));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn cancelled_token_refuses_every_later_load() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    let loader = AssetLoader::new(obj_source());
    session.cancel_handle().cancel();

    for _ in 0..2 {
        let result = pollster::block_on(session.load(&loader, no_progress()));
        assert!(matches!(result, Err(ViewerError::Load(LoadError::Cancelled))));
        assert_eq!(session.state(), SessionState::Failed);
    }
    assert_eq!(session.frame(0.016).unwrap(), FrameStatus::NotReady);
}

#[test]
fn cancelling_after_load_keeps_rendering() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();

    session.cancel_handle().cancel();
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: false }
    );
    assert!(container.is_loaded());
}

#[test]
fn missing_model_fails_and_can_retry() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    let empty = AssetLoader::new(MemorySource::new());

    let result = pollster::block_on(session.load(&empty, no_progress()));
    assert!(matches!(result, Err(ViewerError::Load(LoadError::Source(_)))));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.frame(0.016).unwrap(), FrameStatus::NotReady);
    assert!(session.backend().frames().is_empty());

    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    // Loading twice is a state error
    let again = pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress()));
    assert!(matches!(again, Err(ViewerError::InvalidState { .. })));
}

#[test]
fn gltf_embedded_camera_is_used_as_is() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/scene.gltf"));
    let source = MemorySource::new().with("/m/scene.gltf", gltf_json(true, false));

    pollster::block_on(session.load(&AssetLoader::new(source), no_progress())).unwrap();

    assert_eq!(session.camera_source(), Some(CameraSource::Embedded));
    assert_eq!(session.normalize_outcome(), None);
    let camera = session.camera().unwrap();
    assert_relative_eq!(camera.position.z, 5.0);
    assert_relative_eq!(camera.projection.near(), 0.05);
    assert!(session
        .applied_defaults()
        .contains(DefaultToggles::DEFAULT_LIGHTS));
}

#[test]
fn glb_loads_from_binary_chunk() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/wide.glb"));
    let source = MemorySource::new().with("/m/wide.glb", glb_bytes());

    pollster::block_on(session.load(&AssetLoader::new(source), no_progress())).unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.normalize_outcome(), None);
    let bounds = session.scene().bounds();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::new(4.0, 2.0, 0.0));
}

#[test]
fn gltf_external_buffer_is_fetched_next_to_document() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/ext.gltf"));
    let source = MemorySource::new()
        .with("/m/ext.gltf", external_buffer_gltf())
        .with("/m/bufs/data.bin", wide_triangle_bytes());

    pollster::block_on(session.load(&AssetLoader::new(source), no_progress())).unwrap();

    let bounds = session.scene().bounds();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::new(4.0, 2.0, 0.0));
}

#[test]
fn gltf_missing_external_buffer_fails() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/ext.gltf"));
    let source = MemorySource::new().with("/m/ext.gltf", external_buffer_gltf());

    let result = pollster::block_on(session.load(&AssetLoader::new(source), no_progress()));
    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn orthographic_override_survives_resize() {
    let container = HeadlessContainer::new(800, 600);
    let spec = CameraSpec::orthographic(-2.0, 2.0, 1.5, -1.5, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 0.0, 10.0));
    let config = ViewerConfig::from_url("/m/scene.gltf").with_camera(spec);
    let mut session = session(&container, config);
    let source = MemorySource::new().with("/m/scene.gltf", gltf_json(true, false));

    pollster::block_on(session.load(&AssetLoader::new(source), no_progress())).unwrap();
    assert_eq!(session.camera_source(), Some(CameraSource::Override));

    let expected = Projection::Orthographic {
        left: -2.0,
        right: 2.0,
        bottom: -1.5,
        top: 1.5,
        near: 0.1,
        far: 100.0,
    };
    assert_eq!(session.camera().unwrap().projection, expected);

    container.set_display_size(300, 600);
    assert_eq!(
        session.frame(0.016).unwrap(),
        FrameStatus::Rendered { resized: true }
    );
    let camera = session.camera().unwrap();
    assert_eq!(camera.projection, expected);
    assert_eq!(camera.position, Vec3::new(0.0, 0.0, 10.0));
}

#[test]
fn gltf_lights_suppress_default_light() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/scene.gltf"));
    let source = MemorySource::new().with("/m/scene.gltf", gltf_json(false, true));

    pollster::block_on(session.load(&AssetLoader::new(source), no_progress())).unwrap();

    assert_eq!(session.camera_source(), Some(CameraSource::Default));
    assert!(!session
        .applied_defaults()
        .contains(DefaultToggles::DEFAULT_LIGHTS));
    assert_eq!(session.scene().lights().len(), 1);
}

#[test]
fn shutdown_stops_frames_and_releases_container() {
    let container = HeadlessContainer::new(800, 600);
    let mut session = session(&container, ViewerConfig::from_url("/m/a.obj"));
    pollster::block_on(session.load(&AssetLoader::new(obj_source()), no_progress())).unwrap();
    session.frame(0.016).unwrap();

    session.shutdown();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.frame(0.016).unwrap(), FrameStatus::Stopped);
    assert!(!container.is_loaded());
    assert!(!container.has_surface());
    assert_eq!(session.backend().frames().len(), 1);

    // The container can host a new viewer
    let next = ViewerSession::new(
        container.clone(),
        HeadlessBackend::default(),
        ViewerConfig::from_url("/m/a.obj"),
    );
    assert!(next.is_ok());
}
