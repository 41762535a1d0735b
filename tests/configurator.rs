//! Scene configuration tests

use glam::{Quat, Vec3};
use model_viewer::config::{CameraSpec, DefaultToggles, LightKind, ModelFormat, ViewerConfig};
use model_viewer::configurator::{default_camera, DEFAULT_CAMERA_POSITION};
use model_viewer::scene::{Camera, Color, Light, Projection, Scene, SceneNode};
use model_viewer::{CameraSource, LoadedModel, SceneConfigurator};

fn model(cameras: Vec<Camera>, root: SceneNode) -> LoadedModel {
    LoadedModel {
        url: "/files/model.glb".into(),
        format: ModelFormat::Glb,
        root,
        materials: Vec::new(),
        cameras,
    }
}

fn embedded_camera() -> Camera {
    let mut camera = Camera::new(Projection::Perspective {
        fov_y: 0.8,
        aspect: 1.0,
        near: 0.05,
        far: 50.0,
    })
    .with_position(Vec3::new(0.0, 0.0, 5.0))
    .with_name("shot");
    camera.rotation = Quat::from_rotation_y(0.3);
    camera
}

fn configure(config: &ViewerConfig, model: &LoadedModel) -> (Scene, model_viewer::Configured) {
    let mut scene = Scene::new();
    scene.add_model(model.root.clone(), model.materials.clone());
    let configured = SceneConfigurator::new().configure(&mut scene, model, config, 16.0 / 9.0);
    (scene, configured)
}

#[test]
fn override_beats_embedded_camera() {
    let spec = CameraSpec::perspective(45.0, 0.5, 500.0)
        .with_position(Vec3::new(0.0, 2.0, 8.0))
        .with_rotation(Vec3::new(0.1, 0.0, 0.0));
    let config = ViewerConfig::from_url("/files/model.glb").with_camera(spec);
    let (_, configured) = configure(&config, &model(vec![embedded_camera()], SceneNode::new()));

    assert_eq!(configured.camera_source, CameraSource::Override);
    assert_eq!(configured.camera, Camera::from_spec(&spec, 16.0 / 9.0));
    assert_eq!(configured.camera.position, Vec3::new(0.0, 2.0, 8.0));
    assert!(configured.applied.contains(DefaultToggles::CAMERA_SETTINGS));
}

#[test]
fn orthographic_override_keeps_its_extents() {
    let spec = CameraSpec::orthographic(-4.0, 4.0, 3.0, -3.0, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 0.0, 20.0));
    let config = ViewerConfig::from_url("/files/model.glb").with_camera(spec);
    let (_, configured) = configure(&config, &model(vec![embedded_camera()], SceneNode::new()));

    assert_eq!(configured.camera_source, CameraSource::Override);
    assert_eq!(
        configured.camera.projection,
        Projection::Orthographic {
            left: -4.0,
            right: 4.0,
            bottom: -3.0,
            top: 3.0,
            near: 0.1,
            far: 100.0,
        }
    );
    assert_eq!(configured.camera.projection.aspect(), None);
    assert_eq!(configured.camera.position, Vec3::new(0.0, 0.0, 20.0));
}

#[test]
fn embedded_camera_used_verbatim() {
    let config = ViewerConfig::from_url("/files/model.glb");
    let embedded = embedded_camera();
    let cameras = vec![embedded.clone(), Camera::default()];
    let (_, configured) = configure(&config, &model(cameras, SceneNode::new()));

    assert_eq!(configured.camera_source, CameraSource::Embedded);
    assert_eq!(configured.camera.position, embedded.position);
    assert_eq!(configured.camera.rotation, embedded.rotation);
    assert_eq!(configured.camera.name.as_deref(), Some("shot"));
    assert_eq!(configured.camera.projection.near(), 0.05);
    assert_eq!(configured.camera.projection.far(), 50.0);
    assert!(!configured.applied.contains(DefaultToggles::CAMERA_SETTINGS));
}

#[test]
fn default_camera_when_nothing_else() {
    let config = ViewerConfig::from_url("/files/model.glb");
    let (_, configured) = configure(&config, &model(Vec::new(), SceneNode::new()));

    assert_eq!(configured.camera_source, CameraSource::Default);
    assert_eq!(configured.camera, default_camera(16.0 / 9.0));
    assert_eq!(configured.camera.position, DEFAULT_CAMERA_POSITION);
    assert_eq!(configured.camera.projection.near(), 0.1);
    assert!(!configured.applied.contains(DefaultToggles::CAMERA_SETTINGS));
}

#[test]
fn unlit_model_gets_ambient_light() {
    let config = ViewerConfig::from_url("/files/model.glb");
    let (scene, configured) = configure(&config, &model(Vec::new(), SceneNode::new()));

    let lights = scene.lights();
    assert_eq!(lights.len(), 1);
    assert!(matches!(lights[0].0, Light::Ambient(_)));
    assert!(configured.applied.contains(DefaultToggles::DEFAULT_LIGHTS));
}

#[test]
fn nested_model_light_suppresses_default() {
    let lamp = SceneNode::new().with_light(Light::from_kind(LightKind::Point));
    let root = SceneNode::new().with_children(vec![SceneNode::new().with_children(vec![lamp])]);
    let config = ViewerConfig::from_url("/files/model.glb");
    let (scene, configured) = configure(&config, &model(Vec::new(), root));

    assert_eq!(scene.lights().len(), 1);
    assert!(matches!(scene.lights()[0].0, Light::Point(_)));
    assert!(!configured.applied.contains(DefaultToggles::DEFAULT_LIGHTS));
}

#[test]
fn light_override_installs_exactly_that_kind() {
    for kind in LightKind::ALL {
        let config = ViewerConfig::from_url("/files/model.glb").with_light(kind);
        let (scene, _) = configure(&config, &model(Vec::new(), SceneNode::new()));
        let kinds: Vec<LightKind> = scene.lights().iter().map(|(l, _)| l.kind()).collect();
        assert_eq!(kinds, vec![kind]);
    }
}

#[test]
fn environment_and_background() {
    let config = ViewerConfig::from_url("/files/model.glb")
        .with_environment_lighting(true)
        .with_background(Color::from_hex(0x336699));
    let (scene, configured) = configure(&config, &model(Vec::new(), SceneNode::new()));

    assert!(scene.environment.is_some());
    assert_eq!(scene.background, Color::from_hex(0x336699));
    assert!(configured.applied.contains(
        DefaultToggles::ROOM_ENVIRONMENT
            | DefaultToggles::BACKGROUND_COLOR
            | DefaultToggles::DEFAULT_LIGHTS
    ));
    // Environment lighting does not replace the ambient fallback
    assert_eq!(scene.lights().len(), 1);
}

#[test]
fn background_defaults_to_dark() {
    let config = ViewerConfig::from_url("/files/model.glb");
    let (scene, configured) = configure(&config, &model(Vec::new(), SceneNode::new()));
    assert_eq!(scene.background, model_viewer::config::DEFAULT_BACKGROUND);
    assert!(scene.environment.is_none());
    assert!(!configured.applied.contains(DefaultToggles::BACKGROUND_COLOR));
}
