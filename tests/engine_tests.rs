//! Engine end-to-end tests
//!
//! Tests for:
//! - The unit cube scenario: load, build, render, ray cast, pick
//! - Diagnostic routing (precondition warnings vs. plain failures)
//! - Option table and statistics
//! - Overlays and the render backend hook
//! - Clear and release

use std::cell::RefCell;
use std::rc::Rc;

use arbor::{
    Engine, EngineOption, EngineOptions, EngineStat, LogLevel, MeshParam, NodeFlags, NodeHandle, NodeParam, NodeType,
    RenderBackend, RenderQueue, ResFlags, ResHandle, ResourceType,
};
use glam::{Vec3, Vec4};

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const CUBE: &str = r#"{
    "positions": [
        [-1,-1,-1],[1,-1,-1],[1,1,-1],[-1,1,-1],
        [-1,-1, 1],[1,-1, 1],[1,1, 1],[-1,1, 1]
    ],
    "indices": [
        4,5,6, 4,6,7,
        1,0,3, 1,3,2,
        5,1,2, 5,2,6,
        0,4,7, 0,7,3,
        7,6,2, 7,2,3,
        0,1,5, 0,5,4
    ]
}"#;

const PIPELINE: &str = r#"{"stages": [{"name": "geometry"}, {"name": "lighting"}]}"#;

struct CubeScene {
    engine: Engine,
    geometry: ResHandle,
    model: NodeHandle,
    mesh: NodeHandle,
    camera: NodeHandle,
}

fn drain(engine: &mut Engine) {
    while engine.get_message().is_some() {}
}

fn cube_scene() -> CubeScene {
    init_logging();
    let mut engine = Engine::new(EngineOptions::default());

    let geometry = engine
        .add_resource(ResourceType::Geometry, "cube.geo", ResFlags::empty())
        .unwrap();
    assert!(engine.load_resource(geometry, Some(CUBE.as_bytes())));
    let material = engine
        .add_resource(ResourceType::Material, "cube.mat", ResFlags::empty())
        .unwrap();
    let pipeline = engine
        .add_resource(ResourceType::Pipeline, "forward.pipeline", ResFlags::empty())
        .unwrap();
    assert!(engine.load_resource(pipeline, Some(PIPELINE.as_bytes())));

    let model = engine.add_model(NodeHandle::ROOT, "cube", geometry).unwrap();
    let mesh = engine.add_mesh(model, "cube_mesh", material, 0, 36, 0, 7).unwrap();
    let camera = engine.add_camera(NodeHandle::ROOT, "camera", pipeline).unwrap();
    assert!(engine.set_node_transform(camera, Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::ONE));
    assert!(engine.setup_camera_view(camera, 45.0, 1.0, 0.1, 100.0));

    drain(&mut engine);
    CubeScene {
        engine,
        geometry,
        model,
        mesh,
        camera,
    }
}

// ============================================================================
// Cube Scenario
// ============================================================================

#[test]
fn cube_renders_twelve_triangles() {
    let mut s = cube_scene();

    let queue = s.engine.render(s.camera).unwrap();
    assert_eq!(queue.meshes.len(), 1);
    assert_eq!(queue.meshes[0].node, s.mesh);
    assert_eq!(queue.meshes[0].geometry, s.geometry);
    assert_eq!(queue.triangle_count(), 12);

    assert!(approx_eq(s.engine.get_stat(EngineStat::TriCount, true), 12.0));
    assert!(approx_eq(s.engine.get_stat(EngineStat::BatchCount, false), 1.0));
    assert!(approx_eq(s.engine.get_stat(EngineStat::TriCount, false), 0.0));
    assert!(s.engine.get_stat(EngineStat::GeometryVMem, false) > 0.0);
}

#[test]
fn cube_aabb_follows_model_transform() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_transform(s.model, Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO, Vec3::splat(2.0)));

    let aabb = s.engine.node_aabb(s.model).unwrap();
    assert!(approx_eq(aabb.min.x, 1.0));
    assert!(approx_eq(aabb.max.x, 5.0));
    assert!(approx_eq(aabb.max.y, 2.0));
}

#[test]
fn cube_ray_cast_reports_front_face() {
    let s = cube_scene();

    let hits = s
        .engine
        .cast_ray(NodeHandle::ROOT, Vec3::new(0.3, -0.2, 10.0), Vec3::new(0.0, 0.0, -20.0), 0);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node, s.mesh);
    assert!(approx_eq(hits[0].distance, 9.0));
    assert!(approx_eq(hits[0].point.z, 1.0));

    // Too short to reach the cube.
    let hits = s
        .engine
        .cast_ray(NodeHandle::ROOT, Vec3::new(0.3, -0.2, 10.0), Vec3::new(0.0, 0.0, -5.0), 0);
    assert!(hits.is_empty());
}

#[test]
fn cube_ray_cast_skips_no_ray_query_subtrees() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_flags(s.model, NodeFlags::NO_RAY_QUERY, true));

    let hits = s
        .engine
        .cast_ray(NodeHandle::ROOT, Vec3::new(0.3, -0.2, 10.0), Vec3::new(0.0, 0.0, -20.0), 0);
    assert!(hits.is_empty());
}

#[test]
fn cube_pick_hits_mesh() {
    let s = cube_scene();

    assert_eq!(s.engine.pick_node(s.camera, 0.52, 0.47), Some(s.mesh));
    assert_eq!(s.engine.pick_node(s.camera, 0.02, 0.98), None);

    let (origin, dir) = s.engine.pick_ray(s.camera, 0.5, 0.5).unwrap();
    assert!(approx_eq(origin.x, 0.0));
    assert!(dir.z < 0.0);
}

#[test]
fn cube_visibility_and_culling() {
    let mut s = cube_scene();

    assert_eq!(s.engine.check_node_visibility(s.mesh, s.camera, false, false), Some(0));

    // Behind the camera.
    assert!(s.engine.set_node_transform(s.model, Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, Vec3::ONE));
    assert_eq!(s.engine.check_node_visibility(s.mesh, s.camera, false, false), None);
    let queue = s.engine.render(s.camera).unwrap();
    assert!(queue.meshes.is_empty());
}

#[test]
fn cube_occlusion_feedback() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_param_i(s.camera, NodeParam::Camera(arbor::CameraParam::OcclusionCulling), 1));
    assert!(s.engine.set_occlusion_result(s.camera, s.model, true));

    assert_eq!(s.engine.check_node_visibility(s.mesh, s.camera, true, false), None);
    assert_eq!(s.engine.check_node_visibility(s.mesh, s.camera, false, false), Some(0));
    assert!(s.engine.render(s.camera).unwrap().meshes.is_empty());

    assert!(s.engine.set_occlusion_result(s.camera, s.model, false));
    assert_eq!(s.engine.render(s.camera).unwrap().meshes.len(), 1);
}

#[test]
fn cube_lod_selects_mesh() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_param_f(s.model, NodeParam::Model(arbor::ModelParam::LodDist1), 0, 3.0));

    // Distance 5 is past the first LOD switch.
    assert_eq!(s.engine.check_node_visibility(s.mesh, s.camera, false, true), Some(1));
    assert!(s.engine.render(s.camera).unwrap().meshes.is_empty());

    assert!(s.engine.set_node_param_i(s.mesh, NodeParam::Mesh(MeshParam::LodLevel), 1));
    assert_eq!(s.engine.render(s.camera).unwrap().meshes.len(), 1);
}

#[test]
fn removed_nodes_do_not_stay_occluded() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_param_i(s.camera, NodeParam::Camera(arbor::CameraParam::OcclusionCulling), 1));
    assert!(s.engine.set_occlusion_result(s.camera, s.model, true));
    assert!(s.engine.set_occlusion_result(s.camera, s.mesh, true));
    assert!(s.engine.remove_node(s.model));

    let material = s.engine.find_resource(ResourceType::Material, "cube.mat").unwrap();
    let model = s.engine.add_model(NodeHandle::ROOT, "cube2", s.geometry).unwrap();
    let mesh = s.engine.add_mesh(model, "cube2_mesh", material, 0, 36, 0, 7).unwrap();
    // Both freed handles are reused.
    let mut reused = [model.raw(), mesh.raw()];
    let mut old = [s.model.raw(), s.mesh.raw()];
    reused.sort_unstable();
    old.sort_unstable();
    assert_eq!(reused, old);

    assert_eq!(s.engine.check_node_visibility(mesh, s.camera, true, false), Some(0));
    assert_eq!(s.engine.render(s.camera).unwrap().meshes.len(), 1);
}

#[test]
fn render_needs_loaded_pipeline() {
    init_logging();
    let mut engine = Engine::default();
    let pipeline = engine
        .add_resource(ResourceType::Pipeline, "unloaded.pipeline", ResFlags::empty())
        .unwrap();
    let camera = engine.add_camera(NodeHandle::ROOT, "cam", pipeline).unwrap();
    drain(&mut engine);

    assert!(engine.render(camera).is_err());
    // Missing data is an operational failure.
    assert!(engine.get_message().is_none());

    // A non-camera node is a precondition violation.
    assert!(engine.render(NodeHandle::ROOT).is_err());
    assert_eq!(engine.get_message().map(|m| m.level), Some(LogLevel::Warning));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn invalid_handles_queue_warnings() {
    let mut s = cube_scene();
    let bogus = NodeHandle::from_raw(9999);

    assert!(!s.engine.set_node_transform(bogus, Vec3::ZERO, Vec3::ZERO, Vec3::ONE));
    assert!(!s.engine.remove_node(NodeHandle::ROOT));
    assert!(s.engine.add_group(bogus, "orphan").is_none());

    let mut warnings = 0;
    while let Some(msg) = s.engine.get_message() {
        assert_eq!(msg.level, LogLevel::Warning);
        warnings += 1;
    }
    assert_eq!(warnings, 3);
}

#[test]
fn accessors_return_none_silently() {
    let mut s = cube_scene();
    let bogus = NodeHandle::from_raw(9999);

    assert!(s.engine.node_transform(bogus).is_none());
    assert!(s.engine.node_parent(bogus).is_none());
    assert!(s.engine.node_type(bogus).is_none());
    assert!(s.engine.get_node_param_str(bogus, NodeParam::Name).is_none());
    assert!(s.engine.get_message().is_none());
}

#[test]
fn message_level_filter() {
    let mut s = cube_scene();
    assert!(s.engine.set_option(EngineOption::MaxLogLevel, 1.0));

    assert!(!s.engine.remove_node(NodeHandle::ROOT));
    assert!(s.engine.get_message().is_none());
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn option_table_round_trip() {
    let mut engine = Engine::default();
    assert!(engine.set_option(EngineOption::ShadowMapSize, 2048.0));
    assert!(approx_eq(engine.get_option(EngineOption::ShadowMapSize), 2048.0));
    assert_eq!(engine.options().shadow_map_size, 2048);

    assert!(!engine.set_option(EngineOption::SampleCount, 3.0));
    assert!(approx_eq(engine.get_option(EngineOption::SampleCount), 0.0));
}

#[test]
fn options_from_json_configure_engine() -> anyhow::Result<()> {
    let options = EngineOptions::from_json(r#"{ "max_num_messages": 2, "load_textures": false }"#)?;
    let mut engine = Engine::new(options);
    drain(&mut engine);

    let tex = engine
        .add_resource(ResourceType::Texture, "skipped.tex", ResFlags::empty())
        .ok_or_else(|| anyhow::anyhow!("texture not added"))?;
    assert!(engine.load_resource(tex, Some(br#"{"width": 1, "height": 1}"#)));
    // Texture data is skipped and the texture no longer asks for any.
    assert!(!engine.is_resource_loaded(tex));
    assert!(engine.query_unloaded_resource(0).is_none());

    for _ in 0..5 {
        engine.remove_node(NodeHandle::ROOT);
    }
    assert!(engine.get_message().is_some());
    assert!(engine.get_message().is_some());
    assert!(engine.get_message().is_none());
    Ok(())
}

// ============================================================================
// Frame Session
// ============================================================================

#[derive(Default)]
struct Recorder {
    submitted: Vec<(NodeHandle, usize, usize)>,
    frames: usize,
}

struct RecordingBackend(Rc<RefCell<Recorder>>);

impl RenderBackend for RecordingBackend {
    fn submit(&mut self, queue: &RenderQueue) {
        self.0
            .borrow_mut()
            .submitted
            .push((queue.camera, queue.meshes.len(), queue.overlays.len()));
    }

    fn finalize_frame(&mut self) {
        self.0.borrow_mut().frames += 1;
    }
}

#[test]
fn backend_receives_queues_and_frames() {
    let mut s = cube_scene();
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    s.engine.set_backend(Box::new(RecordingBackend(recorder.clone())));

    let overlay_mat = s
        .engine
        .add_resource(ResourceType::Material, "hud.mat", ResFlags::empty())
        .unwrap();
    let quad = [[0.0, 0.0, 0.0, 1.0], [0.0, 0.1, 0.0, 0.0], [0.1, 0.1, 1.0, 0.0], [0.1, 0.0, 1.0, 1.0]];
    assert!(s.engine.show_overlays(&quad, Vec4::new(1.0, 0.0, 0.0, 1.0), overlay_mat, 0));

    s.engine.render(s.camera).unwrap();
    s.engine.finalize_frame();
    s.engine.render(s.camera).unwrap();

    let rec = recorder.borrow();
    assert_eq!(rec.submitted, vec![(s.camera, 1, 1), (s.camera, 1, 0)]);
    assert_eq!(rec.frames, 1);
}

#[test]
fn overlays_require_material() {
    let mut s = cube_scene();
    let quad = [[0.0, 0.0, 0.0, 0.0]; 4];
    assert!(!s.engine.show_overlays(&quad, Vec4::ONE, s.geometry, 0));
    assert_eq!(s.engine.get_message().map(|m| m.level), Some(LogLevel::Warning));
}

#[test]
fn queue_collects_lights_and_emitters() {
    let mut s = cube_scene();
    let light = s
        .engine
        .add_light(NodeHandle::ROOT, "lamp", ResHandle::NONE, "LIGHTING", "SHADOWMAP")
        .unwrap();
    assert!(s.engine.set_node_param_f(light, NodeParam::Light(arbor::LightParam::ColorMultiplier), 0, 2.0));
    assert!(s.engine.set_node_transform(light, Vec3::new(0.0, 3.0, 0.0), Vec3::new(-90.0, 0.0, 0.0), Vec3::ONE));

    let effect = s
        .engine
        .add_resource(ResourceType::ParticleEffect, "smoke.effect", ResFlags::empty())
        .unwrap();
    assert!(s.engine.load_resource(effect, Some(br#"{"life_min": 5.0, "life_max": 5.0}"#)));
    let material = s.engine.find_resource(ResourceType::Material, "cube.mat").unwrap();
    let emitter = s
        .engine
        .add_emitter(NodeHandle::ROOT, "smoke", material, effect, 8, -1)
        .unwrap();
    assert!(s.engine.set_node_param_f(emitter, NodeParam::Emitter(arbor::EmitterParam::EmissionRate), 0, 4.0));

    // Nothing alive yet.
    let queue = s.engine.render(s.camera).unwrap();
    assert_eq!(queue.lights.len(), 1);
    assert!(queue.emitters.is_empty());

    let draw = &queue.lights[0];
    assert_eq!(draw.node, light);
    assert!(approx_eq(draw.color.x, 2.0));
    assert!(approx_eq(draw.position.y, 3.0));
    assert!(approx_eq(draw.direction.y, -1.0));

    assert!(s.engine.advance_emitter_time(emitter, 1.0));
    assert!(s.engine.advance_emitter_time(emitter, 0.1));
    let queue = s.engine.render(s.camera).unwrap();
    assert_eq!(queue.emitters.len(), 1);
    assert_eq!(queue.emitters[0].alive_particles, 4);
    assert_eq!(s.engine.get_stat(EngineStat::LightPassCount, false), 2.0);
}

#[test]
fn no_draw_hides_only_the_node() {
    let mut s = cube_scene();
    assert!(s.engine.set_node_flags(s.model, NodeFlags::NO_DRAW, false));
    assert_eq!(s.engine.render(s.camera).unwrap().meshes.len(), 1);

    assert!(s.engine.set_node_flags(s.mesh, NodeFlags::NO_DRAW, false));
    assert!(s.engine.render(s.camera).unwrap().meshes.is_empty());
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn clear_keeps_only_root() {
    let mut s = cube_scene();
    s.engine.clear();

    assert_eq!(s.engine.scene().len(), 1);
    assert_eq!(s.engine.node_type(NodeHandle::ROOT), Some(NodeType::Group));
    assert!(s.engine.resources().is_empty());
    assert!(s.engine.node_type(s.camera).is_none());
    assert!(s.engine.find_resource(ResourceType::Geometry, "cube.geo").is_none());
}

#[test]
fn release_consumes_engine() {
    let s = cube_scene();
    s.engine.release();
}
