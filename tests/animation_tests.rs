//! Animation tests
//!
//! Tests for:
//! - Layer weight cascade between animation stages
//! - Additive stages
//! - Start-node scoping
//! - Interpolation vs. fast animation
//! - Morph target weights

use arbor::{Engine, EngineOption, NodeHandle, ResFlags, ResHandle, ResourceType};
use glam::Vec3;

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

const RIG: &str = r#"{
    "positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2],
    "joints": [{"name": "hip"}, {"name": "knee"}],
    "morph_targets": [
        {"name": "blink", "vertices": [0], "offsets": [[0,0.1,0]]},
        {"name": "smile", "vertices": [1], "offsets": [[0.1,0,0]]}
    ]
}"#;

fn pose_anim(x: f32) -> String {
    format!(
        r#"{{"entities": [
            {{"name": "hip", "frames": [{{"translation": [{x},0,0]}}]}},
            {{"name": "knee", "frames": [{{"translation": [{x},0,0]}}]}}
        ]}}"#
    )
}

const STRIDE: &str = r#"{"entities": [
    {"name": "hip", "frames": [{"translation": [0,0,0]}, {"translation": [2,0,0]}]}
]}"#;

struct Rig {
    engine: Engine,
    model: NodeHandle,
    hip: NodeHandle,
    knee: NodeHandle,
}

fn rig() -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = Engine::default();
    let geo = engine
        .add_resource(ResourceType::Geometry, "rig.geo", ResFlags::empty())
        .unwrap();
    assert!(engine.load_resource(geo, Some(RIG.as_bytes())));
    let model = engine.add_model(NodeHandle::ROOT, "rig", geo).unwrap();
    let hip = engine.add_joint(model, "hip", 0).unwrap();
    let knee = engine.add_joint(hip, "knee", 1).unwrap();
    Rig {
        engine,
        model,
        hip,
        knee,
    }
}

fn anim(engine: &mut Engine, name: &str, data: &str) -> ResHandle {
    let h = engine
        .add_resource(ResourceType::Animation, name, ResFlags::empty())
        .unwrap();
    assert!(engine.load_resource(h, Some(data.as_bytes())));
    h
}

fn local_x(engine: &Engine, node: NodeHandle) -> f32 {
    engine.node_transform(node).unwrap().0.x
}

// ============================================================================
// Layer Cascade
// ============================================================================

#[test]
fn upper_layer_leaves_residual_to_lower_layer() {
    let mut r = rig();
    let a = anim(&mut r.engine, "a.anim", &pose_anim(10.0));
    let b = anim(&mut r.engine, "b.anim", &pose_anim(20.0));
    let base = anim(&mut r.engine, "base.anim", &pose_anim(0.0));

    assert!(r.engine.setup_model_anim_stage(r.model, 0, a, 1, "", false));
    assert!(r.engine.setup_model_anim_stage(r.model, 1, b, 1, "", false));
    assert!(r.engine.setup_model_anim_stage(r.model, 2, base, 0, "", false));
    assert!(r.engine.set_model_anim_params(r.model, 0, 0.0, 0.3));
    assert!(r.engine.set_model_anim_params(r.model, 1, 0.0, 0.3));
    assert!(r.engine.set_model_anim_params(r.model, 2, 0.0, 1.0));
    r.engine.update_animations();

    // 0.3 * 10 + 0.3 * 20 + 0.4 * 0
    assert!(approx_eq(local_x(&r.engine, r.hip), 9.0));
}

#[test]
fn saturated_upper_layer_starves_lower_layer() {
    let mut r = rig();
    let a = anim(&mut r.engine, "a.anim", &pose_anim(10.0));
    let b = anim(&mut r.engine, "b.anim", &pose_anim(20.0));
    let base = anim(&mut r.engine, "base.anim", &pose_anim(100.0));

    r.engine.setup_model_anim_stage(r.model, 0, a, 2, "", false);
    r.engine.setup_model_anim_stage(r.model, 1, b, 2, "", false);
    r.engine.setup_model_anim_stage(r.model, 2, base, 1, "", false);
    r.engine.set_model_anim_params(r.model, 0, 0.0, 0.8);
    r.engine.set_model_anim_params(r.model, 1, 0.0, 0.8);
    r.engine.set_model_anim_params(r.model, 2, 0.0, 1.0);
    r.engine.update_animations();

    assert!(approx_eq(local_x(&r.engine, r.hip), 15.0));
}

#[test]
fn stage_index_is_bounded() {
    let mut r = rig();
    let a = anim(&mut r.engine, "a.anim", &pose_anim(1.0));
    assert!(!r.engine.setup_model_anim_stage(r.model, 16, a, 0, "", false));
    assert!(!r.engine.set_model_anim_params(r.model, 16, 0.0, 1.0));
    assert!(!r.engine.setup_model_anim_stage(r.hip, 0, a, 0, "", false));
}

// ============================================================================
// Additive & Scope
// ============================================================================

#[test]
fn additive_needs_a_base_pose() {
    let mut r = rig();
    let raise = anim(
        &mut r.engine,
        "raise.anim",
        r#"{"entities": [{"name": "hip", "frames": [{"translation": [0,0,0]}, {"translation": [0,4,0]}]}]}"#,
    );
    let base = anim(&mut r.engine, "base.anim", &pose_anim(1.0));

    r.engine.setup_model_anim_stage(r.model, 0, raise, 0, "", true);
    r.engine.set_model_anim_params(r.model, 0, 1.0, 0.5);
    r.engine.update_animations();
    assert_eq!(r.engine.node_transform(r.hip).unwrap().0, Vec3::ZERO);

    r.engine.setup_model_anim_stage(r.model, 1, base, 0, "", false);
    r.engine.set_model_anim_params(r.model, 0, 1.0, 0.5);
    r.engine.set_model_anim_params(r.model, 1, 0.0, 1.0);
    r.engine.update_animations();
    let t = r.engine.node_transform(r.hip).unwrap().0;
    assert!(approx_eq(t.x, 1.0));
    assert!(approx_eq(t.y, 2.0));
}

#[test]
fn start_node_limits_scope() {
    let mut r = rig();
    let a = anim(&mut r.engine, "a.anim", &pose_anim(5.0));

    r.engine.setup_model_anim_stage(r.model, 0, a, 0, "knee", false);
    r.engine.set_model_anim_params(r.model, 0, 0.0, 1.0);
    r.engine.update_animations();

    assert!(approx_eq(local_x(&r.engine, r.hip), 0.0));
    assert!(approx_eq(local_x(&r.engine, r.knee), 5.0));
}

// ============================================================================
// Sampling
// ============================================================================

#[test]
fn fast_animation_samples_lower_frame() {
    let mut r = rig();
    let stride = anim(&mut r.engine, "stride.anim", STRIDE);
    r.engine.setup_model_anim_stage(r.model, 0, stride, 0, "", false);

    r.engine.set_model_anim_params(r.model, 0, 0.5, 1.0);
    r.engine.update_animations();
    assert!(approx_eq(local_x(&r.engine, r.hip), 0.0));

    assert!(r.engine.set_option(EngineOption::FastAnimation, 0.0));
    r.engine.set_model_anim_params(r.model, 0, 0.5, 1.0);
    r.engine.update_animations();
    assert!(approx_eq(local_x(&r.engine, r.hip), 1.0));
}

#[test]
fn params_set_before_load_keep_their_time() {
    let mut r = rig();
    let stride = r
        .engine
        .add_resource(ResourceType::Animation, "late.anim", ResFlags::empty())
        .unwrap();
    assert!(r.engine.setup_model_anim_stage(r.model, 0, stride, 0, "", false));
    assert!(r.engine.set_model_anim_params(r.model, 0, 1.0, 1.0));

    assert!(r.engine.load_resource(stride, Some(STRIDE.as_bytes())));
    r.engine.update_animations();
    assert!(approx_eq(local_x(&r.engine, r.hip), 2.0));
}

#[test]
fn animated_joint_moves_children() {
    let mut r = rig();
    let a = anim(&mut r.engine, "a.anim", &pose_anim(2.0));
    r.engine.setup_model_anim_stage(r.model, 0, a, 0, "", false);
    r.engine.set_model_anim_params(r.model, 0, 0.0, 1.0);
    r.engine.update_animations();

    let (_, world) = r.engine.node_transform_matrices(r.knee).unwrap();
    assert!(approx_eq(world.w_axis.x, 4.0));
}

// ============================================================================
// Morph Targets
// ============================================================================

#[test]
fn morpher_by_name_and_all() {
    let mut r = rig();

    assert!(r.engine.set_model_morpher(r.model, "smile", 0.75));
    assert_eq!(r.engine.scene().morph_weights(r.model).unwrap(), &[0.0, 0.75]);

    assert!(r.engine.set_model_morpher(r.model, "", 0.5));
    assert_eq!(r.engine.scene().morph_weights(r.model).unwrap(), &[0.5, 0.5]);

    assert!(!r.engine.set_model_morpher(r.model, "frown", 1.0));
    assert_eq!(r.engine.scene().morph_weights(r.model).unwrap(), &[0.5, 0.5]);
}
