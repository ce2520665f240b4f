//! Frame/Render Session
//!
//! Rendering itself is done by an external pipeline. A render pass walks the
//! scene from a camera's point of view and produces a [`RenderQueue`]: the
//! camera matrices plus every visible mesh, light and emitter, and the overlays
//! queued for the frame. The queue is handed to the installed
//! [`RenderBackend`], if any, and returned to the caller.

use arbor_core::{ArborError, NodeHandle, ResHandle, Result};
use arbor_resources::{ResourceManager, ResourceType};
use arbor_scene::{NodeFlags, NodeKind, NodeType, Scene, view_matrix};
use glam::{Affine3A, Mat4, Vec3, Vec4};

/// One mesh batch to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDraw {
    pub node: NodeHandle,
    pub material: ResHandle,
    /// Geometry of the owning Model.
    pub geometry: ResHandle,
    pub batch_start: u32,
    pub batch_count: u32,
    pub vert_start: u32,
    pub vert_end: u32,
    pub lod_level: u32,
    pub world: Affine3A,
    pub casts_shadow: bool,
}

/// A visible light source.
#[derive(Debug, Clone, PartialEq)]
pub struct LightDraw {
    pub node: NodeHandle,
    pub material: ResHandle,
    pub position: Vec3,
    /// Light direction (the node's -Z axis).
    pub direction: Vec3,
    pub radius: f32,
    pub fov: f32,
    /// Color already scaled by the color multiplier.
    pub color: Vec3,
    pub shadow_map_count: u32,
    pub lighting_context: String,
    pub shadow_context: String,
}

/// A visible particle emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterDraw {
    pub node: NodeHandle,
    pub material: ResHandle,
    pub effect: ResHandle,
    pub alive_particles: usize,
}

/// A batch of screen-space quads drawn on top of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    /// Quad corners as `[x, y, u, v]`, four per quad.
    pub vertices: Vec<[f32; 4]>,
    pub color: Vec4,
    pub material: ResHandle,
    pub flags: u32,
}

/// Everything the external pipeline needs to draw one camera view.
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    pub camera: NodeHandle,
    pub pipeline: ResHandle,
    pub output_texture: ResHandle,
    pub viewport: [i32; 4],
    pub view: Mat4,
    pub projection: Mat4,
    pub meshes: Vec<MeshDraw>,
    pub lights: Vec<LightDraw>,
    pub emitters: Vec<EmitterDraw>,
    pub overlays: Vec<Overlay>,
}

impl RenderQueue {
    /// Triangles submitted by the mesh draws.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.meshes.iter().map(|m| m.batch_count / 3).sum()
    }
}

/// The external rendering pipeline.
pub trait RenderBackend {
    /// Draws one prepared camera view.
    fn submit(&mut self, queue: &RenderQueue);

    /// Called once per frame from [`Engine::finalize_frame`](crate::Engine::finalize_frame).
    fn finalize_frame(&mut self) {}
}

/// Collects the visible content of `scene` as seen from `camera`.
pub fn build_queue(scene: &Scene, rm: &ResourceManager, camera: NodeHandle, overlays: &[Overlay]) -> Result<RenderQueue> {
    let cam_node = scene.node(camera)?;
    let NodeKind::Camera(cam) = cam_node.kind() else {
        return Err(ArborError::NodeTypeMismatch {
            handle: camera,
            expected: NodeType::Camera.as_str(),
            found: cam_node.node_type().as_str(),
        });
    };
    rm.expect_type(cam.pipeline, ResourceType::Pipeline)?;
    if !rm.is_loaded(cam.pipeline) {
        return Err(ArborError::DataUnavailable(cam.pipeline));
    }

    let mut queue = RenderQueue {
        camera,
        pipeline: cam.pipeline,
        output_texture: cam.output_texture,
        viewport: cam.viewport,
        view: view_matrix(cam_node.transform().world_matrix()),
        projection: cam.projection_matrix(),
        overlays: overlays.to_vec(),
        ..RenderQueue::default()
    };
    let check_occlusion = cam.occlusion_culling;

    let nodes = scene.find_nodes(NodeHandle::ROOT, "", None)?;
    for handle in nodes {
        let node = scene.node(handle)?;
        if node.flags().contains(NodeFlags::NO_DRAW) {
            continue;
        }
        let world = *node.transform().world_matrix();
        match node.kind() {
            NodeKind::Mesh(mesh) => {
                let Some(lod) = scene.check_visibility(rm, handle, camera, check_occlusion, true)? else {
                    continue;
                };
                if lod != mesh.lod_level {
                    continue;
                }
                let geometry = scene
                    .owning_model(handle)
                    .and_then(|m| scene.node(m).ok())
                    .and_then(|m| match m.kind() {
                        NodeKind::Model(data) => Some(data.geometry),
                        _ => None,
                    })
                    .unwrap_or(ResHandle::NONE);
                queue.meshes.push(MeshDraw {
                    node: handle,
                    material: mesh.material,
                    geometry,
                    batch_start: mesh.batch_start,
                    batch_count: mesh.batch_count,
                    vert_start: mesh.vert_start,
                    vert_end: mesh.vert_end,
                    lod_level: lod,
                    world,
                    casts_shadow: !node.flags().contains(NodeFlags::NO_CAST_SHADOW),
                });
            }
            NodeKind::Light(light) => {
                if scene.check_visibility(rm, handle, camera, false, false)?.is_none() {
                    continue;
                }
                queue.lights.push(LightDraw {
                    node: handle,
                    material: light.material,
                    position: world.translation.into(),
                    direction: world.transform_vector3(Vec3::NEG_Z).normalize_or_zero(),
                    radius: light.radius,
                    fov: light.fov,
                    color: light.color * light.color_multiplier,
                    shadow_map_count: light.shadow_map_count,
                    lighting_context: light.lighting_context.clone(),
                    shadow_context: light.shadow_context.clone(),
                });
            }
            NodeKind::Emitter(emitter) => {
                if emitter.alive_count() == 0
                    || scene.check_visibility(rm, handle, camera, check_occlusion, false)?.is_none()
                {
                    continue;
                }
                queue.emitters.push(EmitterDraw {
                    node: handle,
                    material: emitter.material,
                    effect: emitter.effect,
                    alive_particles: emitter.alive_count(),
                });
            }
            _ => {}
        }
    }

    Ok(queue)
}
