//! Engine Core Module
//!
//! This module contains [`Engine`], the explicit context that owns the resource
//! manager, the scene, the diagnostic queue and the option/statistics tables.
//!
//! # Diagnostics
//!
//! The lower crates return [`ArborError`]s. The engine converts them at the API
//! boundary: mutators return `bool` or `Option`, and every precondition violation
//! (bad handle, wrong type, out-of-range index, ...) is queued as a Warning that
//! the application drains with [`Engine::get_message`]. Operational failures
//! (data not available, name not found, already loaded) are only returned.
//! Read-only accessors answer `None` for invalid input without queuing anything.
//!
//! # Example
//!
//! ```rust
//! use arbor::{Engine, EngineOptions, NodeHandle, ResFlags, ResourceType};
//!
//! let mut engine = Engine::new(EngineOptions::default());
//! let geo = engine.add_resource(ResourceType::Geometry, "tri.geo", ResFlags::empty()).unwrap();
//! assert!(engine.load_resource(geo, Some(br#"{"positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2]}"#)));
//! let model = engine.add_model(NodeHandle::ROOT, "tri", geo).unwrap();
//! assert!(engine.remove_node(model));
//! engine.release();
//! ```

use std::time::Instant;

use arbor_core::{ArborError, BoundingBox, LogLevel, Message, MessageQueue, NodeHandle, ResHandle, Result, Timer};
use arbor_resources::{
    ResElem, ResFlags, ResParam, ResStream, ResourceManager, ResourceType, StreamMap, TextureFormat,
};
use arbor_scene::{NodeFlags, NodeParam, NodeType, RayHit, Scene, SceneSettings};
use glam::{Mat4, Vec3, Vec4};

use crate::options::{EngineOption, EngineOptions};
use crate::render::{Overlay, RenderBackend, RenderQueue, build_queue};
use crate::stats::{EngineStat, FrameStats};

/// Routes errors into the message queue.
struct Diagnostics {
    messages: MessageQueue,
    timer: Timer,
}

impl Diagnostics {
    fn note(&mut self, op: &str, err: &ArborError) {
        if err.is_precondition() {
            let time = self.timer.now_seconds();
            self.messages.push(LogLevel::Warning, time, format!("{op}: {err}"));
        } else {
            log::debug!("{op}: {err}");
        }
    }

    fn report<T>(&mut self, op: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.note(op, &err);
                None
            }
        }
    }

    fn check(&mut self, op: &str, result: Result<()>) -> bool {
        self.report(op, result).is_some()
    }
}

/// The engine context.
///
/// # Lifecycle
///
/// 1. Create with [`Engine::new`]
/// 2. Add and load resources, build the scene
/// 3. Per frame: [`Engine::render`] for each camera, then [`Engine::finalize_frame`]
/// 4. Tear down with [`Engine::release`]
pub struct Engine {
    options: EngineOptions,
    diag: Diagnostics,
    resources: ResourceManager,
    scene: Scene,
    stats: FrameStats,
    overlays: Vec<Overlay>,
    backend: Option<Box<dyn RenderBackend>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self::with_scene_settings(options, SceneSettings::default())
    }

    #[must_use]
    pub fn with_scene_settings(options: EngineOptions, settings: SceneSettings) -> Self {
        let messages = MessageQueue::new(options.max_num_messages as usize, options.max_log_level);
        let mut engine = Self {
            options,
            diag: Diagnostics {
                messages,
                timer: Timer::new(),
            },
            resources: ResourceManager::new(),
            scene: Scene::new(settings),
            stats: FrameStats::default(),
            overlays: Vec::new(),
            backend: None,
        };
        let time = engine.diag.timer.now_seconds();
        engine
            .diag
            .messages
            .push(LogLevel::Info, time, "Arbor engine initialized");
        engine
    }

    /// Tears the engine down, releasing every node and resource.
    pub fn release(mut self) {
        self.clear();
        log::info!("Arbor engine released");
    }

    /// Installs the external pipeline that receives every render queue.
    pub fn set_backend(&mut self, backend: Box<dyn RenderBackend>) {
        self.backend = Some(backend);
    }

    #[inline]
    #[must_use]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Removes every node except the root and every resource, regardless of
    /// reference counts.
    pub fn clear(&mut self) {
        self.scene.clear(&mut self.resources);
        self.resources.clear();
        self.overlays.clear();
        log::info!("Engine cleared");
    }

    // ========================================================================
    // Messages, options and statistics
    // ========================================================================

    /// Takes the oldest pending diagnostic message.
    pub fn get_message(&mut self) -> Option<Message> {
        self.diag.messages.pop()
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn get_option(&self, option: EngineOption) -> f32 {
        self.options.get(option)
    }

    pub fn set_option(&mut self, option: EngineOption, value: f32) -> bool {
        let ok = self.diag.check("set_option", self.options.set(option, value));
        if ok {
            match option {
                EngineOption::MaxLogLevel => self.diag.messages.set_max_level(self.options.max_log_level),
                EngineOption::MaxNumMessages => {
                    self.diag.messages.set_capacity(self.options.max_num_messages as usize);
                }
                _ => {}
            }
        }
        ok
    }

    /// Reads a statistic. With `reset` the counter restarts from zero.
    pub fn get_stat(&mut self, stat: EngineStat, reset: bool) -> f32 {
        const MB: f32 = 1024.0 * 1024.0;
        match stat {
            EngineStat::GeometryVMem => self.resources.memory_usage().0 as f32 / MB,
            EngineStat::TextureVMem => self.resources.memory_usage().1 as f32 / MB,
            _ => self.stats.take(stat, reset),
        }
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub fn add_resource(&mut self, res_type: ResourceType, name: &str, flags: ResFlags) -> Option<ResHandle> {
        self.diag.report("add_resource", self.resources.add(res_type, name, flags))
    }

    /// Deep-copies a resource. An empty name generates a unique one.
    pub fn clone_resource(&mut self, source: ResHandle, name: &str) -> Option<ResHandle> {
        self.diag.report("clone_resource", self.resources.clone_resource(source, name))
    }

    /// Drops one user reference and returns the remaining count.
    pub fn remove_resource(&mut self, handle: ResHandle) -> Option<u32> {
        self.diag.report("remove_resource", self.resources.remove(handle))
    }

    #[must_use]
    pub fn is_resource_loaded(&self, handle: ResHandle) -> bool {
        self.resources.is_loaded(handle)
    }

    /// Loads a resource from `data`. `None` marks the data as permanently absent.
    ///
    /// With the `load_textures` option off, texture data is treated as absent.
    pub fn load_resource(&mut self, handle: ResHandle, data: Option<&[u8]>) -> bool {
        let skip_texture =
            !self.options.load_textures && self.resources.res_type(handle) == Some(ResourceType::Texture);
        let result = match data {
            Some(bytes) if !skip_texture => self.resources.load(handle, bytes),
            _ => self.resources.load_absent(handle),
        };
        self.diag.check("load_resource", result)
    }

    pub fn unload_resource(&mut self, handle: ResHandle) -> bool {
        self.diag.check("unload_resource", self.resources.unload(handle))
    }

    #[must_use]
    pub fn find_resource(&self, res_type: ResourceType, name: &str) -> Option<ResHandle> {
        self.resources.find(res_type, name)
    }

    #[must_use]
    pub fn resource_type(&self, handle: ResHandle) -> Option<ResourceType> {
        self.resources.res_type(handle)
    }

    #[must_use]
    pub fn resource_name(&self, handle: ResHandle) -> Option<&str> {
        self.resources.res_name(handle)
    }

    /// Next resource after `start` in creation order, optionally filtered by type.
    #[must_use]
    pub fn next_resource(&self, res_type: Option<ResourceType>, start: ResHandle) -> Option<ResHandle> {
        self.resources.next_resource(res_type, start)
    }

    #[must_use]
    pub fn query_unloaded_resource(&self, index: usize) -> Option<ResHandle> {
        self.resources.query_unloaded(index)
    }

    /// Frees every resource without user or internal references.
    pub fn release_unused_resources(&mut self) -> usize {
        self.resources.release_unused()
    }

    #[must_use]
    pub fn resource_elem_count(&self, handle: ResHandle, elem: ResElem) -> usize {
        self.resources.elem_count(handle, elem).unwrap_or(0)
    }

    #[must_use]
    pub fn find_resource_elem(&self, handle: ResHandle, elem: ResElem, param: ResParam, value: &str) -> Option<usize> {
        self.resources.find_elem(handle, elem, param, value).ok().flatten()
    }

    #[must_use]
    pub fn get_resource_param_i(&self, handle: ResHandle, elem: ResElem, index: usize, param: ResParam) -> Option<i32> {
        self.resources.get_param_i(handle, elem, index, param).ok()
    }

    #[must_use]
    pub fn get_resource_param_f(
        &self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        comp: usize,
    ) -> Option<f32> {
        self.resources.get_param_f(handle, elem, index, param, comp).ok()
    }

    #[must_use]
    pub fn get_resource_param_str(&self, handle: ResHandle, elem: ResElem, index: usize, param: ResParam) -> Option<&str> {
        self.resources.get_param_str(handle, elem, index, param).ok()
    }

    pub fn set_resource_param_i(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        value: i32,
    ) -> bool {
        let result = self.resources.set_param_i(handle, elem, index, param, value);
        self.diag.check("set_resource_param_i", result)
    }

    pub fn set_resource_param_f(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        comp: usize,
        value: f32,
    ) -> bool {
        let result = self.resources.set_param_f(handle, elem, index, param, comp, value);
        self.diag.check("set_resource_param_f", result)
    }

    pub fn set_resource_param_str(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        value: &str,
    ) -> bool {
        let result = self.resources.set_param_str(handle, elem, index, param, value);
        self.diag.check("set_resource_param_str", result)
    }

    /// Maps a raw data stream. The stream stays mapped until the guard is dropped.
    pub fn map_resource_stream(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        stream: ResStream,
        read: bool,
        write: bool,
    ) -> Option<StreamMap<'_>> {
        let result = self.resources.map_stream(handle, elem, index, stream, read, write);
        self.diag.report("map_resource_stream", result)
    }

    pub fn create_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        flags: ResFlags,
    ) -> Option<ResHandle> {
        let result = self.resources.create_texture(name, width, height, format, flags);
        self.diag.report("create_texture", result)
    }

    pub fn set_material_uniform(&mut self, material: ResHandle, name: &str, value: [f32; 4]) -> bool {
        let result = self.resources.set_material_uniform(material, name, value);
        self.diag.check("set_material_uniform", result)
    }

    pub fn resize_pipeline_buffers(&mut self, pipeline: ResHandle, width: u32, height: u32) -> bool {
        let result = self.resources.resize_pipeline_buffers(pipeline, width, height);
        self.diag.check("resize_pipeline_buffers", result)
    }

    // ========================================================================
    // Scene: nodes
    // ========================================================================

    pub fn add_group(&mut self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        let result = self.scene.add_group(&mut self.resources, parent, name);
        self.diag.report("add_group", result)
    }

    pub fn add_model(&mut self, parent: NodeHandle, name: &str, geometry: ResHandle) -> Option<NodeHandle> {
        let result = self.scene.add_model(&mut self.resources, parent, name, geometry);
        self.diag.report("add_model", result)
    }

    pub fn add_mesh(
        &mut self,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        batch_start: u32,
        batch_count: u32,
        vert_start: u32,
        vert_end: u32,
    ) -> Option<NodeHandle> {
        let result = self.scene.add_mesh(
            &mut self.resources,
            parent,
            name,
            material,
            batch_start,
            batch_count,
            vert_start,
            vert_end,
        );
        self.diag.report("add_mesh", result)
    }

    pub fn add_joint(&mut self, parent: NodeHandle, name: &str, joint_index: u32) -> Option<NodeHandle> {
        let result = self.scene.add_joint(&mut self.resources, parent, name, joint_index);
        self.diag.report("add_joint", result)
    }

    pub fn add_light(
        &mut self,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        lighting_context: &str,
        shadow_context: &str,
    ) -> Option<NodeHandle> {
        let result = self
            .scene
            .add_light(&mut self.resources, parent, name, material, lighting_context, shadow_context);
        self.diag.report("add_light", result)
    }

    pub fn add_camera(&mut self, parent: NodeHandle, name: &str, pipeline: ResHandle) -> Option<NodeHandle> {
        let result = self.scene.add_camera(&mut self.resources, parent, name, pipeline);
        self.diag.report("add_camera", result)
    }

    pub fn add_emitter(
        &mut self,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        effect: ResHandle,
        max_count: u32,
        respawn_count: i32,
    ) -> Option<NodeHandle> {
        let result = self.scene.add_emitter(
            &mut self.resources,
            parent,
            name,
            material,
            effect,
            max_count,
            respawn_count,
        );
        self.diag.report("add_emitter", result)
    }

    /// Instantiates a loaded SceneGraph resource below `parent`.
    pub fn add_nodes(&mut self, parent: NodeHandle, scene_graph: ResHandle) -> Option<NodeHandle> {
        let result = self.scene.add_nodes(&mut self.resources, parent, scene_graph);
        self.diag.report("add_nodes", result)
    }

    /// Removes a node and its subtree. Fails for the root and invalid handles.
    pub fn remove_node(&mut self, node: NodeHandle) -> bool {
        let result = self.scene.remove_node(&mut self.resources, node);
        self.diag.check("remove_node", result)
    }

    pub fn set_node_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> bool {
        let result = self.scene.set_parent(node, parent);
        self.diag.check("set_node_parent", result)
    }

    #[must_use]
    pub fn node_parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.scene.parent(node).ok().flatten()
    }

    #[must_use]
    pub fn node_child(&self, node: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.scene.child(node, index).ok().flatten()
    }

    #[must_use]
    pub fn node_type(&self, node: NodeHandle) -> Option<NodeType> {
        self.scene.node_type(node)
    }

    // ========================================================================
    // Scene: transforms, parameters, flags
    // ========================================================================

    /// Sets the local transform. `rotation` holds Euler angles in degrees.
    pub fn set_node_transform(&mut self, node: NodeHandle, translation: Vec3, rotation: Vec3, scale: Vec3) -> bool {
        let result = self.scene.set_transform(node, translation, rotation, scale);
        self.diag.check("set_node_transform", result)
    }

    #[must_use]
    pub fn node_transform(&self, node: NodeHandle) -> Option<(Vec3, Vec3, Vec3)> {
        self.scene.transform(node).ok()
    }

    pub fn set_node_transform_matrix(&mut self, node: NodeHandle, matrix: Mat4) -> bool {
        let result = self.scene.set_transform_matrix(node, matrix);
        self.diag.check("set_node_transform_matrix", result)
    }

    /// Local and world matrices of a node.
    #[must_use]
    pub fn node_transform_matrices(&self, node: NodeHandle) -> Option<(Mat4, Mat4)> {
        self.scene.transform_matrices(node).ok()
    }

    pub fn check_node_trans_flag(&mut self, node: NodeHandle, reset: bool) -> bool {
        let result = self.scene.check_trans_flag(node, reset);
        self.diag.report("check_node_trans_flag", result).unwrap_or(false)
    }

    #[must_use]
    pub fn get_node_param_i(&self, node: NodeHandle, param: NodeParam) -> Option<i32> {
        self.scene.get_param_i(node, param).ok()
    }

    #[must_use]
    pub fn get_node_param_f(&self, node: NodeHandle, param: NodeParam, comp: usize) -> Option<f32> {
        self.scene.get_param_f(node, param, comp).ok()
    }

    #[must_use]
    pub fn get_node_param_str(&self, node: NodeHandle, param: NodeParam) -> Option<&str> {
        self.scene.get_param_str(node, param).ok()
    }

    pub fn set_node_param_i(&mut self, node: NodeHandle, param: NodeParam, value: i32) -> bool {
        let result = self.scene.set_param_i(&mut self.resources, node, param, value);
        self.diag.check("set_node_param_i", result)
    }

    pub fn set_node_param_f(&mut self, node: NodeHandle, param: NodeParam, comp: usize, value: f32) -> bool {
        let result = self.scene.set_param_f(node, param, comp, value);
        self.diag.check("set_node_param_f", result)
    }

    pub fn set_node_param_str(&mut self, node: NodeHandle, param: NodeParam, value: &str) -> bool {
        let result = self.scene.set_param_str(node, param, value);
        self.diag.check("set_node_param_str", result)
    }

    #[must_use]
    pub fn node_flags(&self, node: NodeHandle) -> Option<NodeFlags> {
        self.scene.flags(node).ok()
    }

    pub fn set_node_flags(&mut self, node: NodeHandle, flags: NodeFlags, recursive: bool) -> bool {
        let result = self.scene.set_flags(node, flags, recursive);
        self.diag.check("set_node_flags", result)
    }

    /// World-space bounds of a node's subtree.
    #[must_use]
    pub fn node_aabb(&self, node: NodeHandle) -> Option<BoundingBox> {
        self.scene.aabb(&self.resources, node).ok()
    }

    // ========================================================================
    // Scene: queries
    // ========================================================================

    /// Depth-first search below `start`. Empty name and `None` type match all.
    #[must_use]
    pub fn find_nodes(&self, start: NodeHandle, name: &str, node_type: Option<NodeType>) -> Vec<NodeHandle> {
        self.scene.find_nodes(start, name, node_type).unwrap_or_default()
    }

    /// Ray intersections with Mesh geometry, nearest first.
    #[must_use]
    pub fn cast_ray(&self, start: NodeHandle, origin: Vec3, direction: Vec3, max_results: usize) -> Vec<RayHit> {
        self.scene
            .cast_ray(&self.resources, start, origin, direction, max_results)
            .unwrap_or_default()
    }

    /// LOD level at which `node` is visible from `camera`, `None` if invisible.
    #[must_use]
    pub fn check_node_visibility(
        &self,
        node: NodeHandle,
        camera: NodeHandle,
        check_occlusion: bool,
        calc_lod: bool,
    ) -> Option<u32> {
        self.scene
            .check_visibility(&self.resources, node, camera, check_occlusion, calc_lod)
            .ok()
            .flatten()
    }

    #[must_use]
    pub fn pick_ray(&self, camera: NodeHandle, nx: f32, ny: f32) -> Option<(Vec3, Vec3)> {
        self.scene.pick_ray(camera, nx, ny).ok()
    }

    #[must_use]
    pub fn pick_node(&self, camera: NodeHandle, nx: f32, ny: f32) -> Option<NodeHandle> {
        self.scene.pick_node(&self.resources, camera, nx, ny).ok().flatten()
    }

    /// Feeds back an occlusion query result from the external pipeline.
    pub fn set_occlusion_result(&mut self, camera: NodeHandle, node: NodeHandle, occluded: bool) -> bool {
        let result = self.scene.set_occlusion_result(camera, node, occluded);
        self.diag.check("set_occlusion_result", result)
    }

    // ========================================================================
    // Scene: animation, cameras, emitters
    // ========================================================================

    pub fn setup_model_anim_stage(
        &mut self,
        model: NodeHandle,
        stage: usize,
        anim: ResHandle,
        layer: u32,
        start_node: &str,
        additive: bool,
    ) -> bool {
        let result = self
            .scene
            .setup_anim_stage(&mut self.resources, model, stage, anim, layer, start_node, additive);
        self.diag.check("setup_model_anim_stage", result)
    }

    pub fn set_model_anim_params(&mut self, model: NodeHandle, stage: usize, time: f32, weight: f32) -> bool {
        let result = self.scene.set_anim_params(&self.resources, model, stage, time, weight);
        self.diag.check("set_model_anim_params", result)
    }

    pub fn set_model_morpher(&mut self, model: NodeHandle, target: &str, weight: f32) -> bool {
        let result = self.scene.set_morpher(&self.resources, model, target, weight);
        self.diag.check("set_model_morpher", result)
    }

    /// Applies pending animation changes to the scene.
    ///
    /// [`Engine::render`] does this as well; call it directly to read animated
    /// transforms without rendering.
    pub fn update_animations(&mut self) -> usize {
        let start = Instant::now();
        let animated = self
            .scene
            .update_animations(&self.resources, !self.options.fast_animation);
        if self.options.gather_time_stats {
            self.stats.animation_time_ms += start.elapsed().as_secs_f32() * 1000.0;
        }
        animated
    }

    pub fn setup_camera_view(&mut self, camera: NodeHandle, fov: f32, aspect: f32, near: f32, far: f32) -> bool {
        let result = self.scene.setup_camera_view(camera, fov, aspect, near, far);
        self.diag.check("setup_camera_view", result)
    }

    #[must_use]
    pub fn camera_projection(&self, camera: NodeHandle) -> Option<Mat4> {
        self.scene.camera_projection(camera).ok()
    }

    pub fn advance_emitter_time(&mut self, emitter: NodeHandle, dt: f32) -> bool {
        let start = Instant::now();
        let result = self.scene.advance_emitter_time(&self.resources, emitter, dt);
        if self.options.gather_time_stats {
            self.stats.particle_time_ms += start.elapsed().as_secs_f32() * 1000.0;
        }
        self.diag.check("advance_emitter_time", result)
    }

    pub fn has_emitter_finished(&mut self, emitter: NodeHandle) -> bool {
        let result = self.scene.has_emitter_finished(emitter);
        self.diag.report("has_emitter_finished", result).unwrap_or(false)
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Prepares one camera view and hands it to the installed backend.
    pub fn render(&mut self, camera: NodeHandle) -> Result<RenderQueue> {
        self.update_animations();

        let queue = match build_queue(&self.scene, &self.resources, camera, &self.overlays) {
            Ok(queue) => queue,
            Err(err) => {
                self.diag.note("render", &err);
                return Err(err);
            }
        };

        self.stats.tri_count += u64::from(queue.triangle_count());
        self.stats.batch_count += queue.meshes.len() as u64;
        self.stats.light_pass_count += queue.lights.len() as u64;

        if let Some(backend) = &mut self.backend {
            backend.submit(&queue);
        }
        log::trace!(
            "Rendered camera {camera}: {} meshes, {} lights, {} emitters",
            queue.meshes.len(),
            queue.lights.len(),
            queue.emitters.len()
        );
        Ok(queue)
    }

    /// Ends the frame: drops this frame's overlays and records the frame time.
    pub fn finalize_frame(&mut self) {
        if let Some(backend) = &mut self.backend {
            backend.finalize_frame();
        }
        self.overlays.clear();
        self.diag.timer.tick();
        self.stats.frame_time_ms = self.diag.timer.dt_seconds() * 1000.0;
    }

    /// Queues screen-space quads for the current frame. `vertices` holds
    /// `[x, y, u, v]` corners, four per quad.
    pub fn show_overlays(&mut self, vertices: &[[f32; 4]], color: Vec4, material: ResHandle, flags: u32) -> bool {
        let result = (|| {
            if vertices.is_empty() || vertices.len() % 4 != 0 {
                return Err(ArborError::InvalidValue {
                    context: "overlay vertex count",
                    value: vertices.len().to_string(),
                });
            }
            self.resources.expect_type(material, ResourceType::Material)?;
            Ok(())
        })();
        if !self.diag.check("show_overlays", result) {
            return false;
        }
        self.overlays.push(Overlay {
            vertices: vertices.to_vec(),
            color,
            material,
            flags,
        });
        true
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_are_queued() {
        let mut engine = Engine::default();
        while engine.get_message().is_some() {}

        assert!(!engine.remove_node(NodeHandle::ROOT));
        let msg = engine.get_message().unwrap();
        assert_eq!(msg.level, LogLevel::Warning);
        assert!(msg.text.starts_with("remove_node"));
        assert!(engine.get_message().is_none());
    }

    #[test]
    fn test_operational_failures_are_not_queued() {
        let mut engine = Engine::default();
        while engine.get_message().is_some() {}

        let geo = engine
            .add_resource(ResourceType::Geometry, "g", ResFlags::empty())
            .unwrap();
        assert!(engine.load_resource(geo, Some(br#"{"positions": [[0,0,0]]}"#)));
        assert!(!engine.load_resource(geo, Some(br#"{"positions": [[0,0,0]]}"#)));
        assert!(engine.get_message().is_none());
    }

    #[test]
    fn test_message_options_apply_to_queue() {
        let mut engine = Engine::default();
        while engine.get_message().is_some() {}
        assert!(engine.set_option(EngineOption::MaxNumMessages, 1.0));
        engine.remove_node(NodeHandle::ROOT);
        engine.remove_node(NodeHandle::ROOT);
        assert!(engine.get_message().is_some());
        assert!(engine.get_message().is_none());

        assert!(!engine.set_option(EngineOption::ShadowMapSize, 100.0));
        assert_eq!(engine.get_option(EngineOption::ShadowMapSize), 1024.0);
    }

    #[test]
    fn test_overlays_live_for_one_frame() {
        let mut engine = Engine::default();
        let mat = engine
            .add_resource(ResourceType::Material, "overlay.mat", ResFlags::empty())
            .unwrap();
        let quad = [[0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0], [1.0, 1.0, 1.0, 0.0], [1.0, 0.0, 1.0, 1.0]];
        assert!(engine.show_overlays(&quad, Vec4::ONE, mat, 0));
        assert!(!engine.show_overlays(&quad[..3], Vec4::ONE, mat, 0));
        assert_eq!(engine.overlays.len(), 1);
        engine.finalize_frame();
        assert!(engine.overlays.is_empty());
    }
}
