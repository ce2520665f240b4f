//! Scene
//!
//! The [`Scene`] owns every node in a [`HandleTable`]. Node handle 1 is the
//! root, a Group that exists for the scene's whole lifetime and can be neither
//! removed nor relocated.
//!
//! Operations that touch resources (adding typed nodes, removal, bounds) take the
//! [`ResourceManager`] explicitly: nodes hold internal references on the
//! resources they use, and those references are acquired on creation and released
//! on removal.
//!
//! World matrices are propagated eagerly: every transform mutation and every
//! relocation recomputes the affected subtree, so reads always see current
//! values.

use arbor_core::{ArborError, BoundingBox, HandleTable, NodeHandle, ResHandle, Result};
use arbor_resources::{GeometryData, ResourceManager, ResourceType};
use glam::{Affine3A, Mat4, Vec3};
use rustc_hash::FxHashSet;

use crate::node::{
    CameraData, EmitterData, JointData, LightData, MeshData, ModelData, Node, NodeFlags, NodeKind, NodeType,
};
use crate::transform_system;

/// Scene-wide validation and simulation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    /// Enforce the typed attachment rules: Meshes live below Models, Meshes or
    /// Joints; Joints live below Models or Joints.
    pub typed_attachment: bool,
    /// Base seed for emitter random generators. Each emitter uses
    /// `emitter_seed ^ handle`.
    pub emitter_seed: u64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            typed_attachment: true,
            emitter_seed: 0x5EED_1E55,
        }
    }
}

#[derive(Debug)]
pub struct Scene {
    pub(crate) nodes: HandleTable<NodeHandle, Node>,
    pub(crate) settings: SceneSettings,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneSettings::default())
    }
}

impl Scene {
    #[must_use]
    pub fn new(settings: SceneSettings) -> Self {
        let mut scene = Self {
            nodes: HandleTable::new(),
            settings,
        };
        scene.insert_root();
        scene
    }

    fn insert_root(&mut self) {
        let root = self.nodes.insert(Node::new("RootNode", NodeKind::Group));
        debug_assert_eq!(root, NodeHandle::ROOT);
    }

    #[must_use]
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SceneSettings {
        &mut self.settings
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn node(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes.get(handle).ok_or(ArborError::InvalidNode(handle))
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.nodes.get_mut(handle).ok_or(ArborError::InvalidNode(handle))
    }

    pub(crate) fn expect_type(&self, handle: NodeHandle, expected: NodeType) -> Result<&Node> {
        let node = self.node(handle)?;
        if node.node_type() != expected {
            return Err(ArborError::NodeTypeMismatch {
                handle,
                expected: expected.as_str(),
                found: node.node_type().as_str(),
            });
        }
        Ok(node)
    }

    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains(handle)
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root node cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_type(&self, handle: NodeHandle) -> Option<NodeType> {
        self.nodes.get(handle).map(Node::node_type)
    }

    pub fn parent(&self, handle: NodeHandle) -> Result<Option<NodeHandle>> {
        Ok(self.node(handle)?.parent)
    }

    /// The `index`-th child of `handle`, in insertion order.
    pub fn child(&self, handle: NodeHandle, index: usize) -> Result<Option<NodeHandle>> {
        Ok(self.node(handle)?.children.get(index).copied())
    }

    /// Nearest Model at or above `handle`.
    pub fn owning_model(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = self.nodes.get(h)?;
            if node.node_type() == NodeType::Model {
                return Some(h);
            }
            current = node.parent;
        }
        None
    }

    /// Geometry of the Model owning `handle`, if loaded.
    pub(crate) fn model_geometry<'a>(&self, rm: &'a ResourceManager, handle: NodeHandle) -> Option<&'a GeometryData> {
        let model = self.owning_model(handle)?;
        let geometry = self.nodes.get(model)?.model()?.geometry;
        if rm.is_loaded(geometry) { rm.geometry(geometry) } else { None }
    }

    // ========================================================================
    // Node creation
    // ========================================================================

    fn check_attachment(&self, child: NodeType, parent: NodeHandle) -> Result<()> {
        let parent_type = self.node(parent)?.node_type();
        if !self.settings.typed_attachment {
            return Ok(());
        }
        let allowed = match child {
            NodeType::Mesh => matches!(parent_type, NodeType::Model | NodeType::Mesh | NodeType::Joint),
            NodeType::Joint => matches!(parent_type, NodeType::Model | NodeType::Joint),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(ArborError::AttachmentRejected {
                child: child.as_str(),
                parent,
                reason: match child {
                    NodeType::Mesh => "meshes live below models, meshes or joints",
                    _ => "joints live below models or joints",
                },
            })
        }
    }

    /// Validates a resource parameter of a new node. `NONE` is accepted only when
    /// `optional` is set.
    fn check_resource(rm: &ResourceManager, handle: ResHandle, expected: ResourceType, optional: bool) -> Result<()> {
        if handle.is_none() && optional {
            return Ok(());
        }
        rm.expect_type(handle, expected).map(|_| ())
    }

    /// Inserts a fully validated node below `parent`.
    fn attach_new(&mut self, rm: &mut ResourceManager, parent: NodeHandle, node: Node) -> Result<NodeHandle> {
        self.check_attachment(node.node_type(), parent)?;
        for res in node.kind.resources() {
            rm.acquire(res)?;
        }

        let node_type = node.node_type();
        let handle = self.nodes.insert(node);
        if let Some(n) = self.nodes.get_mut(handle) {
            n.parent = Some(parent);
        }
        self.node_mut(parent)?.children.push(handle);
        transform_system::update_subtree(&mut self.nodes, handle);

        log::debug!("Added {node_type} node {handle} below {parent}");
        Ok(handle)
    }

    pub fn add_group(&mut self, rm: &mut ResourceManager, parent: NodeHandle, name: &str) -> Result<NodeHandle> {
        self.node(parent)?;
        self.attach_new(rm, parent, Node::new(name, NodeKind::Group))
    }

    pub fn add_model(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        geometry: ResHandle,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        Self::check_resource(rm, geometry, ResourceType::Geometry, false)?;
        let mut model = ModelData::new(geometry);
        if let Some(geo) = rm.geometry(geometry) {
            model.morph_weights = vec![0.0; geo.morph_targets().len()];
        }
        self.attach_new(rm, parent, Node::new(name, NodeKind::Model(Box::new(model))))
    }

    /// Adds a Mesh drawing `batch_count` indices from `batch_start` and using
    /// vertices `vert_start..=vert_end` of the owning Model's geometry.
    ///
    /// The ranges are checked against the geometry when it is already loaded.
    pub fn add_mesh(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        batch_start: u32,
        batch_count: u32,
        vert_start: u32,
        vert_end: u32,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        Self::check_resource(rm, material, ResourceType::Material, false)?;
        self.check_attachment(NodeType::Mesh, parent)?;

        if vert_start > vert_end {
            return Err(ArborError::InvalidValue {
                context: "mesh vertex range",
                value: format!("{vert_start}..={vert_end}"),
            });
        }
        if let Some(geo) = self.model_geometry(rm, parent) {
            let batch_end = u64::from(batch_start) + u64::from(batch_count);
            if batch_end > geo.index_count() as u64 {
                return Err(ArborError::InvalidValue {
                    context: "mesh index range",
                    value: format!("{batch_start}+{batch_count} of {}", geo.index_count()),
                });
            }
            if vert_end as usize >= geo.vertex_count() {
                return Err(ArborError::InvalidValue {
                    context: "mesh vertex range",
                    value: format!("{vert_start}..={vert_end} of {}", geo.vertex_count()),
                });
            }
        }

        let mesh = MeshData {
            material,
            batch_start,
            batch_count,
            vert_start,
            vert_end,
            lod_level: 0,
        };
        self.attach_new(rm, parent, Node::new(name, NodeKind::Mesh(mesh)))
    }

    pub fn add_joint(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        joint_index: u32,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        self.check_attachment(NodeType::Joint, parent)?;
        if let Some(geo) = self.model_geometry(rm, parent)
            && joint_index as usize >= geo.joints().len()
        {
            return Err(ArborError::IndexOutOfRange {
                context: "joint index",
                index: joint_index as usize,
            });
        }
        self.attach_new(rm, parent, Node::new(name, NodeKind::Joint(JointData { joint_index })))
    }

    /// Adds a Light. `material` may be `NONE`.
    pub fn add_light(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        lighting_context: &str,
        shadow_context: &str,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        Self::check_resource(rm, material, ResourceType::Material, true)?;
        let light = LightData::new(material, lighting_context, shadow_context);
        self.attach_new(rm, parent, Node::new(name, NodeKind::Light(light)))
    }

    pub fn add_camera(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        pipeline: ResHandle,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        Self::check_resource(rm, pipeline, ResourceType::Pipeline, false)?;
        self.attach_new(rm, parent, Node::new(name, NodeKind::Camera(CameraData::new(pipeline))))
    }

    pub fn add_emitter(
        &mut self,
        rm: &mut ResourceManager,
        parent: NodeHandle,
        name: &str,
        material: ResHandle,
        effect: ResHandle,
        max_count: u32,
        respawn_count: i32,
    ) -> Result<NodeHandle> {
        self.node(parent)?;
        Self::check_resource(rm, material, ResourceType::Material, false)?;
        Self::check_resource(rm, effect, ResourceType::ParticleEffect, false)?;

        let handle = self.attach_new(
            rm,
            parent,
            Node::new(
                name,
                NodeKind::Emitter(Box::new(EmitterData::new(material, effect, max_count, respawn_count, 0))),
            ),
        )?;
        // The seed depends on the handle, which is only known after insertion.
        let seed = self.settings.emitter_seed ^ handle.raw() as u64;
        if let Some(emitter) = self.node_mut(handle)?.emitter_mut() {
            *emitter = EmitterData::new(material, effect, max_count, respawn_count, seed);
        }
        Ok(handle)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Removes a node and its whole subtree, releasing their resource references.
    pub fn remove_node(&mut self, rm: &mut ResourceManager, handle: NodeHandle) -> Result<()> {
        if handle == NodeHandle::ROOT {
            return Err(ArborError::RootImmutable);
        }
        let parent = self.node(handle)?.parent;

        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != handle);
        }

        let subtree = transform_system::collect_subtree(&self.nodes, handle);
        for h in &subtree {
            if let Some(node) = self.nodes.remove(*h) {
                Self::release_refs(rm, *h, &node.kind);
            }
        }
        // Handles are recycled, so stale occlusion results must not outlive the node.
        let removed: FxHashSet<NodeHandle> = subtree.iter().copied().collect();
        for (_, node) in self.nodes.iter_mut() {
            if let NodeKind::Camera(cam) = &mut node.kind {
                cam.occluded.retain(|h| !removed.contains(h));
            }
        }
        log::debug!("Removed node {handle} ({} nodes)", subtree.len());
        Ok(())
    }

    /// Moves a node (and its subtree) below `new_parent`, keeping its local
    /// transform.
    pub fn set_parent(&mut self, handle: NodeHandle, new_parent: NodeHandle) -> Result<()> {
        if handle == NodeHandle::ROOT {
            return Err(ArborError::RootImmutable);
        }
        let node_type = self.node(handle)?.node_type();
        self.node(new_parent)?;
        if transform_system::is_ancestor(&self.nodes, handle, new_parent) {
            return Err(ArborError::CycleDetected {
                node: handle,
                parent: new_parent,
            });
        }
        self.check_attachment(node_type, new_parent)?;

        let old_parent = self.node(handle)?.parent;
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        if let Some(p) = old_parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != handle);
        }
        self.node_mut(new_parent)?.children.push(handle);
        self.node_mut(handle)?.parent = Some(new_parent);
        transform_system::update_subtree(&mut self.nodes, handle);
        Ok(())
    }

    /// Removes every node except the root and releases their resource references.
    pub fn clear(&mut self, rm: &mut ResourceManager) {
        for (handle, node) in self.nodes.iter() {
            Self::release_refs(rm, handle, &node.kind);
        }
        self.nodes.clear();
        self.insert_root();
    }

    fn release_refs(rm: &mut ResourceManager, handle: NodeHandle, kind: &NodeKind) {
        for res in kind.resources() {
            Self::release_ref(rm, handle, res);
        }
    }

    pub(crate) fn release_ref(rm: &mut ResourceManager, owner: NodeHandle, res: ResHandle) {
        if let Err(err) = rm.release(res) {
            log::warn!("Node {owner} could not release resource {res}: {err}");
        }
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Sets the local transform. `rotation` holds Euler angles in degrees.
    pub fn set_transform(&mut self, handle: NodeHandle, translation: Vec3, rotation: Vec3, scale: Vec3) -> Result<()> {
        self.node_mut(handle)?
            .transform
            .set_trs(translation, rotation, scale);
        transform_system::update_subtree(&mut self.nodes, handle);
        Ok(())
    }

    /// Local translation, Euler rotation in degrees and scale.
    pub fn transform(&self, handle: NodeHandle) -> Result<(Vec3, Vec3, Vec3)> {
        let t = &self.node(handle)?.transform;
        Ok((t.translation(), t.rotation_euler_deg(), t.scale()))
    }

    /// Sets the local transform from a column-major matrix.
    pub fn set_transform_matrix(&mut self, handle: NodeHandle, matrix: Mat4) -> Result<()> {
        self.node_mut(handle)?.transform.apply_local_matrix_from_mat4(matrix);
        transform_system::update_subtree(&mut self.nodes, handle);
        Ok(())
    }

    /// Local and world matrices.
    pub fn transform_matrices(&self, handle: NodeHandle) -> Result<(Mat4, Mat4)> {
        let t = &self.node(handle)?.transform;
        Ok((Mat4::from(*t.local_matrix()), t.world_matrix_as_mat4()))
    }

    #[must_use]
    pub fn world_matrix(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.nodes.get(handle).map(|n| *n.transform.world_matrix())
    }

    /// Reports whether the node was transformed since the flag was last reset,
    /// and optionally resets it.
    pub fn check_trans_flag(&mut self, handle: NodeHandle, reset: bool) -> Result<bool> {
        let node = self.node_mut(handle)?;
        let flag = node.trans_flag;
        if reset {
            node.trans_flag = false;
        }
        Ok(flag)
    }

    // ========================================================================
    // Flags
    // ========================================================================

    pub fn flags(&self, handle: NodeHandle) -> Result<NodeFlags> {
        Ok(self.node(handle)?.flags)
    }

    /// Overwrites the flags of a node, or of its whole subtree when `recursive`.
    pub fn set_flags(&mut self, handle: NodeHandle, flags: NodeFlags, recursive: bool) -> Result<()> {
        self.node(handle)?;
        let targets = if recursive {
            transform_system::collect_subtree(&self.nodes, handle)
        } else {
            vec![handle]
        };
        for h in targets {
            if let Some(node) = self.nodes.get_mut(h) {
                node.flags = flags;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// World-space bounds of the node itself, excluding its children.
    pub(crate) fn local_bounds(&self, rm: &ResourceManager, handle: NodeHandle) -> BoundingBox {
        let Some(node) = self.nodes.get(handle) else {
            return BoundingBox::EMPTY;
        };
        let world = node.transform.world_matrix();
        match &node.kind {
            NodeKind::Mesh(mesh) => self.model_geometry(rm, handle).map_or(BoundingBox::EMPTY, |geo| {
                geo.range_bbox(mesh.vert_start as usize, mesh.vert_end as usize)
                    .transform(world)
            }),
            NodeKind::Emitter(emitter) => emitter.particle_bounds(),
            NodeKind::Light(light) => {
                let center: Vec3 = world.translation.into();
                BoundingBox::new(center - Vec3::splat(light.radius), center + Vec3::splat(light.radius))
            }
            _ => BoundingBox::EMPTY,
        }
    }

    /// World-space bounds of the node and its whole subtree.
    pub fn aabb(&self, rm: &ResourceManager, handle: NodeHandle) -> Result<BoundingBox> {
        self.node(handle)?;
        Ok(transform_system::collect_subtree(&self.nodes, handle)
            .into_iter()
            .fold(BoundingBox::EMPTY, |acc, h| acc.union(&self.local_bounds(rm, h))))
    }
}
