use std::fmt;

use arbor_animation::{AnimStage, STAGE_COUNT};
use arbor_core::{ArborError, NodeHandle, ResHandle, Result};
use bitflags::bitflags;
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::emitter::Particle;
use crate::transform::Transform;

/// Scene node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NodeType {
    Group = 1,
    Model = 2,
    Mesh = 3,
    Joint = 4,
    Light = 5,
    Camera = 6,
    Emitter = 7,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        Self::Group,
        Self::Model,
        Self::Mesh,
        Self::Joint,
        Self::Light,
        Self::Camera,
        Self::Emitter,
    ];

    pub fn from_raw(raw: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_raw() == raw)
            .ok_or_else(|| ArborError::InvalidValue {
                context: "node type",
                value: raw.to_string(),
            })
    }

    #[inline]
    #[must_use]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Model => "Model",
            Self::Mesh => "Mesh",
            Self::Joint => "Joint",
            Self::Light => "Light",
            Self::Camera => "Camera",
            Self::Emitter => "Emitter",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Per-node behaviour flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        /// Excluded from rendering.
        const NO_DRAW        = 1 << 0;
        /// Does not cast shadows.
        const NO_CAST_SHADOW = 1 << 1;
        /// Ignored by ray queries, together with its subtree.
        const NO_RAY_QUERY   = 1 << 2;
        const INACTIVE = Self::NO_DRAW.bits() | Self::NO_CAST_SHADOW.bits() | Self::NO_RAY_QUERY.bits();
    }
}

// ============================================================================
// Per-type node data
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModelData {
    pub geometry: ResHandle,
    pub software_skinning: bool,
    /// Camera distances from which LOD 1..=4 are used.
    pub lod_distances: [f32; 4],
    pub stages: [AnimStage; STAGE_COUNT],
    /// One weight per morph target of the geometry.
    pub morph_weights: Vec<f32>,
    /// Stages changed since the last animation update.
    pub(crate) anim_dirty: bool,
}

impl ModelData {
    pub(crate) fn new(geometry: ResHandle) -> Self {
        Self {
            geometry,
            software_skinning: false,
            lod_distances: [f32::INFINITY; 4],
            stages: std::array::from_fn(|_| AnimStage::default()),
            morph_weights: Vec::new(),
            anim_dirty: false,
        }
    }

    /// LOD level for a camera at `distance`.
    #[must_use]
    pub fn lod_level(&self, distance: f32) -> u32 {
        self.lod_distances.iter().take_while(|&&d| distance >= d).count() as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub material: ResHandle,
    pub batch_start: u32,
    pub batch_count: u32,
    pub vert_start: u32,
    pub vert_end: u32,
    pub lod_level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    pub joint_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightData {
    pub material: ResHandle,
    pub lighting_context: String,
    pub shadow_context: String,
    pub radius: f32,
    /// Cone angle in degrees.
    pub fov: f32,
    pub color: Vec3,
    pub color_multiplier: f32,
    pub shadow_map_count: u32,
    pub shadow_split_lambda: f32,
    pub shadow_map_bias: f32,
}

impl LightData {
    pub(crate) fn new(material: ResHandle, lighting_context: &str, shadow_context: &str) -> Self {
        Self {
            material,
            lighting_context: lighting_context.to_string(),
            shadow_context: shadow_context.to_string(),
            radius: 100.0,
            fov: 90.0,
            color: Vec3::ONE,
            color_multiplier: 1.0,
            shadow_map_count: 0,
            shadow_split_lambda: 0.5,
            shadow_map_bias: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraData {
    pub pipeline: ResHandle,
    pub output_texture: ResHandle,
    pub output_buffer_index: u32,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
    pub viewport: [i32; 4],
    pub ortho: bool,
    pub occlusion_culling: bool,
    /// Nodes reported occluded during the previous frame.
    pub(crate) occluded: FxHashSet<NodeHandle>,
}

impl CameraData {
    pub(crate) fn new(pipeline: ResHandle) -> Self {
        Self {
            pipeline,
            output_texture: ResHandle::NONE,
            output_buffer_index: 0,
            left: -0.055_228_457,
            right: 0.055_228_457,
            bottom: -0.041_421_354,
            top: 0.041_421_354,
            near: 0.1,
            far: 1000.0,
            viewport: [0, 0, 320, 240],
            ortho: false,
            occlusion_culling: false,
            occluded: FxHashSet::default(),
        }
    }
}

/// Emitter state. Not `Clone`: the generator state belongs to one node.
pub struct EmitterData {
    pub material: ResHandle,
    pub effect: ResHandle,
    pub max_count: u32,
    /// Spawns per particle slot, `-1` for unlimited.
    pub respawn_count: i32,
    /// Seconds before the first particle is emitted.
    pub delay: f32,
    /// Particles per second.
    pub emission_rate: f32,
    /// Cone angle in degrees.
    pub spread_angle: f32,
    pub force: Vec3,
    pub(crate) particles: Vec<Particle>,
    pub(crate) elapsed: f32,
    pub(crate) emission_accum: f32,
    pub(crate) rng: StdRng,
}

impl EmitterData {
    pub(crate) fn new(material: ResHandle, effect: ResHandle, max_count: u32, respawn_count: i32, seed: u64) -> Self {
        Self {
            material,
            effect,
            max_count,
            respawn_count,
            delay: 0.0,
            emission_rate: 0.0,
            spread_angle: 0.0,
            force: Vec3::ZERO,
            particles: vec![Particle::default(); max_count as usize],
            elapsed: 0.0,
            emission_accum: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

impl fmt::Debug for EmitterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterData")
            .field("material", &self.material)
            .field("effect", &self.effect)
            .field("max_count", &self.max_count)
            .field("respawn_count", &self.respawn_count)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

/// Type-specific part of a node.
#[derive(Debug)]
pub enum NodeKind {
    Group,
    Model(Box<ModelData>),
    Mesh(MeshData),
    Joint(JointData),
    Light(LightData),
    Camera(CameraData),
    Emitter(Box<EmitterData>),
}

impl NodeKind {
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Group => NodeType::Group,
            Self::Model(_) => NodeType::Model,
            Self::Mesh(_) => NodeType::Mesh,
            Self::Joint(_) => NodeType::Joint,
            Self::Light(_) => NodeType::Light,
            Self::Camera(_) => NodeType::Camera,
            Self::Emitter(_) => NodeType::Emitter,
        }
    }

    /// Resources this node holds internal references on.
    #[must_use]
    pub fn resources(&self) -> Vec<ResHandle> {
        let refs = match self {
            Self::Group | Self::Joint(_) => Vec::new(),
            Self::Model(m) => {
                let mut refs = vec![m.geometry];
                refs.extend(m.stages.iter().map(|s| s.anim));
                refs
            }
            Self::Mesh(m) => vec![m.material],
            Self::Light(l) => vec![l.material],
            Self::Camera(c) => vec![c.pipeline, c.output_texture],
            Self::Emitter(e) => vec![e.material, e.effect],
        };
        refs.into_iter().filter(|h| !h.is_none()).collect()
    }
}

/// A scene graph node.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) attachment: String,
    pub(crate) flags: NodeFlags,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: SmallVec<[NodeHandle; 4]>,
    pub(crate) transform: Transform,
    /// Sticky "transformed since last reset" flag.
    pub(crate) trans_flag: bool,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            attachment: String::new(),
            flags: NodeFlags::empty(),
            parent: None,
            children: SmallVec::new(),
            transform: Transform::new(),
            trans_flag: false,
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn model(&self) -> Option<&ModelData> {
        match &self.kind {
            NodeKind::Model(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn model_mut(&mut self) -> Option<&mut ModelData> {
        match &mut self.kind {
            NodeKind::Model(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn camera(&self) -> Option<&CameraData> {
        match &self.kind {
            NodeKind::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn emitter_mut(&mut self) -> Option<&mut EmitterData> {
        match &mut self.kind {
            NodeKind::Emitter(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_covers_all_flags() {
        assert_eq!(NodeFlags::INACTIVE.bits(), 7);
        assert!(NodeFlags::INACTIVE.contains(NodeFlags::NO_RAY_QUERY));
    }

    #[test]
    fn test_lod_level_from_distances() {
        let mut model = ModelData::new(ResHandle::NONE);
        assert_eq!(model.lod_level(1.0e6), 0);
        model.lod_distances = [10.0, 20.0, f32::INFINITY, f32::INFINITY];
        assert_eq!(model.lod_level(5.0), 0);
        assert_eq!(model.lod_level(10.0), 1);
        assert_eq!(model.lod_level(25.0), 2);
    }

    #[test]
    fn test_node_type_round_trip() {
        assert_eq!(NodeType::from_raw(6).unwrap(), NodeType::Camera);
        assert!(NodeType::from_raw(0).is_err());
    }
}
