//! Scene graph documents.
//!
//! A SceneGraph resource is a node tree stored as JSON. The document is the root
//! node itself; every node carries a `type` tag, its name, an optional local
//! transform (Euler angles in degrees) and its children:
//!
//! ```json
//! {
//!   "type": "model", "name": "knight", "geometry": "knight.geo",
//!   "children": [
//!     { "type": "mesh", "name": "body", "material": "knight.mat",
//!       "batch_start": 0, "batch_count": 36, "vert_start": 0, "vert_end": 23 }
//!   ]
//! }
//! ```
//!
//! Resources are referenced by name and added to the resource manager as
//! dependencies when the document is loaded.

use arbor_core::{ResHandle, Result};
use serde::Deserialize;

use super::{Elements, Resolver, invalid, parse_json};
use crate::params::ResElem;
use crate::types::ResourceType;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelDesc {
    pub geometry: String,
    #[serde(default)]
    pub software_skinning: bool,
    #[serde(default = "infinite_lods")]
    pub lod_distances: [f32; 4],
}

fn infinite_lods() -> [f32; 4] {
    [f32::INFINITY; 4]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeshDesc {
    pub material: String,
    pub batch_start: u32,
    pub batch_count: u32,
    pub vert_start: u32,
    pub vert_end: u32,
    #[serde(default)]
    pub lod_level: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightDesc {
    pub material: Option<String>,
    pub lighting_context: String,
    pub shadow_context: String,
    pub radius: f32,
    pub fov: f32,
    pub color: [f32; 3],
    pub color_multiplier: f32,
    pub shadow_map_count: u32,
    pub shadow_split_lambda: f32,
    pub shadow_map_bias: f32,
}

impl Default for LightDesc {
    fn default() -> Self {
        Self {
            material: None,
            lighting_context: String::new(),
            shadow_context: String::new(),
            radius: 100.0,
            fov: 90.0,
            color: [1.0; 3],
            color_multiplier: 1.0,
            shadow_map_count: 0,
            shadow_split_lambda: 0.5,
            shadow_map_bias: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraDesc {
    pub pipeline: String,
    pub output_texture: Option<String>,
    pub output_buffer_index: u32,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
    /// `[x, y, width, height]`
    pub viewport: [i32; 4],
    pub ortho: bool,
    pub occlusion_culling: bool,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            pipeline: String::new(),
            output_texture: None,
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
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmitterDesc {
    pub material: String,
    pub effect: String,
    pub max_count: u32,
    /// `-1` respawns forever.
    pub respawn_count: i32,
    pub delay: f32,
    pub emission_rate: f32,
    pub spread_angle: f32,
    pub force: [f32; 3],
}

impl Default for EmitterDesc {
    fn default() -> Self {
        Self {
            material: String::new(),
            effect: String::new(),
            max_count: 0,
            respawn_count: 0,
            delay: 0.0,
            emission_rate: 0.0,
            spread_angle: 0.0,
            force: [0.0; 3],
        }
    }
}

/// Type-specific part of a scene graph node.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneNodeKind {
    #[default]
    Group,
    Model(ModelDesc),
    Mesh(MeshDesc),
    Joint { joint_index: u32 },
    Light(LightDesc),
    Camera(CameraDesc),
    Emitter(EmitterDesc),
}

/// One node of a scene graph document.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SceneNodeDesc {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: SceneNodeKind,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub children: Vec<SceneNodeDesc>,
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

impl SceneNodeDesc {
    /// Resources referenced by this node (not its children).
    fn references(&self) -> Vec<(ResourceType, &str)> {
        let mut refs = Vec::new();
        match &self.kind {
            SceneNodeKind::Group | SceneNodeKind::Joint { .. } => {}
            SceneNodeKind::Model(m) => refs.push((ResourceType::Geometry, m.geometry.as_str())),
            SceneNodeKind::Mesh(m) => refs.push((ResourceType::Material, m.material.as_str())),
            SceneNodeKind::Light(l) => {
                if let Some(mat) = &l.material {
                    refs.push((ResourceType::Material, mat.as_str()));
                }
            }
            SceneNodeKind::Camera(c) => {
                refs.push((ResourceType::Pipeline, c.pipeline.as_str()));
                if let Some(tex) = &c.output_texture {
                    refs.push((ResourceType::Texture, tex.as_str()));
                }
            }
            SceneNodeKind::Emitter(e) => {
                refs.push((ResourceType::Material, e.material.as_str()));
                refs.push((ResourceType::ParticleEffect, e.effect.as_str()));
            }
        }
        refs.retain(|(_, name)| !name.is_empty());
        refs
    }

    fn validate(&self, doc: &str) -> Result<()> {
        let missing = |what: &str| invalid(doc, format!("node '{}' is missing its {what}", self.name));
        match &self.kind {
            SceneNodeKind::Model(m) if m.geometry.is_empty() => return Err(missing("geometry")),
            SceneNodeKind::Mesh(m) if m.material.is_empty() => return Err(missing("material")),
            SceneNodeKind::Camera(c) if c.pipeline.is_empty() => return Err(missing("pipeline")),
            SceneNodeKind::Emitter(e) if e.material.is_empty() || e.effect.is_empty() => {
                return Err(missing("material or effect"));
            }
            _ => {}
        }
        self.children.iter().try_for_each(|c| c.validate(doc))
    }

    /// Visits the node and its descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNodeDesc)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<SceneNodeDesc> {
    let root: SceneNodeDesc = parse_json(name, bytes)?;
    root.validate(name)?;
    Ok(root)
}

/// A loaded scene graph document.
#[derive(Debug, Clone, Default)]
pub struct SceneGraphData {
    pub(crate) root: SceneNodeDesc,
    pub(crate) deps: Vec<ResHandle>,
}

impl SceneGraphData {
    pub(crate) fn resolve(root: SceneNodeDesc, resolve: &mut Resolver<'_>) -> Self {
        let mut deps = Vec::new();
        root.walk(&mut |node| {
            for (ty, name) in node.references() {
                deps.push(resolve(ty, name));
            }
        });
        Self { root, deps }
    }

    #[must_use]
    pub fn root(&self) -> &SceneNodeDesc {
        &self.root
    }
}

impl Elements for SceneGraphData {
    fn elem_count(&self, _elem: ResElem) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNIGHT: &str = r#"{
        "type": "model", "name": "knight", "geometry": "knight.geo",
        "translation": [0, 1, 0],
        "children": [
            {"type": "mesh", "name": "body", "material": "knight.mat",
             "batch_start": 0, "batch_count": 3, "vert_start": 0, "vert_end": 2},
            {"type": "joint", "name": "hip", "joint_index": 0},
            {"type": "light", "name": "lamp", "radius": 30}
        ]
    }"#;

    #[test]
    fn test_parse_tagged_nodes() {
        let root = parse("knight.scene", KNIGHT.as_bytes()).unwrap();
        assert_eq!(root.name, "knight");
        assert_eq!(root.translation, [0.0, 1.0, 0.0]);
        assert_eq!(root.children.len(), 3);
        match &root.children[2].kind {
            SceneNodeKind::Light(l) => {
                assert_eq!(l.radius, 30.0);
                assert_eq!(l.fov, 90.0);
            }
            other => panic!("expected light, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_collects_references() {
        let root = parse("knight.scene", KNIGHT.as_bytes()).unwrap();
        let mut names = Vec::new();
        let data = SceneGraphData::resolve(root, &mut |ty, name: &str| {
            names.push((ty, name.to_string()));
            ResHandle::from_raw(names.len() as i32)
        });
        assert_eq!(data.deps.len(), 2);
        assert_eq!(names[0], (ResourceType::Geometry, "knight.geo".to_string()));
        assert_eq!(names[1], (ResourceType::Material, "knight.mat".to_string()));
    }

    #[test]
    fn test_camera_needs_pipeline() {
        let data = r#"{"type": "camera", "name": "cam"}"#;
        assert!(parse("cam.scene", data.as_bytes()).is_err());
    }
}
