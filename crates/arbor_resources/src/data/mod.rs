//! Resource Data
//!
//! Parsed, type-specific contents of a resource. Every resource type is loaded
//! from a JSON document (Code resources from plain UTF-8 text) and exposes its
//! contents through the element/parameter accessors.
//!
//! Loading happens in two phases: the document is parsed and validated first,
//! and only then are referenced resources resolved. A document that fails
//! validation therefore never touches reference counts.

pub mod animation;
pub mod geometry;
pub mod material;
pub mod particle;
pub mod pipeline;
pub mod scene_graph;
pub mod shader;
pub mod texture;

use arbor_core::{ArborError, ResHandle, Result};
use serde::de::DeserializeOwned;

use crate::params::{ResElem, ResParam};
use crate::types::{ResFlags, ResourceType};

pub use animation::{AnimEntity, AnimationData};
pub use geometry::{GeoJoint, GeometryData, MorphTarget};
pub use material::{MatSampler, MatUniform, MaterialData};
pub use particle::{Channel, ParticleEffectData};
pub use pipeline::{PipeStage, PipelineData, RenderTarget};
pub use scene_graph::{
    CameraDesc, EmitterDesc, LightDesc, MeshDesc, ModelDesc, SceneGraphData, SceneNodeDesc, SceneNodeKind,
};
pub use shader::{CodeData, ShaderContext, ShaderData, ShaderUniform};
pub use texture::TextureData;

/// Callback used while loading to turn a referenced `(type, name)` into a handle
/// that holds an internal reference.
pub(crate) type Resolver<'a> = dyn FnMut(ResourceType, &str) -> ResHandle + 'a;

pub(crate) fn parse_json<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| ArborError::MalformedData {
        name: name.to_string(),
        source,
    })
}

pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> ArborError {
    ArborError::InvalidData {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Typed element access implemented by every data type.
///
/// Callers validate element kind, index, parameter and value kind before
/// dispatching here; the fallbacks only cover combinations that cannot occur.
pub(crate) trait Elements {
    fn elem_count(&self, elem: ResElem) -> usize;

    fn get_int(&self, _elem: ResElem, _index: usize, _param: ResParam) -> i32 {
        0
    }

    fn get_float(&self, _elem: ResElem, _index: usize, _param: ResParam, _comp: usize) -> f32 {
        0.0
    }

    fn get_str(&self, _elem: ResElem, _index: usize, _param: ResParam) -> &str {
        ""
    }

    fn set_int(&mut self, _elem: ResElem, _index: usize, _param: ResParam, _value: i32) {}

    fn set_float(&mut self, _elem: ResElem, _index: usize, _param: ResParam, _comp: usize, _value: f32) {}

    fn set_str(&mut self, _elem: ResElem, _index: usize, _param: ResParam, _value: &str) {}
}

/// Contents of a resource, one variant per resource type.
#[derive(Debug, Clone)]
pub enum ResourceData {
    SceneGraph(SceneGraphData),
    Geometry(GeometryData),
    Animation(AnimationData),
    Material(MaterialData),
    Code(CodeData),
    Shader(ShaderData),
    Texture(TextureData),
    ParticleEffect(ParticleEffectData),
    Pipeline(PipelineData),
}

impl ResourceData {
    /// Contents of an unloaded resource.
    #[must_use]
    pub fn default_for(res_type: ResourceType) -> Self {
        match res_type {
            ResourceType::SceneGraph => Self::SceneGraph(SceneGraphData::default()),
            ResourceType::Geometry => Self::Geometry(GeometryData::default()),
            ResourceType::Animation => Self::Animation(AnimationData::default()),
            ResourceType::Material => Self::Material(MaterialData::default()),
            ResourceType::Code => Self::Code(CodeData::default()),
            ResourceType::Shader => Self::Shader(ShaderData::default()),
            ResourceType::Texture => Self::Texture(TextureData::default()),
            ResourceType::ParticleEffect => Self::ParticleEffect(ParticleEffectData::default()),
            ResourceType::Pipeline => Self::Pipeline(PipelineData::default()),
        }
    }

    pub(crate) fn load(
        res_type: ResourceType,
        name: &str,
        flags: ResFlags,
        bytes: &[u8],
        resolve: &mut Resolver<'_>,
    ) -> Result<Self> {
        Ok(match res_type {
            ResourceType::SceneGraph => {
                let root = scene_graph::parse(name, bytes)?;
                Self::SceneGraph(SceneGraphData::resolve(root, resolve))
            }
            ResourceType::Geometry => Self::Geometry(GeometryData::parse(name, bytes)?),
            ResourceType::Animation => Self::Animation(AnimationData::parse(name, bytes)?),
            ResourceType::Material => {
                let desc = material::parse(name, bytes)?;
                Self::Material(MaterialData::resolve(desc, resolve))
            }
            ResourceType::Code => Self::Code(CodeData::parse(name, bytes)?),
            ResourceType::Shader => {
                let desc = shader::parse(name, bytes)?;
                Self::Shader(ShaderData::resolve(desc, resolve))
            }
            ResourceType::Texture => Self::Texture(TextureData::parse(name, flags, bytes)?),
            ResourceType::ParticleEffect => Self::ParticleEffect(ParticleEffectData::parse(name, bytes)?),
            ResourceType::Pipeline => {
                let desc = pipeline::parse(name, bytes)?;
                Self::Pipeline(PipelineData::resolve(desc, resolve))
            }
        })
    }

    /// Resources this data holds internal references on.
    #[must_use]
    pub fn dependencies(&self) -> Vec<ResHandle> {
        let deps = match self {
            Self::SceneGraph(d) => d.deps.clone(),
            Self::Material(d) => d.dependencies(),
            Self::Shader(d) => d.dependencies(),
            Self::Pipeline(d) => d.dependencies(),
            _ => Vec::new(),
        };
        deps.into_iter().filter(|h| !h.is_none()).collect()
    }

    pub(crate) fn elements(&self) -> &dyn Elements {
        match self {
            Self::SceneGraph(d) => d,
            Self::Geometry(d) => d,
            Self::Animation(d) => d,
            Self::Material(d) => d,
            Self::Code(d) => d,
            Self::Shader(d) => d,
            Self::Texture(d) => d,
            Self::ParticleEffect(d) => d,
            Self::Pipeline(d) => d,
        }
    }

    pub(crate) fn elements_mut(&mut self) -> &mut dyn Elements {
        match self {
            Self::SceneGraph(d) => d,
            Self::Geometry(d) => d,
            Self::Animation(d) => d,
            Self::Material(d) => d,
            Self::Code(d) => d,
            Self::Shader(d) => d,
            Self::Texture(d) => d,
            Self::ParticleEffect(d) => d,
            Self::Pipeline(d) => d,
        }
    }
}
