//! Arbor Resources
//!
//! Named, typed and reference-counted resources.
//!
//! - [`manager`]: the [`ResourceManager`] that owns every resource
//! - [`data`]: parsed contents, one type per [`ResourceType`]
//! - [`params`]: element and parameter identifiers for generic access
//! - [`stream`]: scoped raw access to geometry and pixel data

pub mod data;
pub mod manager;
pub mod params;
pub mod resource;
pub mod stream;
pub mod types;

pub use data::{
    AnimEntity, AnimationData, CameraDesc, Channel, CodeData, EmitterDesc, GeoJoint, GeometryData, LightDesc,
    MatSampler, MatUniform, MaterialData, MeshDesc, ModelDesc, MorphTarget, ParticleEffectData, PipeStage,
    PipelineData, RenderTarget, ResourceData, SceneGraphData, SceneNodeDesc, SceneNodeKind, ShaderContext,
    ShaderData, ShaderUniform, TextureData,
};
pub use manager::ResourceManager;
pub use params::{
    AnimParam, GeoParam, MatParam, PartEffParam, PipeParam, ResElem, ResParam, ResStream, ShaderParam, TexParam,
    ValueKind,
};
pub use resource::Resource;
pub use stream::StreamMap;
pub use types::{ResFlags, ResourceType, TextureFormat};
