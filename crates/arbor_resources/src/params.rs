//! Resource Element Parameters
//!
//! Resource data is exposed as typed *elements* (the geometry itself, material
//! samplers, pipeline stages, ...) that carry *parameters*. Each parameter
//! belongs to exactly one element kind and has a fixed value kind.
//!
//! Parameters are grouped per resource type ([`GeoParam`], [`MatParam`], ...) and
//! wrapped in the [`ResParam`] tag, so a parameter can only be named together
//! with the resource family it belongs to.

use std::fmt;

use crate::types::ResourceType;

/// Element kinds. Every kind is owned by a single resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResElem {
    /// Base element of a Geometry resource (always one).
    Geometry,
    /// Animated entity (joint or mesh) of an Animation resource.
    AnimEntity,
    /// Base element of a Material resource (always one).
    Material,
    MatSampler,
    MatUniform,
    ShaderContext,
    ShaderSampler,
    ShaderUniform,
    /// Base element of a Texture resource (always one).
    Texture,
    /// Base image of one texture slice.
    TexImage,
    /// General particle configuration (always one).
    Particle,
    ChanMoveVel,
    ChanRotVel,
    ChanSize,
    ChanColR,
    ChanColG,
    ChanColB,
    ChanColA,
    ChanDrag,
    PipeStage,
}

impl ResElem {
    /// Resource type that owns this element kind.
    #[must_use]
    pub fn resource_type(self) -> ResourceType {
        match self {
            Self::Geometry => ResourceType::Geometry,
            Self::AnimEntity => ResourceType::Animation,
            Self::Material | Self::MatSampler | Self::MatUniform => ResourceType::Material,
            Self::ShaderContext | Self::ShaderSampler | Self::ShaderUniform => ResourceType::Shader,
            Self::Texture | Self::TexImage => ResourceType::Texture,
            Self::Particle
            | Self::ChanMoveVel
            | Self::ChanRotVel
            | Self::ChanSize
            | Self::ChanColR
            | Self::ChanColG
            | Self::ChanColB
            | Self::ChanColA
            | Self::ChanDrag => ResourceType::ParticleEffect,
            Self::PipeStage => ResourceType::Pipeline,
        }
    }

    #[must_use]
    pub fn is_particle_channel(self) -> bool {
        matches!(
            self,
            Self::ChanMoveVel
                | Self::ChanRotVel
                | Self::ChanSize
                | Self::ChanColR
                | Self::ChanColG
                | Self::ChanColB
                | Self::ChanColA
                | Self::ChanDrag
        )
    }
}

impl fmt::Display for ResElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoParam {
    /// Number of triangle indices [read-only]
    IndexCount,
    /// Number of vertices [read-only]
    VertexCount,
    /// 1 if index data is 16 bit [read-only]
    Indices16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimParam {
    /// Name of the animated entity [read-only]
    EntityName,
    /// Number of frames stored for the entity [read-only]
    FrameCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatParam {
    Class,
    /// Linked Material resource
    Link,
    /// Shader resource
    Shader,
    /// Name of a sampler [read-only]
    SamplerName,
    /// Texture resource bound to a sampler
    SamplerTex,
    /// Name of a uniform [read-only]
    UniformName,
    /// Four-component uniform value
    UniformValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderParam {
    ContextName,
    SamplerName,
    UniformName,
    /// Number of components of a uniform [read-only]
    UniformSize,
    UniformDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexParam {
    Format,
    SliceCount,
    ImageWidth,
    ImageHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartEffParam {
    /// Minimum random life time in seconds
    LifeMin,
    /// Maximum random life time in seconds
    LifeMax,
    /// Minimum initial channel value
    ChanStartMin,
    /// Maximum initial channel value
    ChanStartMax,
    /// Share of the initial value left when the particle dies
    ChanEndRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeParam {
    StageName,
    /// 1 if the stage is active
    StageActive,
}

/// A resource parameter, tagged with the resource family it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResParam {
    Geo(GeoParam),
    Anim(AnimParam),
    Mat(MatParam),
    Shader(ShaderParam),
    Tex(TexParam),
    PartEff(PartEffParam),
    Pipe(PipeParam),
}

impl fmt::Display for ResParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geo(p) => write!(f, "Geo::{p:?}"),
            Self::Anim(p) => write!(f, "Anim::{p:?}"),
            Self::Mat(p) => write!(f, "Mat::{p:?}"),
            Self::Shader(p) => write!(f, "Shader::{p:?}"),
            Self::Tex(p) => write!(f, "Tex::{p:?}"),
            Self::PartEff(p) => write!(f, "PartEff::{p:?}"),
            Self::Pipe(p) => write!(f, "Pipe::{p:?}"),
        }
    }
}

/// Value kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    /// Float with the given number of components.
    Float(usize),
    Str,
}

impl ResParam {
    /// Returns `true` if the parameter is addressed through `elem`.
    #[must_use]
    pub fn applies_to(self, elem: ResElem) -> bool {
        use ResElem as E;
        match self {
            Self::Geo(_) => elem == E::Geometry,
            Self::Anim(_) => elem == E::AnimEntity,
            Self::Mat(p) => match p {
                MatParam::Class | MatParam::Link | MatParam::Shader => elem == E::Material,
                MatParam::SamplerName | MatParam::SamplerTex => elem == E::MatSampler,
                MatParam::UniformName | MatParam::UniformValue => elem == E::MatUniform,
            },
            Self::Shader(p) => match p {
                ShaderParam::ContextName => elem == E::ShaderContext,
                ShaderParam::SamplerName => elem == E::ShaderSampler,
                ShaderParam::UniformName | ShaderParam::UniformSize | ShaderParam::UniformDefault => {
                    elem == E::ShaderUniform
                }
            },
            Self::Tex(p) => match p {
                TexParam::Format | TexParam::SliceCount => elem == E::Texture,
                TexParam::ImageWidth | TexParam::ImageHeight => elem == E::TexImage,
            },
            Self::PartEff(p) => match p {
                PartEffParam::LifeMin | PartEffParam::LifeMax => elem == E::Particle,
                _ => elem.is_particle_channel(),
            },
            Self::Pipe(_) => elem == E::PipeStage,
        }
    }

    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::Geo(_)
            | Self::Anim(AnimParam::FrameCount)
            | Self::Mat(MatParam::Link | MatParam::Shader | MatParam::SamplerTex)
            | Self::Shader(ShaderParam::UniformSize)
            | Self::Tex(_)
            | Self::Pipe(PipeParam::StageActive) => ValueKind::Int,
            Self::Mat(MatParam::UniformValue) | Self::Shader(ShaderParam::UniformDefault) => {
                ValueKind::Float(4)
            }
            Self::PartEff(_) => ValueKind::Float(1),
            Self::Anim(AnimParam::EntityName)
            | Self::Mat(MatParam::Class | MatParam::SamplerName | MatParam::UniformName)
            | Self::Shader(ShaderParam::ContextName | ShaderParam::SamplerName | ShaderParam::UniformName)
            | Self::Pipe(PipeParam::StageName) => ValueKind::Str,
        }
    }

    /// Returns `true` if the parameter can be written.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Mat(
                MatParam::Class
                    | MatParam::Link
                    | MatParam::Shader
                    | MatParam::SamplerTex
                    | MatParam::UniformValue
            ) | Self::Shader(ShaderParam::UniformDefault)
                | Self::PartEff(_)
                | Self::Pipe(PipeParam::StageActive)
        )
    }

    /// Resource type a handle-valued parameter must point to.
    #[must_use]
    pub fn handle_target(self) -> Option<ResourceType> {
        match self {
            Self::Mat(MatParam::Link) => Some(ResourceType::Material),
            Self::Mat(MatParam::Shader) => Some(ResourceType::Shader),
            Self::Mat(MatParam::SamplerTex) => Some(ResourceType::Texture),
            _ => None,
        }
    }
}

/// Raw data streams that can be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResStream {
    /// Triangle indices (`u32`).
    GeoIndex,
    /// Vertex positions (`f32` x, y, z).
    GeoVertPos,
    /// Tangent frames (`f32` nx, ny, nz, tx, ty, tz, tw).
    GeoVertTan,
    /// Static attributes (`f32` u0, v0, joint indices x4, joint weights x4, u1, v1).
    GeoVertStatic,
    /// Pixel data of a texture image.
    ImgPixel,
}

impl ResStream {
    /// Element kind the stream is addressed through.
    #[must_use]
    pub fn elem(self) -> ResElem {
        match self {
            Self::GeoIndex | Self::GeoVertPos | Self::GeoVertTan | Self::GeoVertStatic => ResElem::Geometry,
            Self::ImgPixel => ResElem::TexImage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_belong_to_one_elem() {
        assert!(ResParam::Mat(MatParam::SamplerTex).applies_to(ResElem::MatSampler));
        assert!(!ResParam::Mat(MatParam::SamplerTex).applies_to(ResElem::Material));
        assert!(ResParam::PartEff(PartEffParam::ChanEndRate).applies_to(ResElem::ChanColA));
        assert!(!ResParam::PartEff(PartEffParam::LifeMin).applies_to(ResElem::ChanColA));
    }

    #[test]
    fn test_read_only_params() {
        assert!(!ResParam::Geo(GeoParam::VertexCount).is_writable());
        assert!(ResParam::Pipe(PipeParam::StageActive).is_writable());
        assert_eq!(ResParam::Mat(MatParam::UniformValue).kind(), ValueKind::Float(4));
    }
}
