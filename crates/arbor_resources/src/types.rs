use std::fmt;

use arbor_core::{ArborError, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The available resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum ResourceType {
    /// Scene graph subtree that can be instantiated below any node.
    SceneGraph = 1,
    /// Vertices, triangle indices, joints and morph targets.
    Geometry = 2,
    Animation = 3,
    Material = 4,
    /// Text block containing shader source code.
    Code = 5,
    Shader = 6,
    Texture = 7,
    ParticleEffect = 8,
    /// Rendering pipeline description.
    Pipeline = 9,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        Self::SceneGraph,
        Self::Geometry,
        Self::Animation,
        Self::Material,
        Self::Code,
        Self::Shader,
        Self::Texture,
        Self::ParticleEffect,
        Self::Pipeline,
    ];

    /// Converts a raw type id. Unknown ids are rejected.
    pub fn from_raw(raw: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| *t as i32 == raw)
            .ok_or(ArborError::UnknownResourceType(raw))
    }

    #[must_use]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SceneGraph => "SceneGraph",
            Self::Geometry => "Geometry",
            Self::Animation => "Animation",
            Self::Material => "Material",
            Self::Code => "Code",
            Self::Shader => "Shader",
            Self::Texture => "Texture",
            Self::ParticleEffect => "ParticleEffect",
            Self::Pipeline => "Pipeline",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Flags given when a resource is added.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ResFlags: u32 {
        /// Excludes the resource from `query_unloaded`.
        const NO_QUERY           = 1;
        const NO_TEX_COMPRESSION = 2;
        const NO_TEX_MIPMAPS     = 4;
        /// Texture has six slices.
        const TEX_CUBEMAP        = 8;
        const TEX_DYNAMIC        = 16;
        /// Texture can be used as a render target.
        const TEX_RENDERABLE     = 32;
        /// Texture data is in sRGB space.
        const TEX_SRGB           = 64;
    }
}

/// Pixel formats of texture resources and render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i32)]
pub enum TextureFormat {
    Unknown = 0,
    #[default]
    Bgra8 = 1,
    Dxt1 = 2,
    Dxt3 = 3,
    Dxt5 = 4,
    Rgba16F = 5,
    Rgba32F = 6,
}

impl TextureFormat {
    /// Size in bytes of one `width` x `height` image in this format.
    #[must_use]
    pub fn image_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        let blocks = w.div_ceil(4) * h.div_ceil(4);
        match self {
            Self::Unknown => 0,
            Self::Bgra8 => w * h * 4,
            Self::Dxt1 => blocks * 8,
            Self::Dxt3 | Self::Dxt5 => blocks * 16,
            Self::Rgba16F => w * h * 8,
            Self::Rgba32F => w * h * 16,
        }
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_raw() {
        assert_eq!(ResourceType::from_raw(2).unwrap(), ResourceType::Geometry);
        assert!(ResourceType::from_raw(0).is_err());
        assert!(ResourceType::from_raw(10).is_err());
    }

    #[test]
    fn test_image_sizes() {
        assert_eq!(TextureFormat::Bgra8.image_size(4, 2), 32);
        assert_eq!(TextureFormat::Dxt1.image_size(5, 5), 4 * 8);
        assert_eq!(TextureFormat::Rgba32F.image_size(1, 1), 16);
    }
}
