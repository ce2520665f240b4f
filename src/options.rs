//! Engine Options
//!
//! The flat option table of the engine. [`EngineOptions`] holds the values and
//! can be deserialized from a JSON configuration body; [`EngineOption`] names a
//! single entry for the numeric get/set interface of [`Engine`](crate::Engine).
//!
//! ```rust
//! use arbor::EngineOptions;
//!
//! let options = EngineOptions::from_json(r#"{ "shadow_map_size": 2048 }"#).unwrap();
//! assert_eq!(options.shadow_map_size, 2048);
//! assert!(options.load_textures);
//! ```

use arbor_core::{ArborError, Result};
use serde::{Deserialize, Serialize};

/// Global engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Messages with a higher level are not queued.
    pub max_log_level: i32,
    /// Capacity of the diagnostic queue.
    pub max_num_messages: u32,
    pub trilinear_filtering: bool,
    /// 1, 2, 4 or 8.
    pub max_anisotropy: u32,
    pub tex_compression: bool,
    pub srgb_linearization: bool,
    pub load_textures: bool,
    /// Samples animations at the nearest lower frame instead of interpolating.
    pub fast_animation: bool,
    /// 128, 256, 512, 1024 or 2048.
    pub shadow_map_size: u32,
    /// 0, 2, 4, 8 or 16.
    pub sample_count: u32,
    pub wireframe_mode: bool,
    pub debug_view_mode: bool,
    pub dump_failed_shaders: bool,
    pub gather_time_stats: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_log_level: 4,
            max_num_messages: 512,
            trilinear_filtering: true,
            max_anisotropy: 1,
            tex_compression: false,
            srgb_linearization: false,
            load_textures: true,
            fast_animation: true,
            shadow_map_size: 1024,
            sample_count: 0,
            wireframe_mode: false,
            debug_view_mode: false,
            dump_failed_shaders: false,
            gather_time_stats: true,
        }
    }
}

/// Names of the numeric option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOption {
    MaxLogLevel,
    MaxNumMessages,
    TrilinearFiltering,
    MaxAnisotropy,
    TexCompression,
    SrgbLinearization,
    LoadTextures,
    FastAnimation,
    ShadowMapSize,
    SampleCount,
    WireframeMode,
    DebugViewMode,
    DumpFailedShaders,
    GatherTimeStats,
}

const ANISOTROPY: [u32; 4] = [1, 2, 4, 8];
const SHADOW_MAP_SIZES: [u32; 5] = [128, 256, 512, 1024, 2048];
const SAMPLE_COUNTS: [u32; 5] = [0, 2, 4, 8, 16];

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

/// Accepts `value` only if it is a whole number contained in `allowed`.
fn one_of(context: &'static str, value: f32, allowed: &[u32]) -> Result<u32> {
    allowed
        .iter()
        .copied()
        .find(|&v| v as f32 == value)
        .ok_or_else(|| ArborError::InvalidValue {
            context,
            value: value.to_string(),
        })
}

impl EngineOptions {
    /// Parses a JSON configuration body. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks the constrained entries.
    pub fn validate(&self) -> Result<()> {
        one_of("max anisotropy", self.max_anisotropy as f32, &ANISOTROPY)?;
        one_of("shadow map size", self.shadow_map_size as f32, &SHADOW_MAP_SIZES)?;
        one_of("sample count", self.sample_count as f32, &SAMPLE_COUNTS)?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, option: EngineOption) -> f32 {
        use EngineOption as O;
        match option {
            O::MaxLogLevel => self.max_log_level as f32,
            O::MaxNumMessages => self.max_num_messages as f32,
            O::TrilinearFiltering => flag(self.trilinear_filtering),
            O::MaxAnisotropy => self.max_anisotropy as f32,
            O::TexCompression => flag(self.tex_compression),
            O::SrgbLinearization => flag(self.srgb_linearization),
            O::LoadTextures => flag(self.load_textures),
            O::FastAnimation => flag(self.fast_animation),
            O::ShadowMapSize => self.shadow_map_size as f32,
            O::SampleCount => self.sample_count as f32,
            O::WireframeMode => flag(self.wireframe_mode),
            O::DebugViewMode => flag(self.debug_view_mode),
            O::DumpFailedShaders => flag(self.dump_failed_shaders),
            O::GatherTimeStats => flag(self.gather_time_stats),
        }
    }

    /// Sets one entry. Boolean entries treat any non-zero value as `true`.
    pub fn set(&mut self, option: EngineOption, value: f32) -> Result<()> {
        use EngineOption as O;
        if !value.is_finite() {
            return Err(ArborError::InvalidValue {
                context: "option value",
                value: value.to_string(),
            });
        }
        match option {
            O::MaxLogLevel => self.max_log_level = value as i32,
            O::MaxNumMessages => {
                if value < 0.0 {
                    return Err(ArborError::InvalidValue {
                        context: "message queue capacity",
                        value: value.to_string(),
                    });
                }
                self.max_num_messages = value as u32;
            }
            O::TrilinearFiltering => self.trilinear_filtering = value != 0.0,
            O::MaxAnisotropy => self.max_anisotropy = one_of("max anisotropy", value, &ANISOTROPY)?,
            O::TexCompression => self.tex_compression = value != 0.0,
            O::SrgbLinearization => self.srgb_linearization = value != 0.0,
            O::LoadTextures => self.load_textures = value != 0.0,
            O::FastAnimation => self.fast_animation = value != 0.0,
            O::ShadowMapSize => self.shadow_map_size = one_of("shadow map size", value, &SHADOW_MAP_SIZES)?,
            O::SampleCount => self.sample_count = one_of("sample count", value, &SAMPLE_COUNTS)?,
            O::WireframeMode => self.wireframe_mode = value != 0.0,
            O::DebugViewMode => self.debug_view_mode = value != 0.0,
            O::DumpFailedShaders => self.dump_failed_shaders = value != 0.0,
            O::GatherTimeStats => self.gather_time_stats = value != 0.0,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.get(EngineOption::MaxNumMessages), 512.0);
        assert_eq!(options.get(EngineOption::FastAnimation), 1.0);
        assert_eq!(options.get(EngineOption::ShadowMapSize), 1024.0);
    }

    #[test]
    fn test_constrained_values() {
        let mut options = EngineOptions::default();
        assert!(options.set(EngineOption::MaxAnisotropy, 3.0).is_err());
        assert!(options.set(EngineOption::MaxAnisotropy, 8.0).is_ok());
        assert!(options.set(EngineOption::ShadowMapSize, 1000.0).is_err());
        assert!(options.set(EngineOption::SampleCount, 16.0).is_ok());
        assert_eq!(options.max_anisotropy, 8);
    }

    #[test]
    fn test_from_json_validates() {
        assert!(EngineOptions::from_json(r#"{ "sample_count": 3 }"#).is_err());
        assert!(EngineOptions::from_json("not json").is_err());
        let options = EngineOptions::from_json(r#"{ "wireframe_mode": true }"#).unwrap();
        assert!(options.wireframe_mode);
        assert_eq!(options.max_log_level, 4);
    }
}
