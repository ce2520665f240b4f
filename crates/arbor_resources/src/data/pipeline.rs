use arbor_core::{ResHandle, Result};
use serde::Deserialize;

use super::{Elements, Resolver, invalid, parse_json};
use crate::params::{PipeParam, ResElem, ResParam};
use crate::types::{ResourceType, TextureFormat};

#[derive(Debug, Deserialize)]
pub(crate) struct PipelineDesc {
    stages: Vec<StageDesc>,
    #[serde(default)]
    render_targets: Vec<TargetDesc>,
}

#[derive(Debug, Deserialize)]
struct StageDesc {
    name: String,
    #[serde(default = "enabled")]
    enabled: bool,
    /// Material whose uniforms are bound while the stage runs.
    #[serde(default)]
    link: Option<String>,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TargetDesc {
    name: String,
    #[serde(default)]
    format: TextureFormat,
    #[serde(default = "one_buffer")]
    buffers: u32,
    /// Fixed size. Zero means "relative to the viewport".
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default = "unit_scale")]
    scale: f32,
}

fn one_buffer() -> u32 {
    1
}

fn unit_scale() -> f32 {
    1.0
}

pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<PipelineDesc> {
    let desc: PipelineDesc = parse_json(name, bytes)?;
    for (i, target) in desc.render_targets.iter().enumerate() {
        if desc.render_targets[..i].iter().any(|t| t.name == target.name) {
            return Err(invalid(name, format!("duplicate render target '{}'", target.name)));
        }
        if !(1..=4).contains(&target.buffers) {
            return Err(invalid(name, format!("render target '{}' needs 1 to 4 buffers", target.name)));
        }
        if target.scale <= 0.0 {
            return Err(invalid(name, format!("render target '{}' has a non-positive scale", target.name)));
        }
    }
    Ok(desc)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeStage {
    pub name: String,
    pub active: bool,
    pub link: ResHandle,
}

/// An off-screen buffer used by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub name: String,
    pub format: TextureFormat,
    pub buffers: u32,
    /// `false` when the size follows the viewport.
    pub fixed_size: bool,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

/// Rendering pipeline: ordered stages and their render targets.
#[derive(Debug, Clone, Default)]
pub struct PipelineData {
    pub(crate) stages: Vec<PipeStage>,
    pub(crate) targets: Vec<RenderTarget>,
}

impl PipelineData {
    pub(crate) fn resolve(desc: PipelineDesc, resolve: &mut Resolver<'_>) -> Self {
        let stages = desc
            .stages
            .into_iter()
            .map(|s| PipeStage {
                link: match s.link {
                    Some(n) if !n.is_empty() => resolve(ResourceType::Material, &n),
                    _ => ResHandle::NONE,
                },
                name: s.name,
                active: s.enabled,
            })
            .collect();
        let targets = desc
            .render_targets
            .into_iter()
            .map(|t| {
                let fixed_size = t.width > 0 && t.height > 0;
                RenderTarget {
                    name: t.name,
                    format: t.format,
                    buffers: t.buffers,
                    fixed_size,
                    scale: t.scale,
                    width: if fixed_size { t.width } else { 0 },
                    height: if fixed_size { t.height } else { 0 },
                }
            })
            .collect();
        Self { stages, targets }
    }

    pub(crate) fn dependencies(&self) -> Vec<ResHandle> {
        self.stages.iter().map(|s| s.link).collect()
    }

    /// Resizes all viewport-relative render targets.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        for target in self.targets.iter_mut().filter(|t| !t.fixed_size) {
            target.width = ((width as f32 * target.scale) as u32).max(1);
            target.height = ((height as f32 * target.scale) as u32).max(1);
        }
    }

    #[must_use]
    pub fn stages(&self) -> &[PipeStage] {
        &self.stages
    }

    #[must_use]
    pub fn render_targets(&self) -> &[RenderTarget] {
        &self.targets
    }

    #[must_use]
    pub fn render_target(&self, name: &str) -> Option<&RenderTarget> {
        self.targets.iter().find(|t| t.name == name)
    }
}

impl Elements for PipelineData {
    fn elem_count(&self, elem: ResElem) -> usize {
        if elem == ResElem::PipeStage { self.stages.len() } else { 0 }
    }

    fn get_int(&self, _elem: ResElem, index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Pipe(PipeParam::StageActive) => self.stages.get(index).map_or(0, |s| i32::from(s.active)),
            _ => 0,
        }
    }

    fn get_str(&self, _elem: ResElem, index: usize, param: ResParam) -> &str {
        match param {
            ResParam::Pipe(PipeParam::StageName) => self.stages.get(index).map_or("", |s| s.name.as_str()),
            _ => "",
        }
    }

    fn set_int(&mut self, _elem: ResElem, index: usize, param: ResParam, value: i32) {
        if param == ResParam::Pipe(PipeParam::StageActive)
            && let Some(stage) = self.stages.get_mut(index)
        {
            stage.active = value != 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: &str = r#"{
        "stages": [{"name": "Geometry"}, {"name": "Overlays", "enabled": false}],
        "render_targets": [
            {"name": "HDRBUF", "format": "RGBA16F", "scale": 0.5},
            {"name": "SHADOW", "width": 512, "height": 512}
        ]
    }"#;

    #[test]
    fn test_resize_only_touches_relative_targets() {
        let desc = parse("forward", FORWARD.as_bytes()).unwrap();
        let mut pipe = PipelineData::resolve(desc, &mut |_, _: &str| ResHandle::NONE);
        pipe.resize(800, 600);

        let hdr = pipe.render_target("HDRBUF").unwrap();
        assert_eq!((hdr.width, hdr.height), (400, 300));
        let shadow = pipe.render_target("SHADOW").unwrap();
        assert_eq!((shadow.width, shadow.height), (512, 512));
        assert!(!pipe.stages()[1].active);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let data = r#"{"stages": [], "render_targets": [{"name": "A"}, {"name": "A"}]}"#;
        assert!(parse("dup", data.as_bytes()).is_err());
    }
}
