use arbor_core::{ResHandle, Result};
use serde::Deserialize;

use super::{Elements, Resolver, invalid, parse_json};
use crate::params::{MatParam, ResElem, ResParam};
use crate::types::ResourceType;

#[derive(Debug, Deserialize)]
pub(crate) struct MaterialDesc {
    #[serde(default)]
    class: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    shader: Option<String>,
    #[serde(default)]
    samplers: Vec<SamplerDesc>,
    #[serde(default)]
    uniforms: Vec<UniformDesc>,
}

#[derive(Debug, Deserialize)]
struct SamplerDesc {
    name: String,
    texture: String,
}

#[derive(Debug, Deserialize)]
struct UniformDesc {
    name: String,
    #[serde(default)]
    value: [f32; 4],
}

pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<MaterialDesc> {
    let desc: MaterialDesc = parse_json(name, bytes)?;
    for (i, sampler) in desc.samplers.iter().enumerate() {
        if desc.samplers[..i].iter().any(|s| s.name == sampler.name) {
            return Err(invalid(name, format!("duplicate sampler '{}'", sampler.name)));
        }
    }
    for (i, uniform) in desc.uniforms.iter().enumerate() {
        if desc.uniforms[..i].iter().any(|u| u.name == uniform.name) {
            return Err(invalid(name, format!("duplicate uniform '{}'", uniform.name)));
        }
    }
    Ok(desc)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatSampler {
    pub name: String,
    pub tex: ResHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatUniform {
    pub name: String,
    pub value: [f32; 4],
}

/// Material script: shader binding, texture samplers and uniform values.
#[derive(Debug, Clone, Default)]
pub struct MaterialData {
    pub(crate) class: String,
    pub(crate) link: ResHandle,
    pub(crate) shader: ResHandle,
    pub(crate) samplers: Vec<MatSampler>,
    pub(crate) uniforms: Vec<MatUniform>,
}

impl MaterialData {
    pub(crate) fn resolve(desc: MaterialDesc, resolve: &mut Resolver<'_>) -> Self {
        let mut lookup = |ty: ResourceType, name: Option<String>| match name {
            Some(n) if !n.is_empty() => resolve(ty, &n),
            _ => ResHandle::NONE,
        };
        let link = lookup(ResourceType::Material, desc.link);
        let shader = lookup(ResourceType::Shader, desc.shader);
        let samplers = desc
            .samplers
            .into_iter()
            .map(|s| MatSampler {
                tex: lookup(ResourceType::Texture, Some(s.texture)),
                name: s.name,
            })
            .collect();

        Self {
            class: desc.class,
            link,
            shader,
            samplers,
            uniforms: desc
                .uniforms
                .into_iter()
                .map(|u| MatUniform {
                    name: u.name,
                    value: u.value,
                })
                .collect(),
        }
    }

    pub(crate) fn dependencies(&self) -> Vec<ResHandle> {
        let mut deps = vec![self.link, self.shader];
        deps.extend(self.samplers.iter().map(|s| s.tex));
        deps
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn link(&self) -> ResHandle {
        self.link
    }

    #[must_use]
    pub fn shader(&self) -> ResHandle {
        self.shader
    }

    #[must_use]
    pub fn samplers(&self) -> &[MatSampler] {
        &self.samplers
    }

    #[must_use]
    pub fn uniforms(&self) -> &[MatUniform] {
        &self.uniforms
    }

    /// Returns `true` if the material's class equals `class` or is a
    /// dot-separated subclass of it. An empty `class` matches everything.
    #[must_use]
    pub fn matches_class(&self, class: &str) -> bool {
        class.is_empty()
            || self.class == class
            || self.class.strip_prefix(class).is_some_and(|rest| rest.starts_with('.'))
    }

    pub(crate) fn set_uniform(&mut self, name: &str, value: [f32; 4]) -> bool {
        match self.uniforms.iter_mut().find(|u| u.name == name) {
            Some(u) => {
                u.value = value;
                true
            }
            None => false,
        }
    }
}

impl Elements for MaterialData {
    fn elem_count(&self, elem: ResElem) -> usize {
        match elem {
            ResElem::Material => 1,
            ResElem::MatSampler => self.samplers.len(),
            ResElem::MatUniform => self.uniforms.len(),
            _ => 0,
        }
    }

    fn get_int(&self, _elem: ResElem, index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Mat(MatParam::Link) => self.link.raw(),
            ResParam::Mat(MatParam::Shader) => self.shader.raw(),
            ResParam::Mat(MatParam::SamplerTex) => self.samplers.get(index).map_or(0, |s| s.tex.raw()),
            _ => 0,
        }
    }

    fn get_float(&self, _elem: ResElem, index: usize, _param: ResParam, comp: usize) -> f32 {
        self.uniforms
            .get(index)
            .and_then(|u| u.value.get(comp).copied())
            .unwrap_or(0.0)
    }

    fn get_str(&self, _elem: ResElem, index: usize, param: ResParam) -> &str {
        match param {
            ResParam::Mat(MatParam::Class) => &self.class,
            ResParam::Mat(MatParam::SamplerName) => self.samplers.get(index).map_or("", |s| s.name.as_str()),
            ResParam::Mat(MatParam::UniformName) => self.uniforms.get(index).map_or("", |u| u.name.as_str()),
            _ => "",
        }
    }

    fn set_int(&mut self, _elem: ResElem, index: usize, param: ResParam, value: i32) {
        let handle = ResHandle::from_raw(value);
        match param {
            ResParam::Mat(MatParam::Link) => self.link = handle,
            ResParam::Mat(MatParam::Shader) => self.shader = handle,
            ResParam::Mat(MatParam::SamplerTex) => {
                if let Some(s) = self.samplers.get_mut(index) {
                    s.tex = handle;
                }
            }
            _ => {}
        }
    }

    fn set_float(&mut self, _elem: ResElem, index: usize, _param: ResParam, comp: usize, value: f32) {
        if let Some(slot) = self.uniforms.get_mut(index).and_then(|u| u.value.get_mut(comp)) {
            *slot = value;
        }
    }

    fn set_str(&mut self, _elem: ResElem, _index: usize, param: ResParam, value: &str) {
        if param == ResParam::Mat(MatParam::Class) {
            self.class = value.to_string();
        }
    }
}
