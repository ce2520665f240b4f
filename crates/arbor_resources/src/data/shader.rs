use arbor_core::{ResHandle, Result};
use serde::Deserialize;

use super::{Elements, Resolver, invalid, parse_json};
use crate::params::{ResElem, ResParam, ShaderParam};
use crate::types::ResourceType;

#[derive(Debug, Deserialize)]
pub(crate) struct ShaderDesc {
    contexts: Vec<ContextDesc>,
    #[serde(default)]
    samplers: Vec<NamedDesc>,
    #[serde(default)]
    uniforms: Vec<UniformDesc>,
}

#[derive(Debug, Deserialize)]
struct ContextDesc {
    name: String,
    /// Code resource holding the vertex program.
    #[serde(default)]
    vertex: Option<String>,
    /// Code resource holding the fragment program.
    #[serde(default)]
    fragment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedDesc {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UniformDesc {
    name: String,
    #[serde(default = "default_uniform_size")]
    size: u32,
    #[serde(default)]
    default: [f32; 4],
}

fn default_uniform_size() -> u32 {
    4
}

pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<ShaderDesc> {
    let desc: ShaderDesc = parse_json(name, bytes)?;
    if desc.contexts.is_empty() {
        return Err(invalid(name, "shader declares no contexts"));
    }
    if let Some(u) = desc.uniforms.iter().find(|u| u.size != 1 && u.size != 4) {
        return Err(invalid(name, format!("uniform '{}' has unsupported size {}", u.name, u.size)));
    }
    Ok(desc)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderContext {
    pub name: String,
    pub vertex: ResHandle,
    pub fragment: ResHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniform {
    pub name: String,
    pub size: u32,
    pub default: [f32; 4],
}

/// Shader program: named render contexts plus the samplers and uniforms
/// materials can bind.
#[derive(Debug, Clone, Default)]
pub struct ShaderData {
    pub(crate) contexts: Vec<ShaderContext>,
    pub(crate) samplers: Vec<String>,
    pub(crate) uniforms: Vec<ShaderUniform>,
}

impl ShaderData {
    pub(crate) fn resolve(desc: ShaderDesc, resolve: &mut Resolver<'_>) -> Self {
        let mut code = |name: Option<String>| match name {
            Some(n) if !n.is_empty() => resolve(ResourceType::Code, &n),
            _ => ResHandle::NONE,
        };
        let contexts = desc
            .contexts
            .into_iter()
            .map(|c| ShaderContext {
                vertex: code(c.vertex),
                fragment: code(c.fragment),
                name: c.name,
            })
            .collect();

        Self {
            contexts,
            samplers: desc.samplers.into_iter().map(|s| s.name).collect(),
            uniforms: desc
                .uniforms
                .into_iter()
                .map(|u| ShaderUniform {
                    name: u.name,
                    size: u.size,
                    default: u.default,
                })
                .collect(),
        }
    }

    pub(crate) fn dependencies(&self) -> Vec<ResHandle> {
        self.contexts.iter().flat_map(|c| [c.vertex, c.fragment]).collect()
    }

    #[must_use]
    pub fn contexts(&self) -> &[ShaderContext] {
        &self.contexts
    }

    #[must_use]
    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.iter().any(|c| c.name == name)
    }
}

impl Elements for ShaderData {
    fn elem_count(&self, elem: ResElem) -> usize {
        match elem {
            ResElem::ShaderContext => self.contexts.len(),
            ResElem::ShaderSampler => self.samplers.len(),
            ResElem::ShaderUniform => self.uniforms.len(),
            _ => 0,
        }
    }

    fn get_int(&self, _elem: ResElem, index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Shader(ShaderParam::UniformSize) => self.uniforms.get(index).map_or(0, |u| u.size as i32),
            _ => 0,
        }
    }

    fn get_float(&self, _elem: ResElem, index: usize, _param: ResParam, comp: usize) -> f32 {
        self.uniforms
            .get(index)
            .and_then(|u| u.default.get(comp).copied())
            .unwrap_or(0.0)
    }

    fn get_str(&self, _elem: ResElem, index: usize, param: ResParam) -> &str {
        match param {
            ResParam::Shader(ShaderParam::ContextName) => self.contexts.get(index).map_or("", |c| c.name.as_str()),
            ResParam::Shader(ShaderParam::SamplerName) => self.samplers.get(index).map_or("", String::as_str),
            ResParam::Shader(ShaderParam::UniformName) => self.uniforms.get(index).map_or("", |u| u.name.as_str()),
            _ => "",
        }
    }

    fn set_float(&mut self, _elem: ResElem, index: usize, _param: ResParam, comp: usize, value: f32) {
        if let Some(slot) = self.uniforms.get_mut(index).and_then(|u| u.default.get_mut(comp)) {
            *slot = value;
        }
    }
}

/// Shader source text.
#[derive(Debug, Clone, Default)]
pub struct CodeData {
    pub(crate) source: String,
}

impl CodeData {
    pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let source = std::str::from_utf8(bytes).map_err(|e| invalid(name, format!("code is not UTF-8: {e}")))?;
        Ok(Self {
            source: source.to_string(),
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Elements for CodeData {
    fn elem_count(&self, _elem: ResElem) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_reference_code() {
        let data = r#"{
            "contexts": [{"name": "LIGHTING", "vertex": "model.vs", "fragment": "model.fs"}],
            "samplers": [{"name": "albedoMap"}],
            "uniforms": [{"name": "specParams", "default": [0.1, 0.2, 0, 0]}]
        }"#;
        let desc = parse("model.shader", data.as_bytes()).unwrap();
        let mut requested = Vec::new();
        let shader = ShaderData::resolve(desc, &mut |ty, name: &str| {
            requested.push((ty, name.to_string()));
            ResHandle::from_raw(requested.len() as i32)
        });
        assert_eq!(requested[0], (ResourceType::Code, "model.vs".to_string()));
        assert_eq!(shader.dependencies().len(), 2);
        assert!(shader.has_context("LIGHTING"));
        assert_eq!(shader.uniforms[0].size, 4);
    }

    #[test]
    fn test_uniform_size_validated() {
        let data = r#"{"contexts": [{"name": "A"}], "uniforms": [{"name": "u", "size": 3}]}"#;
        assert!(parse("bad", data.as_bytes()).is_err());
    }

    #[test]
    fn test_code_requires_utf8() {
        assert_eq!(CodeData::parse("a", b"void main() {}").unwrap().source(), "void main() {}");
        assert!(CodeData::parse("b", &[0xff, 0xfe]).is_err());
    }
}
