//! Resource Manager
//!
//! Owns every resource and hands out [`ResHandle`]s.
//!
//! # Reference counting
//!
//! - `add` creates a resource (or finds the existing one with the same type and
//!   name) and adds a *user* reference.
//! - Scene nodes and other resources hold *internal* references through
//!   [`ResourceManager::acquire`]/[`ResourceManager::release`].
//! - `remove` only drops a user reference. Memory is reclaimed by
//!   [`ResourceManager::release_unused`], so handles never become invalid
//!   behind the caller's back.
//!
//! # Enumeration
//!
//! Resources are enumerated in creation order.

use arbor_core::{ArborError, HandleTable, ResHandle, Result};
use rustc_hash::FxHashMap;

use crate::data::{
    AnimationData, GeometryData, MaterialData, ParticleEffectData, PipelineData, ResourceData, SceneGraphData,
    ShaderData, TextureData,
};
use crate::params::{ResElem, ResParam, ResStream, ValueKind};
use crate::resource::Resource;
use crate::stream::{MapTarget, StreamMap};
use crate::types::{ResFlags, ResourceType, TextureFormat};

/// Storage for all resources of an engine instance.
#[derive(Debug, Default)]
pub struct ResourceManager {
    resources: HandleTable<ResHandle, Resource>,
    /// Name index, per resource type.
    lookup: FxHashMap<ResourceType, FxHashMap<String, ResHandle>>,
    /// Creation order, used for enumeration.
    order: Vec<ResHandle>,
    clone_counter: u32,
}

impl ResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Adds a resource, or adds a user reference to an existing resource with
    /// the same type and name.
    pub fn add(&mut self, res_type: ResourceType, name: &str, flags: ResFlags) -> Result<ResHandle> {
        if name.is_empty() {
            return Err(ArborError::EmptyName);
        }
        if let Some(handle) = self.find(res_type, name)
            && let Some(res) = self.resources.get_mut(handle)
        {
            res.user_refs += 1;
            return Ok(handle);
        }

        let mut res = Resource::new(res_type, name.to_string(), flags);
        res.user_refs = 1;
        let handle = self.insert(res);
        log::debug!("Added {res_type} resource '{name}' as {handle}");
        Ok(handle)
    }

    fn insert(&mut self, res: Resource) -> ResHandle {
        let (res_type, name) = (res.res_type, res.name.clone());
        let handle = self.resources.insert(res);
        self.lookup.entry(res_type).or_default().insert(name, handle);
        self.order.push(handle);
        handle
    }

    /// Finds a resource by type and name.
    #[must_use]
    pub fn find(&self, res_type: ResourceType, name: &str) -> Option<ResHandle> {
        self.lookup.get(&res_type)?.get(name).copied()
    }

    /// Deep-copies a resource under a new name.
    ///
    /// An empty `name` generates a unique one from the source name. The clone
    /// holds one user reference and its own references on every dependency.
    pub fn clone_resource(&mut self, source: ResHandle, name: &str) -> Result<ResHandle> {
        let mut copy = self.get(source)?.clone();
        let res_type = copy.res_type;

        let name = if name.is_empty() {
            loop {
                self.clone_counter += 1;
                let candidate = format!("{}|{}", copy.name, self.clone_counter);
                if self.find(res_type, &candidate).is_none() {
                    break candidate;
                }
            }
        } else {
            if self.find(res_type, name).is_some() {
                return Err(ArborError::NameInUse(name.to_string()));
            }
            name.to_string()
        };

        copy.name = name;
        copy.user_refs = 1;
        copy.internal_refs = 0;

        for dep in copy.data.dependencies() {
            self.acquire(dep)?;
        }
        Ok(self.insert(copy))
    }

    /// Drops one user reference and returns the remaining count.
    pub fn remove(&mut self, handle: ResHandle) -> Result<u32> {
        let res = self.get_mut(handle)?;
        if res.user_refs == 0 {
            return Err(ArborError::NoUserReferences(handle));
        }
        res.user_refs -= 1;
        Ok(res.user_refs)
    }

    /// Adds an internal reference.
    pub fn acquire(&mut self, handle: ResHandle) -> Result<()> {
        self.get_mut(handle)?.internal_refs += 1;
        Ok(())
    }

    /// Drops an internal reference.
    pub fn release(&mut self, handle: ResHandle) -> Result<()> {
        let res = self.get_mut(handle)?;
        res.internal_refs = res.internal_refs.saturating_sub(1);
        Ok(())
    }

    fn release_dependency(&mut self, dep: ResHandle) {
        if let Err(err) = self.release(dep) {
            log::warn!("Dropping internal reference on {dep} failed: {err}");
        }
    }

    /// Finds or creates a dependency and adds an internal reference to it.
    fn add_dependency(&mut self, res_type: ResourceType, name: &str) -> ResHandle {
        let handle = match self.find(res_type, name) {
            Some(h) => h,
            None => self.insert(Resource::new(res_type, name.to_string(), ResFlags::empty())),
        };
        if let Some(res) = self.resources.get_mut(handle) {
            res.internal_refs += 1;
        }
        handle
    }

    /// Frees every resource without user or internal references.
    ///
    /// Freeing a resource releases its dependencies, which may free further
    /// resources; the sweep repeats until nothing changes. Returns the number of
    /// freed resources.
    pub fn release_unused(&mut self) -> usize {
        let mut freed = 0;
        loop {
            let unused: Vec<ResHandle> = self
                .order
                .iter()
                .copied()
                .filter(|&h| self.resources.get(h).is_some_and(Resource::is_unused))
                .collect();
            if unused.is_empty() {
                break;
            }
            for handle in unused {
                if let Some(res) = self.resources.remove(handle) {
                    for dep in res.data.dependencies() {
                        self.release_dependency(dep);
                    }
                    if let Some(names) = self.lookup.get_mut(&res.res_type) {
                        names.remove(&res.name);
                    }
                    freed += 1;
                }
            }
            self.order.retain(|h| self.resources.contains(*h));
        }
        if freed > 0 {
            log::debug!("Released {freed} unused resources");
        }
        freed
    }

    /// Drops every resource regardless of references.
    pub fn clear(&mut self) {
        self.resources.clear();
        self.lookup.clear();
        self.order.clear();
    }

    // ========================================================================
    // Loading
    // ========================================================================

    #[must_use]
    pub fn is_loaded(&self, handle: ResHandle) -> bool {
        self.resources.get(handle).is_some_and(Resource::is_loaded)
    }

    /// Parses `data` into the resource's contents.
    ///
    /// Resources referenced by name are added as unloaded dependencies.
    pub fn load(&mut self, handle: ResHandle, data: &[u8]) -> Result<()> {
        let res = self.get(handle)?;
        if res.loaded {
            return Err(ArborError::AlreadyLoaded(handle));
        }
        let (res_type, name, flags) = (res.res_type, res.name.clone(), res.flags);

        let parsed = ResourceData::load(res_type, &name, flags, data, &mut |ty, dep: &str| self.add_dependency(ty, dep))?;

        let res = self.get_mut(handle)?;
        res.data = parsed;
        res.loaded = true;
        res.data_absent = false;
        log::info!("Loaded {res_type} resource '{name}'");
        Ok(())
    }

    /// Marks the resource as having no data available. It stays unloaded but is
    /// no longer reported by [`Self::query_unloaded`].
    pub fn load_absent(&mut self, handle: ResHandle) -> Result<()> {
        let res = self.get_mut(handle)?;
        if res.loaded {
            return Err(ArborError::AlreadyLoaded(handle));
        }
        res.data_absent = true;
        log::warn!("No data available for {} resource '{}'", res.res_type, res.name);
        Ok(())
    }

    /// Resets the resource to its unloaded defaults so it can be loaded again.
    pub fn unload(&mut self, handle: ResHandle) -> Result<()> {
        let res = self.get_mut(handle)?;
        let res_type = res.res_type;
        let old = std::mem::replace(&mut res.data, ResourceData::default_for(res_type));
        res.loaded = false;
        res.data_absent = false;
        for dep in old.dependencies() {
            self.release_dependency(dep);
        }
        Ok(())
    }

    /// Returns the `index`-th resource (in creation order) that still needs
    /// data.
    #[must_use]
    pub fn query_unloaded(&self, index: usize) -> Option<ResHandle> {
        self.order
            .iter()
            .copied()
            .filter(|&h| self.resources.get(h).is_some_and(Resource::is_queryable))
            .nth(index)
    }

    /// Returns the resource following `start` in creation order, optionally
    /// filtered by type. `ResHandle::NONE` starts from the beginning.
    #[must_use]
    pub fn next_resource(&self, res_type: Option<ResourceType>, start: ResHandle) -> Option<ResHandle> {
        let begin = if start.is_none() {
            0
        } else {
            self.order.iter().position(|&h| h == start)? + 1
        };
        self.order[begin..].iter().copied().find(|&h| {
            self.resources
                .get(h)
                .is_some_and(|r| res_type.is_none_or(|t| r.res_type == t))
        })
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, handle: ResHandle) -> Result<&Resource> {
        self.resources.get(handle).ok_or(ArborError::InvalidResource(handle))
    }

    fn get_mut(&mut self, handle: ResHandle) -> Result<&mut Resource> {
        self.resources.get_mut(handle).ok_or(ArborError::InvalidResource(handle))
    }

    #[must_use]
    pub fn contains(&self, handle: ResHandle) -> bool {
        self.resources.contains(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    #[must_use]
    pub fn res_type(&self, handle: ResHandle) -> Option<ResourceType> {
        self.resources.get(handle).map(Resource::res_type)
    }

    #[must_use]
    pub fn res_name(&self, handle: ResHandle) -> Option<&str> {
        self.resources.get(handle).map(Resource::name)
    }

    #[must_use]
    pub fn user_refs(&self, handle: ResHandle) -> Option<u32> {
        self.resources.get(handle).map(Resource::user_refs)
    }

    #[must_use]
    pub fn internal_refs(&self, handle: ResHandle) -> Option<u32> {
        self.resources.get(handle).map(Resource::internal_refs)
    }

    /// Checks that `handle` is a live resource of type `expected`.
    pub fn expect_type(&self, handle: ResHandle, expected: ResourceType) -> Result<&Resource> {
        let res = self.get(handle)?;
        if res.res_type != expected {
            return Err(ArborError::ResourceTypeMismatch {
                handle,
                expected: expected.as_str(),
                found: res.res_type.as_str(),
            });
        }
        Ok(res)
    }

    /// Geometry contents, `None` unless `handle` is a Geometry resource.
    #[must_use]
    pub fn geometry(&self, handle: ResHandle) -> Option<&GeometryData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Geometry(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn animation(&self, handle: ResHandle) -> Option<&AnimationData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Animation(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn material(&self, handle: ResHandle) -> Option<&MaterialData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Material(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn shader(&self, handle: ResHandle) -> Option<&ShaderData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Shader(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn texture(&self, handle: ResHandle) -> Option<&TextureData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Texture(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn particle_effect(&self, handle: ResHandle) -> Option<&ParticleEffectData> {
        match &self.resources.get(handle)?.data {
            ResourceData::ParticleEffect(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn pipeline(&self, handle: ResHandle) -> Option<&PipelineData> {
        match &self.resources.get(handle)?.data {
            ResourceData::Pipeline(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn scene_graph(&self, handle: ResHandle) -> Option<&SceneGraphData> {
        match &self.resources.get(handle)?.data {
            ResourceData::SceneGraph(d) => Some(d),
            _ => None,
        }
    }

    /// Iterates all resources in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ResHandle, &Resource)> {
        self.order
            .iter()
            .filter_map(|&h| self.resources.get(h).map(|r| (h, r)))
    }

    // ========================================================================
    // Elements & Parameters
    // ========================================================================

    /// Number of elements of the given kind.
    pub fn elem_count(&self, handle: ResHandle, elem: ResElem) -> Result<usize> {
        let res = self.get(handle)?;
        Self::check_elem(res, elem)?;
        Ok(res.data.elements().elem_count(elem))
    }

    fn check_elem(res: &Resource, elem: ResElem) -> Result<()> {
        if elem.resource_type() != res.res_type {
            return Err(ArborError::ParamMismatch {
                elem: elem.to_string(),
                param: format!("{} resource", res.res_type),
            });
        }
        Ok(())
    }

    fn check_access(
        res: &Resource,
        elem: ResElem,
        index: usize,
        param: ResParam,
        kind_ok: impl Fn(ValueKind) -> bool,
    ) -> Result<()> {
        Self::check_elem(res, elem)?;
        if !param.applies_to(elem) || !kind_ok(param.kind()) {
            return Err(ArborError::ParamMismatch {
                elem: elem.to_string(),
                param: param.to_string(),
            });
        }
        if index >= res.data.elements().elem_count(elem) {
            return Err(ArborError::IndexOutOfRange {
                context: "resource element",
                index,
            });
        }
        Ok(())
    }

    fn check_write(res: &Resource, elem: ResElem, index: usize, param: ResParam, kind: ValueKind) -> Result<()> {
        Self::check_access(res, elem, index, param, |k| k == kind || matches!((k, kind), (ValueKind::Float(_), ValueKind::Float(_))))?;
        if !param.is_writable() {
            return Err(ArborError::ReadOnlyParam(param.to_string()));
        }
        Ok(())
    }

    fn check_component(param: ResParam, comp: usize) -> Result<()> {
        match param.kind() {
            ValueKind::Float(n) if comp >= n => Err(ArborError::IndexOutOfRange {
                context: "parameter component",
                index: comp,
            }),
            _ => Ok(()),
        }
    }

    pub fn get_param_i(&self, handle: ResHandle, elem: ResElem, index: usize, param: ResParam) -> Result<i32> {
        let res = self.get(handle)?;
        Self::check_access(res, elem, index, param, |k| k == ValueKind::Int)?;
        Ok(res.data.elements().get_int(elem, index, param))
    }

    pub fn get_param_f(
        &self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        comp: usize,
    ) -> Result<f32> {
        let res = self.get(handle)?;
        Self::check_access(res, elem, index, param, |k| matches!(k, ValueKind::Float(_)))?;
        Self::check_component(param, comp)?;
        Ok(res.data.elements().get_float(elem, index, param, comp))
    }

    pub fn get_param_str(&self, handle: ResHandle, elem: ResElem, index: usize, param: ResParam) -> Result<&str> {
        let res = self.get(handle)?;
        Self::check_access(res, elem, index, param, |k| k == ValueKind::Str)?;
        Ok(res.data.elements().get_str(elem, index, param))
    }

    /// Sets an integer parameter.
    ///
    /// Resource-valued parameters take a raw handle (0 clears the binding) and
    /// move the internal reference from the old resource to the new one.
    pub fn set_param_i(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        value: i32,
    ) -> Result<()> {
        let res = self.get(handle)?;
        Self::check_write(res, elem, index, param, ValueKind::Int)?;

        if let Some(target_type) = param.handle_target() {
            let new = ResHandle::from_raw(value);
            if !new.is_none() {
                self.expect_type(new, target_type)?;
            }
            let old = ResHandle::from_raw(self.get(handle)?.data.elements().get_int(elem, index, param));
            if old != new {
                if !new.is_none() {
                    self.acquire(new)?;
                }
                if !old.is_none() {
                    self.release_dependency(old);
                }
            }
        }

        self.get_mut(handle)?.data.elements_mut().set_int(elem, index, param, value);
        Ok(())
    }

    pub fn set_param_f(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        comp: usize,
        value: f32,
    ) -> Result<()> {
        let res = self.get(handle)?;
        Self::check_write(res, elem, index, param, ValueKind::Float(1))?;
        Self::check_component(param, comp)?;
        if !value.is_finite() {
            return Err(ArborError::InvalidValue {
                context: "resource float parameter",
                value: value.to_string(),
            });
        }
        self.get_mut(handle)?
            .data
            .elements_mut()
            .set_float(elem, index, param, comp, value);
        Ok(())
    }

    pub fn set_param_str(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        param: ResParam,
        value: &str,
    ) -> Result<()> {
        let res = self.get(handle)?;
        Self::check_write(res, elem, index, param, ValueKind::Str)?;
        self.get_mut(handle)?.data.elements_mut().set_str(elem, index, param, value);
        Ok(())
    }

    /// Returns the index of the first element whose string parameter `param`
    /// equals `value` (case-sensitive).
    pub fn find_elem(&self, handle: ResHandle, elem: ResElem, param: ResParam, value: &str) -> Result<Option<usize>> {
        let res = self.get(handle)?;
        Self::check_elem(res, elem)?;
        if !param.applies_to(elem) || param.kind() != ValueKind::Str {
            return Err(ArborError::ParamMismatch {
                elem: elem.to_string(),
                param: param.to_string(),
            });
        }
        let elements = res.data.elements();
        Ok((0..elements.elem_count(elem)).find(|&i| elements.get_str(elem, i, param) == value))
    }

    // ========================================================================
    // Streams
    // ========================================================================

    /// Maps a raw data stream.
    ///
    /// The returned guard borrows the manager mutably; the stream is unmapped
    /// when the guard is dropped.
    pub fn map_stream(
        &mut self,
        handle: ResHandle,
        elem: ResElem,
        index: usize,
        stream: ResStream,
        read: bool,
        write: bool,
    ) -> Result<StreamMap<'_>> {
        if !read && !write {
            return Err(ArborError::InvalidValue {
                context: "stream access",
                value: "neither read nor write".to_string(),
            });
        }
        let res = self.get(handle)?;
        Self::check_elem(res, elem)?;
        if stream.elem() != elem {
            return Err(ArborError::StreamNotMappable(format!("{stream:?} on {elem}")));
        }
        if !res.loaded {
            return Err(ArborError::DataUnavailable(handle));
        }
        if index >= res.data.elements().elem_count(elem) {
            return Err(ArborError::IndexOutOfRange {
                context: "resource element",
                index,
            });
        }

        let target = match &mut self.get_mut(handle)?.data {
            ResourceData::Geometry(geo) => MapTarget::Geometry { geo, stream },
            ResourceData::Texture(tex) => match tex.images.get_mut(index) {
                Some(pixels) => MapTarget::Pixels(pixels.as_mut_slice()),
                None => return Err(ArborError::StreamNotMappable(format!("{stream:?}"))),
            },
            _ => return Err(ArborError::StreamNotMappable(format!("{stream:?}"))),
        };
        Ok(StreamMap::new(target, write))
    }

    // ========================================================================
    // Type-specific helpers
    // ========================================================================

    /// Creates a loaded, zero-filled texture.
    pub fn create_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        flags: ResFlags,
    ) -> Result<ResHandle> {
        if name.is_empty() {
            return Err(ArborError::EmptyName);
        }
        if self.find(ResourceType::Texture, name).is_some() {
            return Err(ArborError::NameInUse(name.to_string()));
        }
        if width == 0 || height == 0 || format == TextureFormat::Unknown {
            return Err(ArborError::InvalidValue {
                context: "texture size or format",
                value: format!("{width}x{height} {format:?}"),
            });
        }

        let mut res = Resource::new(ResourceType::Texture, name.to_string(), flags);
        res.user_refs = 1;
        res.loaded = true;
        res.data = ResourceData::Texture(TextureData::blank(format, width, height, flags));
        Ok(self.insert(res))
    }

    /// Sets a material uniform by name.
    pub fn set_material_uniform(&mut self, material: ResHandle, name: &str, value: [f32; 4]) -> Result<()> {
        self.expect_type(material, ResourceType::Material)?;
        let found = match &mut self.get_mut(material)?.data {
            ResourceData::Material(mat) => mat.set_uniform(name, value),
            _ => false,
        };
        if found {
            Ok(())
        } else {
            Err(ArborError::NotFound(format!("uniform '{name}'")))
        }
    }

    /// Resizes the viewport-relative render targets of a pipeline.
    pub fn resize_pipeline_buffers(&mut self, pipeline: ResHandle, width: u32, height: u32) -> Result<()> {
        self.expect_type(pipeline, ResourceType::Pipeline)?;
        if width == 0 || height == 0 {
            return Err(ArborError::InvalidValue {
                context: "pipeline size",
                value: format!("{width}x{height}"),
            });
        }
        if let ResourceData::Pipeline(pipe) = &mut self.get_mut(pipeline)?.data {
            pipe.resize(width, height);
        }
        Ok(())
    }

    /// Estimated memory used by loaded geometry and textures, in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> (usize, usize) {
        self.resources.iter().fold((0, 0), |(geo, tex), (_, res)| match &res.data {
            ResourceData::Geometry(g) => (
                geo + std::mem::size_of_val(g.positions())
                    + std::mem::size_of_val(g.indices())
                    + (g.tangents.len() + g.statics.len()) * 4,
                tex,
            ),
            ResourceData::Texture(t) => (geo, tex + t.memory_size()),
            _ => (geo, tex),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GeoParam, MatParam, PipeParam};

    const TRIANGLE: &str = r#"{"positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2]}"#;

    #[test]
    fn test_failed_dependency_release_leaves_store_intact() {
        let mut mgr = ResourceManager::new();
        let h = mgr.add(ResourceType::Geometry, "cube", ResFlags::empty()).unwrap();
        mgr.release_dependency(ResHandle::from_raw(99));
        assert_eq!(mgr.find(ResourceType::Geometry, "cube"), Some(h));
        assert_eq!(mgr.find(ResourceType::Material, "cube"), None);
        assert_eq!(mgr.release_unused(), 0);
    }

    #[test]
    fn test_add_is_idempotent_by_name() {
        let mut mgr = ResourceManager::new();
        let a = mgr.add(ResourceType::Geometry, "cube", ResFlags::empty()).unwrap();
        let b = mgr.add(ResourceType::Geometry, "cube", ResFlags::empty()).unwrap();
        assert_eq!(a, b);
        assert_eq!(mgr.user_refs(a), Some(2));

        // Same name, different type is a different resource.
        let c = mgr.add(ResourceType::Material, "cube", ResFlags::empty()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_remove_then_sweep() {
        let mut mgr = ResourceManager::new();
        let h = mgr.add(ResourceType::Geometry, "cube", ResFlags::empty()).unwrap();
        mgr.add(ResourceType::Geometry, "cube", ResFlags::empty()).unwrap();
        assert_eq!(mgr.remove(h).unwrap(), 1);
        assert_eq!(mgr.remove(h).unwrap(), 0);
        assert!(mgr.remove(h).is_err());
        assert!(mgr.contains(h));

        assert_eq!(mgr.release_unused(), 1);
        assert!(!mgr.contains(h));
        assert!(mgr.find(ResourceType::Geometry, "cube").is_none());
    }

    #[test]
    fn test_load_once() {
        let mut mgr = ResourceManager::new();
        let h = mgr.add(ResourceType::Geometry, "tri", ResFlags::empty()).unwrap();
        mgr.load(h, TRIANGLE.as_bytes()).unwrap();
        assert!(mgr.is_loaded(h));
        assert!(matches!(mgr.load(h, TRIANGLE.as_bytes()), Err(ArborError::AlreadyLoaded(_))));

        mgr.unload(h).unwrap();
        assert!(!mgr.is_loaded(h));
        mgr.load(h, TRIANGLE.as_bytes()).unwrap();
        let count = mgr
            .get_param_i(h, ResElem::Geometry, 0, ResParam::Geo(GeoParam::VertexCount))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_malformed_data_keeps_resource_unloaded() {
        let mut mgr = ResourceManager::new();
        let h = mgr.add(ResourceType::Geometry, "broken", ResFlags::empty()).unwrap();
        let err = mgr.load(h, b"{ not json").unwrap_err();
        assert!(matches!(err, ArborError::MalformedData { .. }));
        assert!(!mgr.is_loaded(h));
    }

    #[test]
    fn test_material_dependencies_are_sweeped_in_cascade() {
        let mut mgr = ResourceManager::new();
        let mat = mgr.add(ResourceType::Material, "stone", ResFlags::empty()).unwrap();
        let data = r#"{"shader": "model.shader", "samplers": [{"name": "albedoMap", "texture": "stone.tex"}]}"#;
        mgr.load(mat, data.as_bytes()).unwrap();

        let tex = mgr.find(ResourceType::Texture, "stone.tex").unwrap();
        assert_eq!(mgr.internal_refs(tex), Some(1));
        assert_eq!(mgr.user_refs(tex), Some(0));
        assert_eq!(mgr.query_unloaded(0), mgr.find(ResourceType::Shader, "model.shader"));

        mgr.remove(mat).unwrap();
        assert_eq!(mgr.release_unused(), 3);
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_set_resource_param_moves_reference() {
        let mut mgr = ResourceManager::new();
        let mat = mgr.add(ResourceType::Material, "m", ResFlags::empty()).unwrap();
        mgr.load(mat, br#"{"shader": "a.shader"}"#).unwrap();
        let a = mgr.find(ResourceType::Shader, "a.shader").unwrap();
        let b = mgr.add(ResourceType::Shader, "b.shader", ResFlags::empty()).unwrap();

        let shader = ResParam::Mat(MatParam::Shader);
        mgr.set_param_i(mat, ResElem::Material, 0, shader, b.raw()).unwrap();
        assert_eq!(mgr.internal_refs(a), Some(0));
        assert_eq!(mgr.internal_refs(b), Some(1));
        assert_eq!(mgr.get_param_i(mat, ResElem::Material, 0, shader).unwrap(), b.raw());

        // A texture is not a valid shader.
        let tex = mgr.add(ResourceType::Texture, "t", ResFlags::empty()).unwrap();
        assert!(mgr.set_param_i(mat, ResElem::Material, 0, shader, tex.raw()).is_err());
    }

    #[test]
    fn test_param_validation() {
        let mut mgr = ResourceManager::new();
        let pipe = mgr.add(ResourceType::Pipeline, "fwd", ResFlags::empty()).unwrap();
        mgr.load(pipe, br#"{"stages": [{"name": "Geometry"}, {"name": "Overlays"}]}"#)
            .unwrap();

        let active = ResParam::Pipe(PipeParam::StageActive);
        mgr.set_param_i(pipe, ResElem::PipeStage, 1, active, 0).unwrap();
        assert_eq!(mgr.get_param_i(pipe, ResElem::PipeStage, 1, active).unwrap(), 0);

        // Out of range, read-only, and foreign element kinds are rejected.
        assert!(mgr.set_param_i(pipe, ResElem::PipeStage, 2, active, 0).is_err());
        let name = ResParam::Pipe(PipeParam::StageName);
        assert!(matches!(
            mgr.set_param_str(pipe, ResElem::PipeStage, 0, name, "x"),
            Err(ArborError::ReadOnlyParam(_))
        ));
        assert!(mgr.elem_count(pipe, ResElem::Geometry).is_err());

        assert_eq!(mgr.find_elem(pipe, ResElem::PipeStage, name, "Overlays").unwrap(), Some(1));
        assert_eq!(mgr.find_elem(pipe, ResElem::PipeStage, name, "overlays").unwrap(), None);
    }

    #[test]
    fn test_clone_generates_unique_names() {
        let mut mgr = ResourceManager::new();
        let mat = mgr.add(ResourceType::Material, "m", ResFlags::empty()).unwrap();
        mgr.load(mat, br#"{"class": "Solid", "shader": "s.shader"}"#).unwrap();
        let shader = mgr.find(ResourceType::Shader, "s.shader").unwrap();

        let c1 = mgr.clone_resource(mat, "").unwrap();
        let c2 = mgr.clone_resource(mat, "").unwrap();
        assert_ne!(mgr.res_name(c1), mgr.res_name(c2));
        assert!(mgr.is_loaded(c1));
        assert_eq!(mgr.internal_refs(shader), Some(3));
        assert!(matches!(mgr.clone_resource(mat, "m"), Err(ArborError::NameInUse(_))));
    }

    #[test]
    fn test_next_resource_in_creation_order() {
        let mut mgr = ResourceManager::new();
        let a = mgr.add(ResourceType::Geometry, "a", ResFlags::empty()).unwrap();
        let b = mgr.add(ResourceType::Material, "b", ResFlags::empty()).unwrap();
        let c = mgr.add(ResourceType::Geometry, "c", ResFlags::empty()).unwrap();

        assert_eq!(mgr.next_resource(None, ResHandle::NONE), Some(a));
        assert_eq!(mgr.next_resource(None, a), Some(b));
        assert_eq!(mgr.next_resource(Some(ResourceType::Geometry), a), Some(c));
        assert_eq!(mgr.next_resource(Some(ResourceType::Geometry), c), None);
    }

    #[test]
    fn test_map_stream_writes_update_bbox() {
        let mut mgr = ResourceManager::new();
        let h = mgr.add(ResourceType::Geometry, "tri", ResFlags::empty()).unwrap();
        mgr.load(h, TRIANGLE.as_bytes()).unwrap();

        {
            let mut map = mgr
                .map_stream(h, ResElem::Geometry, 0, ResStream::GeoVertPos, true, true)
                .unwrap();
            let floats = map.cast_mut::<f32>().unwrap();
            floats[0] = -5.0;
        }
        assert_eq!(mgr.geometry(h).unwrap().bbox().min.x, -5.0);

        let map = mgr
            .map_stream(h, ResElem::Geometry, 0, ResStream::GeoIndex, true, false)
            .unwrap();
        assert_eq!(map.cast::<u32>().unwrap(), &[0, 1, 2]);
        assert!(!map.is_writable());
    }

    #[test]
    fn test_query_unloaded_skips_absent_and_no_query() {
        let mut mgr = ResourceManager::new();
        let a = mgr.add(ResourceType::Texture, "a", ResFlags::empty()).unwrap();
        mgr.add(ResourceType::Texture, "b", ResFlags::NO_QUERY).unwrap();
        let c = mgr.add(ResourceType::Texture, "c", ResFlags::empty()).unwrap();

        mgr.load_absent(a).unwrap();
        assert!(!mgr.is_loaded(a));
        assert_eq!(mgr.query_unloaded(0), Some(c));
        assert_eq!(mgr.query_unloaded(1), None);
    }
}
