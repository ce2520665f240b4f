//! Instantiation of SceneGraph resources.

use arbor_core::{ArborError, NodeHandle, ResHandle, Result};
use arbor_resources::{ResourceManager, ResourceType, SceneNodeDesc, SceneNodeKind};
use glam::Vec3;

use crate::node::NodeKind;
use crate::params::{CameraParam, NodeParam};
use crate::scene::Scene;

fn lookup(rm: &ResourceManager, res_type: ResourceType, name: &str) -> Result<ResHandle> {
    rm.find(res_type, name)
        .ok_or_else(|| ArborError::NotFound(format!("{res_type} '{name}'")))
}

fn lookup_optional(rm: &ResourceManager, res_type: ResourceType, name: Option<&str>) -> Result<ResHandle> {
    match name {
        Some(name) if !name.is_empty() => lookup(rm, res_type, name),
        _ => Ok(ResHandle::NONE),
    }
}

impl Scene {
    /// Instantiates a loaded SceneGraph resource below `parent` and returns the
    /// handle of its root node.
    ///
    /// Either the whole tree is created or, on failure, nothing is left behind.
    pub fn add_nodes(&mut self, rm: &mut ResourceManager, parent: NodeHandle, scene_graph: ResHandle) -> Result<NodeHandle> {
        self.node(parent)?;
        rm.expect_type(scene_graph, ResourceType::SceneGraph)?;
        if !rm.is_loaded(scene_graph) {
            return Err(ArborError::DataUnavailable(scene_graph));
        }
        let Some(root) = rm.scene_graph(scene_graph).map(|g| g.root().clone()) else {
            return Err(ArborError::DataUnavailable(scene_graph));
        };

        let existing = self.node(parent)?.children.len();
        match self.instantiate(rm, parent, &root) {
            Ok(handle) => {
                log::debug!("Instantiated scene graph {scene_graph} as node {handle}");
                Ok(handle)
            }
            Err(e) => {
                let partial: Vec<NodeHandle> = self.node(parent)?.children[existing..].to_vec();
                for handle in partial {
                    if let Err(err) = self.remove_node(rm, handle) {
                        log::warn!("Rolling back node {handle} of scene graph {scene_graph}: {err}");
                    }
                }
                Err(e)
            }
        }
    }

    fn instantiate(&mut self, rm: &mut ResourceManager, parent: NodeHandle, desc: &SceneNodeDesc) -> Result<NodeHandle> {
        let name = desc.name.as_str();
        let handle = match &desc.kind {
            SceneNodeKind::Group => self.add_group(rm, parent, name)?,
            SceneNodeKind::Model(m) => {
                let geometry = lookup(rm, ResourceType::Geometry, &m.geometry)?;
                let handle = self.add_model(rm, parent, name, geometry)?;
                if let Some(data) = self.node_mut(handle)?.model_mut() {
                    data.software_skinning = m.software_skinning;
                    data.lod_distances = m.lod_distances;
                }
                handle
            }
            SceneNodeKind::Mesh(m) => {
                let material = lookup(rm, ResourceType::Material, &m.material)?;
                let handle = self.add_mesh(
                    rm,
                    parent,
                    name,
                    material,
                    m.batch_start,
                    m.batch_count,
                    m.vert_start,
                    m.vert_end,
                )?;
                if let NodeKind::Mesh(data) = &mut self.node_mut(handle)?.kind {
                    data.lod_level = m.lod_level.min(4);
                }
                handle
            }
            SceneNodeKind::Joint { joint_index } => self.add_joint(rm, parent, name, *joint_index)?,
            SceneNodeKind::Light(l) => {
                let material = lookup_optional(rm, ResourceType::Material, l.material.as_deref())?;
                let handle = self.add_light(rm, parent, name, material, &l.lighting_context, &l.shadow_context)?;
                if let NodeKind::Light(data) = &mut self.node_mut(handle)?.kind {
                    data.radius = l.radius;
                    data.fov = l.fov;
                    data.color = Vec3::from(l.color);
                    data.color_multiplier = l.color_multiplier;
                    data.shadow_map_count = l.shadow_map_count.min(4);
                    data.shadow_split_lambda = l.shadow_split_lambda;
                    data.shadow_map_bias = l.shadow_map_bias;
                }
                handle
            }
            SceneNodeKind::Camera(c) => {
                let pipeline = lookup(rm, ResourceType::Pipeline, &c.pipeline)?;
                let output = lookup_optional(rm, ResourceType::Texture, c.output_texture.as_deref())?;
                let handle = self.add_camera(rm, parent, name, pipeline)?;
                if !output.is_none() {
                    self.set_param_i(rm, handle, NodeParam::Camera(CameraParam::OutputTexture), output.raw())?;
                }
                if let NodeKind::Camera(data) = &mut self.node_mut(handle)?.kind {
                    data.output_buffer_index = c.output_buffer_index;
                    data.left = c.left;
                    data.right = c.right;
                    data.bottom = c.bottom;
                    data.top = c.top;
                    data.near = c.near;
                    data.far = c.far;
                    data.viewport = c.viewport;
                    data.ortho = c.ortho;
                    data.occlusion_culling = c.occlusion_culling;
                }
                handle
            }
            SceneNodeKind::Emitter(e) => {
                let material = lookup(rm, ResourceType::Material, &e.material)?;
                let effect = lookup(rm, ResourceType::ParticleEffect, &e.effect)?;
                let handle = self.add_emitter(rm, parent, name, material, effect, e.max_count, e.respawn_count)?;
                if let Some(data) = self.node_mut(handle)?.emitter_mut() {
                    data.delay = e.delay;
                    data.emission_rate = e.emission_rate.max(0.0);
                    data.spread_angle = e.spread_angle;
                    data.force = Vec3::from(e.force);
                }
                handle
            }
        };

        if let Some(attachment) = &desc.attachment {
            self.node_mut(handle)?.attachment.clone_from(attachment);
        }
        self.set_transform(
            handle,
            Vec3::from(desc.translation),
            Vec3::from(desc.rotation),
            Vec3::from(desc.scale),
        )?;

        for child in &desc.children {
            self.instantiate(rm, handle, child)?;
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use arbor_resources::ResFlags;

    const GEO: &str = r#"{"positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2]}"#;

    const KNIGHT: &str = r#"{
        "type": "model", "name": "knight", "geometry": "knight.geo",
        "translation": [0, 2, 0], "attachment": "npc",
        "children": [
            { "type": "mesh", "name": "body", "material": "knight.mat",
              "batch_start": 0, "batch_count": 3, "vert_start": 0, "vert_end": 2 },
            { "type": "light", "name": "torch", "lighting_context": "LIGHTING", "radius": 8 }
        ]
    }"#;

    const BROKEN: &str = r#"{
        "type": "model", "name": "broken", "geometry": "knight.geo",
        "children": [
            { "type": "mesh", "name": "body", "material": "knight.mat",
              "batch_start": 0, "batch_count": 30, "vert_start": 0, "vert_end": 2 }
        ]
    }"#;

    fn manager_with(doc: &str) -> (ResourceManager, ResHandle) {
        let mut rm = ResourceManager::new();
        let sg = rm.add(ResourceType::SceneGraph, "knight.scene", ResFlags::empty()).unwrap();
        rm.load(sg, doc.as_bytes()).unwrap();
        let geo = rm.find(ResourceType::Geometry, "knight.geo").unwrap();
        rm.load(geo, GEO.as_bytes()).unwrap();
        (rm, sg)
    }

    #[test]
    fn test_instantiates_tree() {
        let (mut rm, sg) = manager_with(KNIGHT);
        let mut scene = Scene::default();
        let knight = scene.add_nodes(&mut rm, NodeHandle::ROOT, sg).unwrap();

        assert_eq!(scene.node_type(knight), Some(NodeType::Model));
        assert_eq!(scene.get_param_str(knight, NodeParam::Attachment).unwrap(), "npc");
        let body = scene.child(knight, 0).unwrap().unwrap();
        assert_eq!(scene.node_type(body), Some(NodeType::Mesh));
        let torch = scene.child(knight, 1).unwrap().unwrap();
        let (_, world) = scene.transform_matrices(torch).unwrap();
        assert!((world.w_axis.y - 2.0).abs() < 1e-6);

        let geo = rm.find(ResourceType::Geometry, "knight.geo").unwrap();
        // One reference from the scene graph document, one from the model node.
        assert_eq!(rm.internal_refs(geo), Some(2));
    }

    #[test]
    fn test_failure_leaves_nothing_behind() {
        let (mut rm, sg) = manager_with(BROKEN);
        let mut scene = Scene::default();
        assert!(scene.add_nodes(&mut rm, NodeHandle::ROOT, sg).is_err());
        assert_eq!(scene.len(), 1);
        let geo = rm.find(ResourceType::Geometry, "knight.geo").unwrap();
        assert_eq!(rm.internal_refs(geo), Some(1));
    }

    #[test]
    fn test_requires_loaded_scene_graph() {
        let mut rm = ResourceManager::new();
        let sg = rm.add(ResourceType::SceneGraph, "empty.scene", ResFlags::empty()).unwrap();
        let mut scene = Scene::default();
        assert!(matches!(
            scene.add_nodes(&mut rm, NodeHandle::ROOT, sg),
            Err(ArborError::DataUnavailable(_))
        ));
    }
}
