//! Model animation and morph targets.
//!
//! Stages only record what should play. The poses are produced by
//! [`Scene::update_animations`], which blends every dirty Model's stages onto its
//! Mesh and Joint descendants. Animated entities are matched to nodes by name.

use arbor_animation::{PoseBlender, STAGE_COUNT, sample_frames, stage_weights, wrap_time};
use arbor_core::{ArborError, NodeHandle, ResHandle, Result};
use arbor_resources::{ResourceManager, ResourceType};
use rustc_hash::FxHashSet;

use crate::node::NodeType;
use crate::scene::Scene;
use crate::transform_system;

impl Scene {
    fn check_stage(stage: usize) -> Result<()> {
        if stage >= STAGE_COUNT {
            return Err(ArborError::IndexOutOfRange {
                context: "animation stage",
                index: stage,
            });
        }
        Ok(())
    }

    /// Assigns an Animation to a stage of a Model. `NONE` clears the slot.
    ///
    /// The stage restarts at time 0 with weight 0.
    pub fn setup_anim_stage(
        &mut self,
        rm: &mut ResourceManager,
        model: NodeHandle,
        stage: usize,
        anim: ResHandle,
        layer: u32,
        start_node: &str,
        additive: bool,
    ) -> Result<()> {
        self.expect_type(model, NodeType::Model)?;
        Self::check_stage(stage)?;
        if !anim.is_none() {
            rm.expect_type(anim, ResourceType::Animation)?;
        }

        let node = self.node_mut(model)?;
        let Some(data) = node.model_mut() else {
            return Ok(());
        };
        let slot = &mut data.stages[stage];
        if slot.anim != anim {
            if !anim.is_none() {
                rm.acquire(anim)?;
            }
            if !slot.anim.is_none() {
                Self::release_ref(rm, model, slot.anim);
            }
        }
        slot.anim = anim;
        slot.layer = layer;
        slot.start_node = start_node.to_string();
        slot.additive = additive;
        slot.time = 0.0;
        slot.weight = 0.0;
        data.anim_dirty = true;
        Ok(())
    }

    /// Sets the playback position (in frames, looped over the animation length)
    /// and the blend weight of a stage.
    pub fn set_anim_params(
        &mut self,
        rm: &ResourceManager,
        model: NodeHandle,
        stage: usize,
        time: f32,
        weight: f32,
    ) -> Result<()> {
        self.expect_type(model, NodeType::Model)?;
        Self::check_stage(stage)?;

        let node = self.node_mut(model)?;
        let Some(data) = node.model_mut() else {
            return Ok(());
        };
        let slot = &mut data.stages[stage];
        // Sampling wraps again, so an animation loaded later still starts at `time`.
        slot.time = match rm.animation(slot.anim).map_or(0, |a| a.frame_count()) {
            0 => time,
            frame_count => wrap_time(time, frame_count),
        };
        slot.weight = weight;
        data.anim_dirty = true;
        Ok(())
    }

    /// Sets the weight of a morph target, or of all of them for an empty name.
    pub fn set_morpher(&mut self, rm: &ResourceManager, model: NodeHandle, target: &str, weight: f32) -> Result<()> {
        self.expect_type(model, NodeType::Model)?;
        let Some(geo) = self.model_geometry(rm, model) else {
            return Err(ArborError::NotFound(format!("morph target '{target}'")));
        };
        let names: Vec<&str> = geo.morph_targets().iter().map(|t| t.name.as_str()).collect();

        let index = if target.is_empty() {
            None
        } else {
            Some(
                names
                    .iter()
                    .position(|&n| n == target)
                    .ok_or_else(|| ArborError::NotFound(format!("morph target '{target}'")))?,
            )
        };

        let Some(data) = self.node_mut(model)?.model_mut() else {
            return Ok(());
        };
        data.morph_weights.resize(names.len(), 0.0);
        match index {
            Some(i) => data.morph_weights[i] = weight,
            None => data.morph_weights.fill(weight),
        }
        data.anim_dirty = true;
        Ok(())
    }

    /// Nodes animated by `model`: its Mesh and Joint descendants, not crossing
    /// into nested Models.
    fn animated_nodes(&self, model: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeHandle> = self
            .nodes
            .get(model)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            match node.node_type() {
                NodeType::Model => continue,
                NodeType::Mesh | NodeType::Joint => out.push(handle),
                _ => {}
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Blends the stages of every Model whose stages changed and writes the
    /// resulting poses into the local transforms of its Meshes and Joints.
    ///
    /// With `interpolate` off the nearest lower frame is used. Returns the number
    /// of nodes that received a pose.
    pub fn update_animations(&mut self, rm: &ResourceManager, interpolate: bool) -> usize {
        let dirty: Vec<NodeHandle> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.model().is_some_and(|m| m.anim_dirty))
            .map(|(h, _)| h)
            .collect();

        let mut animated = 0;
        let mut blender = PoseBlender::new();
        for model in dirty {
            let Some(stages) = self.nodes.get(model).and_then(|n| n.model()).map(|m| m.stages.clone()) else {
                continue;
            };
            let weights = stage_weights(&stages);
            let targets = self.animated_nodes(model);

            // Stages restricted to a start node only reach that node's subtree.
            let scopes: Vec<Option<FxHashSet<NodeHandle>>> = stages
                .iter()
                .map(|stage| {
                    if stage.start_node.is_empty() {
                        return None;
                    }
                    let start = transform_system::collect_subtree(&self.nodes, model)
                        .into_iter()
                        .find(|&h| self.nodes.get(h).is_some_and(|n| n.name == stage.start_node));
                    Some(
                        start
                            .map(|s| transform_system::collect_subtree(&self.nodes, s).into_iter().collect())
                            .unwrap_or_default(),
                    )
                })
                .collect();

            for handle in targets {
                let Some(node) = self.nodes.get(handle) else {
                    continue;
                };
                blender.reset();
                for (i, stage) in stages.iter().enumerate() {
                    if weights[i] <= 0.0 {
                        continue;
                    }
                    if let Some(scope) = &scopes[i]
                        && !scope.contains(&handle)
                    {
                        continue;
                    }
                    let Some(entity) = rm.animation(stage.anim).and_then(|a| a.entity(&node.name)) else {
                        continue;
                    };
                    let Some(pose) = sample_frames(&entity.frames, stage.time, interpolate) else {
                        continue;
                    };
                    if stage.additive {
                        blender.add_additive(weights[i], &pose, &entity.frames[0]);
                    } else {
                        blender.add(weights[i], &pose);
                    }
                }

                if let Some(pose) = blender.finish()
                    && let Some(node) = self.nodes.get_mut(handle)
                {
                    node.transform.set_pose(pose.translation, pose.rotation, pose.scale);
                    animated += 1;
                }
            }

            if let Some(data) = self.nodes.get_mut(model).and_then(|n| n.model_mut()) {
                data.anim_dirty = false;
            }
            transform_system::update_subtree(&mut self.nodes, model);
        }

        if animated > 0 {
            log::trace!("Animated {animated} nodes");
        }
        animated
    }

    /// Morph weights of a Model, one per target of its geometry.
    pub fn morph_weights(&self, model: NodeHandle) -> Result<&[f32]> {
        let node = self.expect_type(model, NodeType::Model)?;
        Ok(node.model().map_or(&[][..], |m| m.morph_weights.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_resources::ResFlags;
    use glam::Vec3;

    const GEO: &str = r#"{
        "positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2],
        "joints": [{"name": "hip"}],
        "morph_targets": [{"name": "smile", "vertices": [0], "offsets": [[0,0.1,0]]},
                          {"name": "frown", "vertices": [1], "offsets": [[0,-0.1,0]]}]
    }"#;

    const WALK: &str = r#"{"entities": [
        {"name": "hip", "frames": [{"translation": [0,0,0]}, {"translation": [2,0,0]}]}
    ]}"#;

    const RAISE: &str = r#"{"entities": [
        {"name": "hip", "frames": [{"translation": [0,0,0]}, {"translation": [0,4,0]}]}
    ]}"#;

    struct Fixture {
        scene: Scene,
        rm: ResourceManager,
        model: NodeHandle,
        hip: NodeHandle,
        walk: ResHandle,
        raise: ResHandle,
    }

    fn fixture() -> Fixture {
        let mut rm = ResourceManager::new();
        let geo = rm.add(ResourceType::Geometry, "char.geo", ResFlags::empty()).unwrap();
        rm.load(geo, GEO.as_bytes()).unwrap();
        let walk = rm.add(ResourceType::Animation, "walk.anim", ResFlags::empty()).unwrap();
        rm.load(walk, WALK.as_bytes()).unwrap();
        let raise = rm.add(ResourceType::Animation, "raise.anim", ResFlags::empty()).unwrap();
        rm.load(raise, RAISE.as_bytes()).unwrap();

        let mut scene = Scene::default();
        let model = scene.add_model(&mut rm, NodeHandle::ROOT, "char", geo).unwrap();
        let hip = scene.add_joint(&mut rm, model, "hip", 0).unwrap();
        Fixture {
            scene,
            rm,
            model,
            hip,
            walk,
            raise,
        }
    }

    fn hip_translation(f: &Fixture) -> Vec3 {
        f.scene.transform(f.hip).unwrap().0
    }

    #[test]
    fn test_single_stage_interpolates() {
        let mut f = fixture();
        f.scene.setup_anim_stage(&mut f.rm, f.model, 0, f.walk, 0, "", false).unwrap();
        f.scene.set_anim_params(&f.rm, f.model, 0, 0.5, 1.0).unwrap();
        assert_eq!(f.scene.update_animations(&f.rm, true), 1);
        assert!((hip_translation(&f).x - 1.0).abs() < 1e-5);

        // Nothing changed, so nothing is re-evaluated.
        assert_eq!(f.scene.update_animations(&f.rm, true), 0);
    }

    #[test]
    fn test_time_wraps_and_last_frame_blends_to_first() {
        let mut f = fixture();
        f.scene.setup_anim_stage(&mut f.rm, f.model, 0, f.walk, 0, "", false).unwrap();
        f.scene.set_anim_params(&f.rm, f.model, 0, 3.5, 1.0).unwrap();
        f.scene.update_animations(&f.rm, true);
        // 3.5 wraps to 1.5: halfway from frame 1 (x=2) back to frame 0.
        assert!((hip_translation(&f).x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_additive_stage_adds_delta() {
        let mut f = fixture();
        f.scene.setup_anim_stage(&mut f.rm, f.model, 0, f.walk, 0, "", false).unwrap();
        f.scene.setup_anim_stage(&mut f.rm, f.model, 1, f.raise, 0, "", true).unwrap();
        f.scene.set_anim_params(&f.rm, f.model, 0, 1.0, 1.0).unwrap();
        f.scene.set_anim_params(&f.rm, f.model, 1, 1.0, 0.5).unwrap();
        f.scene.update_animations(&f.rm, false);
        let t = hip_translation(&f);
        assert!((t.x - 2.0).abs() < 1e-5);
        assert!((t.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_start_node_restricts_stage() {
        let mut f = fixture();
        f.scene
            .setup_anim_stage(&mut f.rm, f.model, 0, f.walk, 0, "elsewhere", false)
            .unwrap();
        f.scene.set_anim_params(&f.rm, f.model, 0, 1.0, 1.0).unwrap();
        assert_eq!(f.scene.update_animations(&f.rm, true), 0);
        assert_eq!(hip_translation(&f), Vec3::ZERO);
    }

    #[test]
    fn test_stage_references_and_bounds() {
        let mut f = fixture();
        f.scene.setup_anim_stage(&mut f.rm, f.model, 3, f.walk, 0, "", false).unwrap();
        assert_eq!(f.rm.internal_refs(f.walk), Some(1));
        f.scene
            .setup_anim_stage(&mut f.rm, f.model, 3, ResHandle::NONE, 0, "", false)
            .unwrap();
        assert_eq!(f.rm.internal_refs(f.walk), Some(0));
        assert!(
            f.scene
                .setup_anim_stage(&mut f.rm, f.model, STAGE_COUNT, f.walk, 0, "", false)
                .is_err()
        );
    }

    #[test]
    fn test_morpher() {
        let mut f = fixture();
        f.scene.set_morpher(&f.rm, f.model, "frown", 0.7).unwrap();
        assert_eq!(f.scene.morph_weights(f.model).unwrap(), &[0.0, 0.7]);
        f.scene.set_morpher(&f.rm, f.model, "", 0.2).unwrap();
        assert_eq!(f.scene.morph_weights(f.model).unwrap(), &[0.2, 0.2]);
        assert!(matches!(
            f.scene.set_morpher(&f.rm, f.model, "grin", 1.0),
            Err(ArborError::NotFound(_))
        ));
    }
}
