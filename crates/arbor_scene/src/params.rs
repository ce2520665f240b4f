//! Node Parameters
//!
//! Typed node state is exposed through parameters the same way resource data is:
//! each parameter belongs to one node type (or to all of them, for `Name` and
//! `Attachment`) and has a fixed value kind. Resource-valued parameters move the
//! node's internal reference from the old resource to the new one.

use std::fmt;

use arbor_core::{ArborError, NodeHandle, ResHandle, Result};
use arbor_resources::{ResFlags, ResourceManager, ResourceType, ValueKind};

use crate::node::{NodeKind, NodeType};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelParam {
    /// Geometry resource
    Geometry,
    /// 1 to skin on the CPU
    SoftwareSkinning,
    LodDist1,
    LodDist2,
    LodDist3,
    LodDist4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshParam {
    /// Material resource
    Material,
    /// First index of the batch [read-only]
    BatchStart,
    /// Number of indices of the batch [read-only]
    BatchCount,
    /// First vertex used by the batch [read-only]
    VertStart,
    /// Last vertex used by the batch [read-only]
    VertEnd,
    /// LOD level the mesh is drawn at (0..=4)
    LodLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointParam {
    /// Index into the geometry's joint list [read-only]
    JointIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightParam {
    /// Material resource, 0 for none
    Material,
    Radius,
    /// Cone angle in degrees
    Fov,
    /// RGB color
    Color,
    ColorMultiplier,
    /// Number of shadow maps (0..=4)
    ShadowMapCount,
    ShadowSplitLambda,
    ShadowMapBias,
    LightingContext,
    ShadowContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraParam {
    /// Pipeline resource
    Pipeline,
    /// Renderable Texture resource, 0 for the main framebuffer
    OutputTexture,
    OutputBufferIndex,
    LeftPlane,
    RightPlane,
    BottomPlane,
    TopPlane,
    NearPlane,
    FarPlane,
    ViewportX,
    ViewportY,
    ViewportWidth,
    ViewportHeight,
    /// 1 for an orthographic projection
    Ortho,
    /// 1 to skip nodes reported occluded last frame
    OcclusionCulling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitterParam {
    /// Material resource
    Material,
    /// ParticleEffect resource
    Effect,
    MaxCount,
    /// Spawns per particle slot, -1 for unlimited
    RespawnCount,
    Delay,
    EmissionRate,
    /// Cone angle in degrees
    SpreadAngle,
    /// Constant force vector
    Force,
}

/// A node parameter, tagged with the node type it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeParam {
    Name,
    /// Free-form attachment string for application data
    Attachment,
    Model(ModelParam),
    Mesh(MeshParam),
    Joint(JointParam),
    Light(LightParam),
    Camera(CameraParam),
    Emitter(EmitterParam),
}

impl fmt::Display for NodeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("Name"),
            Self::Attachment => f.write_str("Attachment"),
            Self::Model(p) => write!(f, "Model::{p:?}"),
            Self::Mesh(p) => write!(f, "Mesh::{p:?}"),
            Self::Joint(p) => write!(f, "Joint::{p:?}"),
            Self::Light(p) => write!(f, "Light::{p:?}"),
            Self::Camera(p) => write!(f, "Camera::{p:?}"),
            Self::Emitter(p) => write!(f, "Emitter::{p:?}"),
        }
    }
}

impl NodeParam {
    #[must_use]
    pub fn applies_to(self, node_type: NodeType) -> bool {
        match self {
            Self::Name | Self::Attachment => true,
            Self::Model(_) => node_type == NodeType::Model,
            Self::Mesh(_) => node_type == NodeType::Mesh,
            Self::Joint(_) => node_type == NodeType::Joint,
            Self::Light(_) => node_type == NodeType::Light,
            Self::Camera(_) => node_type == NodeType::Camera,
            Self::Emitter(_) => node_type == NodeType::Emitter,
        }
    }

    #[must_use]
    pub fn kind(self) -> ValueKind {
        use CameraParam as C;
        match self {
            Self::Name
            | Self::Attachment
            | Self::Light(LightParam::LightingContext | LightParam::ShadowContext) => ValueKind::Str,
            Self::Model(ModelParam::Geometry | ModelParam::SoftwareSkinning)
            | Self::Mesh(_)
            | Self::Joint(_)
            | Self::Light(LightParam::Material | LightParam::ShadowMapCount)
            | Self::Camera(
                C::Pipeline
                | C::OutputTexture
                | C::OutputBufferIndex
                | C::ViewportX
                | C::ViewportY
                | C::ViewportWidth
                | C::ViewportHeight
                | C::Ortho
                | C::OcclusionCulling,
            )
            | Self::Emitter(
                EmitterParam::Material | EmitterParam::Effect | EmitterParam::MaxCount | EmitterParam::RespawnCount,
            ) => ValueKind::Int,
            Self::Light(LightParam::Color) | Self::Emitter(EmitterParam::Force) => ValueKind::Float(3),
            Self::Model(_) | Self::Light(_) | Self::Camera(_) | Self::Emitter(_) => ValueKind::Float(1),
        }
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(
            self,
            Self::Mesh(MeshParam::BatchStart | MeshParam::BatchCount | MeshParam::VertStart | MeshParam::VertEnd)
                | Self::Joint(JointParam::JointIndex)
        )
    }

    /// Resource type a handle-valued parameter points to, and whether 0 is
    /// accepted.
    #[must_use]
    pub fn handle_target(self) -> Option<(ResourceType, bool)> {
        match self {
            Self::Model(ModelParam::Geometry) => Some((ResourceType::Geometry, false)),
            Self::Mesh(MeshParam::Material) | Self::Emitter(EmitterParam::Material) => {
                Some((ResourceType::Material, false))
            }
            Self::Light(LightParam::Material) => Some((ResourceType::Material, true)),
            Self::Camera(CameraParam::Pipeline) => Some((ResourceType::Pipeline, false)),
            Self::Camera(CameraParam::OutputTexture) => Some((ResourceType::Texture, true)),
            Self::Emitter(EmitterParam::Effect) => Some((ResourceType::ParticleEffect, false)),
            _ => None,
        }
    }
}

fn non_negative(context: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| ArborError::InvalidValue {
        context,
        value: value.to_string(),
    })
}

fn bounded(context: &'static str, value: i32, max: u32) -> Result<u32> {
    let v = non_negative(context, value)?;
    if v > max {
        return Err(ArborError::InvalidValue {
            context,
            value: value.to_string(),
        });
    }
    Ok(v)
}

fn finite(context: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArborError::InvalidValue {
            context,
            value: value.to_string(),
        })
    }
}

impl Scene {
    fn check_param(&self, handle: NodeHandle, param: NodeParam, kind_ok: impl Fn(ValueKind) -> bool) -> Result<()> {
        let node_type = self.node(handle)?.node_type();
        if !param.applies_to(node_type) || !kind_ok(param.kind()) {
            return Err(ArborError::ParamMismatch {
                elem: node_type.to_string(),
                param: param.to_string(),
            });
        }
        Ok(())
    }

    fn check_node_write(&self, handle: NodeHandle, param: NodeParam, kind_ok: impl Fn(ValueKind) -> bool) -> Result<()> {
        self.check_param(handle, param, kind_ok)?;
        if !param.is_writable() {
            return Err(ArborError::ReadOnlyParam(param.to_string()));
        }
        Ok(())
    }

    fn check_comp(param: NodeParam, comp: usize) -> Result<()> {
        match param.kind() {
            ValueKind::Float(n) if comp >= n => Err(ArborError::IndexOutOfRange {
                context: "parameter component",
                index: comp,
            }),
            _ => Ok(()),
        }
    }

    pub fn get_param_i(&self, handle: NodeHandle, param: NodeParam) -> Result<i32> {
        self.check_param(handle, param, |k| k == ValueKind::Int)?;
        let node = self.node(handle)?;
        let value = match (&node.kind, param) {
            (NodeKind::Model(m), NodeParam::Model(p)) => match p {
                ModelParam::Geometry => m.geometry.raw(),
                ModelParam::SoftwareSkinning => i32::from(m.software_skinning),
                _ => 0,
            },
            (NodeKind::Mesh(m), NodeParam::Mesh(p)) => {
                let v = match p {
                    MeshParam::Material => return Ok(m.material.raw()),
                    MeshParam::BatchStart => m.batch_start,
                    MeshParam::BatchCount => m.batch_count,
                    MeshParam::VertStart => m.vert_start,
                    MeshParam::VertEnd => m.vert_end,
                    MeshParam::LodLevel => m.lod_level,
                };
                v as i32
            }
            (NodeKind::Joint(j), NodeParam::Joint(JointParam::JointIndex)) => j.joint_index as i32,
            (NodeKind::Light(l), NodeParam::Light(p)) => match p {
                LightParam::Material => l.material.raw(),
                LightParam::ShadowMapCount => l.shadow_map_count as i32,
                _ => 0,
            },
            (NodeKind::Camera(c), NodeParam::Camera(p)) => match p {
                CameraParam::Pipeline => c.pipeline.raw(),
                CameraParam::OutputTexture => c.output_texture.raw(),
                CameraParam::OutputBufferIndex => c.output_buffer_index as i32,
                CameraParam::ViewportX => c.viewport[0],
                CameraParam::ViewportY => c.viewport[1],
                CameraParam::ViewportWidth => c.viewport[2],
                CameraParam::ViewportHeight => c.viewport[3],
                CameraParam::Ortho => i32::from(c.ortho),
                CameraParam::OcclusionCulling => i32::from(c.occlusion_culling),
                _ => 0,
            },
            (NodeKind::Emitter(e), NodeParam::Emitter(p)) => match p {
                EmitterParam::Material => e.material.raw(),
                EmitterParam::Effect => e.effect.raw(),
                EmitterParam::MaxCount => e.max_count as i32,
                EmitterParam::RespawnCount => e.respawn_count,
                _ => 0,
            },
            _ => 0,
        };
        Ok(value)
    }

    pub fn get_param_f(&self, handle: NodeHandle, param: NodeParam, comp: usize) -> Result<f32> {
        self.check_param(handle, param, |k| matches!(k, ValueKind::Float(_)))?;
        Self::check_comp(param, comp)?;
        let node = self.node(handle)?;
        let value = match (&node.kind, param) {
            (NodeKind::Model(m), NodeParam::Model(p)) => match p {
                ModelParam::LodDist1 => m.lod_distances[0],
                ModelParam::LodDist2 => m.lod_distances[1],
                ModelParam::LodDist3 => m.lod_distances[2],
                ModelParam::LodDist4 => m.lod_distances[3],
                _ => 0.0,
            },
            (NodeKind::Light(l), NodeParam::Light(p)) => match p {
                LightParam::Radius => l.radius,
                LightParam::Fov => l.fov,
                LightParam::Color => l.color[comp],
                LightParam::ColorMultiplier => l.color_multiplier,
                LightParam::ShadowSplitLambda => l.shadow_split_lambda,
                LightParam::ShadowMapBias => l.shadow_map_bias,
                _ => 0.0,
            },
            (NodeKind::Camera(c), NodeParam::Camera(p)) => match p {
                CameraParam::LeftPlane => c.left,
                CameraParam::RightPlane => c.right,
                CameraParam::BottomPlane => c.bottom,
                CameraParam::TopPlane => c.top,
                CameraParam::NearPlane => c.near,
                CameraParam::FarPlane => c.far,
                _ => 0.0,
            },
            (NodeKind::Emitter(e), NodeParam::Emitter(p)) => match p {
                EmitterParam::Delay => e.delay,
                EmitterParam::EmissionRate => e.emission_rate,
                EmitterParam::SpreadAngle => e.spread_angle,
                EmitterParam::Force => e.force[comp],
                _ => 0.0,
            },
            _ => 0.0,
        };
        Ok(value)
    }

    pub fn get_param_str(&self, handle: NodeHandle, param: NodeParam) -> Result<&str> {
        self.check_param(handle, param, |k| k == ValueKind::Str)?;
        let node = self.node(handle)?;
        Ok(match (&node.kind, param) {
            (_, NodeParam::Name) => &node.name,
            (_, NodeParam::Attachment) => &node.attachment,
            (NodeKind::Light(l), NodeParam::Light(LightParam::LightingContext)) => &l.lighting_context,
            (NodeKind::Light(l), NodeParam::Light(LightParam::ShadowContext)) => &l.shadow_context,
            _ => "",
        })
    }

    /// Validates a new resource binding and moves the internal reference.
    fn rebind(
        rm: &mut ResourceManager,
        owner: NodeHandle,
        old: ResHandle,
        new: ResHandle,
        target: ResourceType,
        optional: bool,
    ) -> Result<()> {
        if new.is_none() {
            if !optional {
                return Err(ArborError::InvalidResource(new));
            }
        } else {
            let res = rm.expect_type(new, target)?;
            if target == ResourceType::Texture && !res.flags().contains(ResFlags::TEX_RENDERABLE) {
                return Err(ArborError::InvalidValue {
                    context: "output texture",
                    value: format!("{} is not renderable", res.name()),
                });
            }
        }
        if old != new {
            if !new.is_none() {
                rm.acquire(new)?;
            }
            if !old.is_none() {
                Self::release_ref(rm, owner, old);
            }
        }
        Ok(())
    }

    /// Sets an integer parameter. Resource-valued parameters take a raw handle.
    pub fn set_param_i(&mut self, rm: &mut ResourceManager, handle: NodeHandle, param: NodeParam, value: i32) -> Result<()> {
        self.check_node_write(handle, param, |k| k == ValueKind::Int)?;

        if let Some((target, optional)) = param.handle_target() {
            let old = ResHandle::from_raw(self.get_param_i(handle, param)?);
            let new = ResHandle::from_raw(value);
            Self::rebind(rm, handle, old, new, target, optional)?;
            if param == NodeParam::Model(ModelParam::Geometry) {
                let targets = rm.geometry(new).map_or(0, |g| g.morph_targets().len());
                if let Some(model) = self.node_mut(handle)?.model_mut() {
                    model.morph_weights = vec![0.0; targets];
                }
            }
        }

        let node = self.node_mut(handle)?;
        match (&mut node.kind, param) {
            (NodeKind::Model(m), NodeParam::Model(p)) => match p {
                ModelParam::Geometry => m.geometry = ResHandle::from_raw(value),
                ModelParam::SoftwareSkinning => m.software_skinning = value != 0,
                _ => {}
            },
            (NodeKind::Mesh(m), NodeParam::Mesh(p)) => match p {
                MeshParam::Material => m.material = ResHandle::from_raw(value),
                MeshParam::LodLevel => m.lod_level = bounded("mesh lod level", value, 4)?,
                _ => {}
            },
            (NodeKind::Light(l), NodeParam::Light(p)) => match p {
                LightParam::Material => l.material = ResHandle::from_raw(value),
                LightParam::ShadowMapCount => l.shadow_map_count = bounded("shadow map count", value, 4)?,
                _ => {}
            },
            (NodeKind::Camera(c), NodeParam::Camera(p)) => match p {
                CameraParam::Pipeline => c.pipeline = ResHandle::from_raw(value),
                CameraParam::OutputTexture => c.output_texture = ResHandle::from_raw(value),
                CameraParam::OutputBufferIndex => {
                    c.output_buffer_index = non_negative("output buffer index", value)?;
                }
                CameraParam::ViewportX => c.viewport[0] = value,
                CameraParam::ViewportY => c.viewport[1] = value,
                CameraParam::ViewportWidth => c.viewport[2] = non_negative("viewport width", value)? as i32,
                CameraParam::ViewportHeight => c.viewport[3] = non_negative("viewport height", value)? as i32,
                CameraParam::Ortho => c.ortho = value != 0,
                CameraParam::OcclusionCulling => {
                    c.occlusion_culling = value != 0;
                    c.occluded.clear();
                }
                _ => {}
            },
            (NodeKind::Emitter(e), NodeParam::Emitter(p)) => match p {
                EmitterParam::Material => e.material = ResHandle::from_raw(value),
                EmitterParam::Effect => e.effect = ResHandle::from_raw(value),
                EmitterParam::MaxCount => {
                    e.max_count = non_negative("emitter max count", value)?;
                    e.particles.resize(e.max_count as usize, Default::default());
                }
                EmitterParam::RespawnCount => {
                    if value < -1 {
                        return Err(ArborError::InvalidValue {
                            context: "emitter respawn count",
                            value: value.to_string(),
                        });
                    }
                    e.respawn_count = value;
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub fn set_param_f(&mut self, handle: NodeHandle, param: NodeParam, comp: usize, value: f32) -> Result<()> {
        self.check_node_write(handle, param, |k| matches!(k, ValueKind::Float(_)))?;
        Self::check_comp(param, comp)?;
        let value = finite("node float parameter", value)?;

        let node = self.node_mut(handle)?;
        match (&mut node.kind, param) {
            (NodeKind::Model(m), NodeParam::Model(p)) => {
                let slot = match p {
                    ModelParam::LodDist1 => 0,
                    ModelParam::LodDist2 => 1,
                    ModelParam::LodDist3 => 2,
                    _ => 3,
                };
                m.lod_distances[slot] = value;
            }
            (NodeKind::Light(l), NodeParam::Light(p)) => match p {
                LightParam::Radius => l.radius = value,
                LightParam::Fov => l.fov = value,
                LightParam::Color => l.color[comp] = value,
                LightParam::ColorMultiplier => l.color_multiplier = value,
                LightParam::ShadowSplitLambda => l.shadow_split_lambda = value,
                LightParam::ShadowMapBias => l.shadow_map_bias = value,
                _ => {}
            },
            (NodeKind::Camera(c), NodeParam::Camera(p)) => match p {
                CameraParam::LeftPlane => c.left = value,
                CameraParam::RightPlane => c.right = value,
                CameraParam::BottomPlane => c.bottom = value,
                CameraParam::TopPlane => c.top = value,
                CameraParam::NearPlane => c.near = value,
                CameraParam::FarPlane => c.far = value,
                _ => {}
            },
            (NodeKind::Emitter(e), NodeParam::Emitter(p)) => match p {
                EmitterParam::Delay => e.delay = value,
                EmitterParam::EmissionRate => e.emission_rate = value.max(0.0),
                EmitterParam::SpreadAngle => e.spread_angle = value,
                EmitterParam::Force => e.force[comp] = value,
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub fn set_param_str(&mut self, handle: NodeHandle, param: NodeParam, value: &str) -> Result<()> {
        self.check_node_write(handle, param, |k| k == ValueKind::Str)?;
        let node = self.node_mut(handle)?;
        match (&mut node.kind, param) {
            (_, NodeParam::Name) => node.name = value.to_string(),
            (_, NodeParam::Attachment) => node.attachment = value.to_string(),
            (NodeKind::Light(l), NodeParam::Light(LightParam::LightingContext)) => {
                l.lighting_context = value.to_string();
            }
            (NodeKind::Light(l), NodeParam::Light(LightParam::ShadowContext)) => {
                l.shadow_context = value.to_string();
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_light() -> (Scene, ResourceManager, NodeHandle, ResHandle) {
        let mut rm = ResourceManager::new();
        let mat = rm.add(ResourceType::Material, "light.mat", ResFlags::empty()).unwrap();
        let mut scene = Scene::default();
        let light = scene
            .add_light(&mut rm, NodeHandle::ROOT, "sun", ResHandle::NONE, "LIGHTING", "SHADOWMAP")
            .unwrap();
        (scene, rm, light, mat)
    }

    #[test]
    fn test_param_kinds() {
        assert_eq!(NodeParam::Light(LightParam::Color).kind(), ValueKind::Float(3));
        assert_eq!(NodeParam::Camera(CameraParam::ViewportWidth).kind(), ValueKind::Int);
        assert_eq!(NodeParam::Name.kind(), ValueKind::Str);
        assert!(!NodeParam::Mesh(MeshParam::VertEnd).is_writable());
        assert!(NodeParam::Attachment.applies_to(NodeType::Joint));
    }

    #[test]
    fn test_light_material_moves_reference() {
        let (mut scene, mut rm, light, mat) = scene_with_light();
        let param = NodeParam::Light(LightParam::Material);
        scene.set_param_i(&mut rm, light, param, mat.raw()).unwrap();
        assert_eq!(rm.internal_refs(mat), Some(1));
        assert_eq!(scene.get_param_i(light, param).unwrap(), mat.raw());

        scene.set_param_i(&mut rm, light, param, 0).unwrap();
        assert_eq!(rm.internal_refs(mat), Some(0));
    }

    #[test]
    fn test_wrong_type_and_range_rejected() {
        let (mut scene, mut rm, light, _) = scene_with_light();
        assert!(matches!(
            scene.get_param_i(light, NodeParam::Camera(CameraParam::Ortho)),
            Err(ArborError::ParamMismatch { .. })
        ));
        assert!(matches!(
            scene.get_param_f(light, NodeParam::Light(LightParam::Color), 3),
            Err(ArborError::IndexOutOfRange { .. })
        ));
        assert!(
            scene
                .set_param_i(&mut rm, light, NodeParam::Light(LightParam::ShadowMapCount), 5)
                .is_err()
        );
        scene
            .set_param_i(&mut rm, light, NodeParam::Light(LightParam::ShadowMapCount), 3)
            .unwrap();
    }

    #[test]
    fn test_string_params() {
        let (mut scene, _, light, _) = scene_with_light();
        assert_eq!(scene.get_param_str(light, NodeParam::Name).unwrap(), "sun");
        assert_eq!(
            scene
                .get_param_str(light, NodeParam::Light(LightParam::ShadowContext))
                .unwrap(),
            "SHADOWMAP"
        );
        scene.set_param_str(light, NodeParam::Attachment, "<tag/>").unwrap();
        assert_eq!(scene.get_param_str(light, NodeParam::Attachment).unwrap(), "<tag/>");
    }

    #[test]
    fn test_color_components() {
        let (mut scene, _, light, _) = scene_with_light();
        let param = NodeParam::Light(LightParam::Color);
        scene.set_param_f(light, param, 1, 0.25).unwrap();
        assert_eq!(scene.get_param_f(light, param, 1).unwrap(), 0.25);
        assert_eq!(scene.get_param_f(light, param, 0).unwrap(), 1.0);
    }
}
