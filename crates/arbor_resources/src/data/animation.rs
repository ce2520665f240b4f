use arbor_animation::Pose;
use arbor_core::Result;
use glam::{Quat, Vec3};
use serde::Deserialize;

use super::{Elements, invalid, parse_json};
use crate::params::{AnimParam, ResElem, ResParam};

#[derive(Debug, Deserialize)]
struct AnimationDesc {
    entities: Vec<EntityDesc>,
}

#[derive(Debug, Deserialize)]
struct EntityDesc {
    name: String,
    frames: Vec<FrameDesc>,
}

#[derive(Debug, Deserialize)]
struct FrameDesc {
    #[serde(default)]
    translation: [f32; 3],
    /// Quaternion as `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    scale: [f32; 3],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

/// Frames of a single animated joint or mesh, matched to nodes by name.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimEntity {
    pub name: String,
    pub frames: Vec<Pose>,
}

#[derive(Debug, Clone, Default)]
pub struct AnimationData {
    pub(crate) entities: Vec<AnimEntity>,
    pub(crate) frame_count: usize,
}

impl AnimationData {
    pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let desc: AnimationDesc = parse_json(name, bytes)?;
        let mut entities = Vec::with_capacity(desc.entities.len());

        for entity in desc.entities {
            if entity.frames.is_empty() {
                return Err(invalid(name, format!("entity '{}' has no frames", entity.name)));
            }
            let mut frames = Vec::with_capacity(entity.frames.len());
            for frame in entity.frames {
                let rotation = Quat::from_array(frame.rotation);
                if rotation.length_squared() < 1e-12 {
                    return Err(invalid(name, format!("entity '{}' has a zero rotation", entity.name)));
                }
                frames.push(Pose::new(
                    Vec3::from(frame.translation),
                    rotation.normalize(),
                    Vec3::from(frame.scale),
                ));
            }
            entities.push(AnimEntity {
                name: entity.name,
                frames,
            });
        }

        let frame_count = entities.iter().map(|e| e.frames.len()).max().unwrap_or(0);
        Ok(Self { entities, frame_count })
    }

    /// Frame count of the longest entity. Stage times loop over this range.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub fn entities(&self) -> &[AnimEntity] {
        &self.entities
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&AnimEntity> {
        self.entities.iter().find(|e| e.name == name)
    }
}

impl Elements for AnimationData {
    fn elem_count(&self, elem: ResElem) -> usize {
        if elem == ResElem::AnimEntity { self.entities.len() } else { 0 }
    }

    fn get_int(&self, _elem: ResElem, index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Anim(AnimParam::FrameCount) => self.entities.get(index).map_or(0, |e| e.frames.len() as i32),
            _ => 0,
        }
    }

    fn get_str(&self, _elem: ResElem, index: usize, param: ResParam) -> &str {
        match param {
            ResParam::Anim(AnimParam::EntityName) => self.entities.get(index).map_or("", |e| e.name.as_str()),
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_is_longest_entity() {
        let data = r#"{"entities": [
            {"name": "hip", "frames": [{}, {"translation": [0, 1, 0]}, {}]},
            {"name": "arm", "frames": [{"rotation": [0, 0, 2, 0]}]}
        ]}"#;
        let anim = AnimationData::parse("walk", data.as_bytes()).unwrap();
        assert_eq!(anim.frame_count(), 3);
        let arm = anim.entity("arm").unwrap();
        assert!((arm.frames[0].rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_entity_rejected() {
        let data = r#"{"entities": [{"name": "hip", "frames": []}]}"#;
        assert!(AnimationData::parse("walk", data.as_bytes()).is_err());
    }
}
