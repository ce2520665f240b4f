use glam::{Quat, Vec3, Vec4};
use smallvec::SmallVec;

use crate::pose::Pose;

/// Accumulates the weighted poses that affect a single entity.
///
/// Non-additive contributions are averaged by their total weight. Additive
/// contributions are stored as `(weight, pose, reference)` and applied on top of
/// the averaged result as `weight * (pose - reference)`.
#[derive(Debug, Default)]
pub struct PoseBlender {
    translation: Vec3,
    rotation: Vec4,
    scale: Vec3,
    total_weight: f32,
    additive: SmallVec<[(f32, Pose, Pose); 2]>,
}

impl PoseBlender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn add(&mut self, weight: f32, pose: &Pose) {
        if weight <= 0.0 {
            return;
        }
        self.translation += pose.translation * weight;
        self.scale += pose.scale * weight;

        // Keep all rotations in the same hemisphere as the first one
        let mut q = Vec4::from(pose.rotation);
        if self.total_weight > 0.0 && self.rotation.dot(q) < 0.0 {
            q = -q;
        }
        self.rotation += q * weight;
        self.total_weight += weight;
    }

    pub fn add_additive(&mut self, weight: f32, pose: &Pose, reference: &Pose) {
        if weight <= 0.0 {
            return;
        }
        self.additive.push((weight, *pose, *reference));
    }

    #[must_use]
    pub fn total_weight(&self) -> f32 {
        self.total_weight
    }

    /// Produces the blended pose, or `None` when no non-additive contribution
    /// was made. Additive deltas never apply on their own.
    #[must_use]
    pub fn finish(&self) -> Option<Pose> {
        if self.total_weight <= 0.0 {
            return None;
        }
        let inv = 1.0 / self.total_weight;
        let mut pose = Pose {
            translation: self.translation * inv,
            rotation: Quat::from_vec4(self.rotation).normalize(),
            scale: self.scale * inv,
        };

        for (weight, target, reference) in &self.additive {
            pose.translation += (target.translation - reference.translation) * *weight;
            pose.scale += (target.scale - reference.scale) * *weight;
            let delta = reference.rotation.inverse() * target.rotation;
            pose.rotation = (pose.rotation * Quat::IDENTITY.slerp(delta, *weight)).normalize();
        }

        Some(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_are_normalised() {
        let mut blender = PoseBlender::new();
        blender.add(0.2, &Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        blender.add(0.2, &Pose::new(Vec3::new(20.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        let pose = blender.finish().unwrap();
        assert!((pose.translation.x - 15.0).abs() < 1e-5);
        assert!((pose.scale - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn test_additive_requires_base() {
        let mut blender = PoseBlender::new();
        let moved = Pose::new(Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, Vec3::ONE);
        blender.add_additive(0.5, &moved, &Pose::IDENTITY);
        assert!(blender.finish().is_none());

        blender.add(1.0, &Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        let pose = blender.finish().unwrap();
        assert!((pose.translation - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }
}
