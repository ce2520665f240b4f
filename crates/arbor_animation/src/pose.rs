//! Poses and Frame Sampling
//!
//! A [`Pose`] is the local translation, rotation and scale of one animated
//! entity. Animation resources store one pose per frame; sampling picks (and
//! optionally interpolates) the pose for an arbitrary frame position.

use glam::{Affine3A, Quat, Vec3};

use crate::values::Interpolatable;

/// Local TRS state of an animated entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn from_affine(matrix: &Affine3A) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    #[must_use]
    pub fn interpolate(&self, other: &Pose, t: f32) -> Pose {
        Pose {
            translation: Vec3::interpolate_linear(self.translation, other.translation, t),
            rotation: Quat::interpolate_linear(self.rotation, other.rotation, t),
            scale: Vec3::interpolate_linear(self.scale, other.scale, t),
        }
    }
}

/// Wraps a frame position into `[0, frame_count)`.
///
/// Negative times wrap from the end, so reverse playback loops as well.
#[must_use]
pub fn wrap_time(time: f32, frame_count: usize) -> f32 {
    if frame_count == 0 || !time.is_finite() {
        return 0.0;
    }
    let wrapped = time.rem_euclid(frame_count as f32);
    // rem_euclid can round up to the divisor for tiny negative inputs
    if wrapped >= frame_count as f32 { 0.0 } else { wrapped }
}

/// Samples `frames` at the frame position `time`.
///
/// With `interpolate` the two neighbouring frames are blended (the last frame
/// blends back towards the first one); otherwise the nearest lower frame is used.
/// Returns `None` for an empty frame list.
#[must_use]
pub fn sample_frames(frames: &[Pose], time: f32, interpolate: bool) -> Option<Pose> {
    let count = frames.len();
    if count == 0 {
        return None;
    }
    if count == 1 {
        return Some(frames[0]);
    }

    let time = wrap_time(time, count);
    let index = (time.floor() as usize).min(count - 1);
    if !interpolate {
        return Some(frames[index]);
    }

    let next = (index + 1) % count;
    let amount = time - index as f32;
    Some(frames[index].interpolate(&frames[next], amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(x: f32) -> Pose {
        Pose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE)
    }

    #[test]
    fn test_wrap_time_loops() {
        assert!((wrap_time(12.5, 10) - 2.5).abs() < 1e-6);
        assert!((wrap_time(-1.0, 10) - 9.0).abs() < 1e-6);
        assert_eq!(wrap_time(3.0, 0), 0.0);
    }

    #[test]
    fn test_sample_interpolates_between_frames() {
        let frames = [translated(0.0), translated(10.0), translated(20.0)];
        let pose = sample_frames(&frames, 1.5, true).unwrap();
        assert!((pose.translation.x - 15.0).abs() < 1e-5);

        let stepped = sample_frames(&frames, 1.5, false).unwrap();
        assert!((stepped.translation.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_sample_empty_is_none() {
        assert!(sample_frames(&[], 0.0, true).is_none());
    }
}
