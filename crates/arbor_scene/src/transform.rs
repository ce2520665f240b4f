use glam::{Affine3A, EulerRot, Mat4, Quat, Vec3};

/// Local transform of a node plus its cached matrices.
///
/// The TRS components are the source of truth. `local_matrix` is rebuilt from
/// them whenever they differ from the shadow copy taken at the last rebuild, and
/// `world_matrix` is written by the transform system.
#[derive(Debug, Clone)]
pub struct Transform {
    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) scale: Vec3,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,

            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,

            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    /// Rebuilds the local matrix if the TRS components changed.
    ///
    /// Returns `true` if the matrix was rebuilt.
    pub fn update_local_matrix(&mut self) -> bool {
        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
            || self.force_update;

        if changed {
            self.local_matrix = Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);
            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.force_update = false;
        }

        changed
    }

    /// Sets translation, Euler rotation (degrees, XYZ order) and scale.
    pub fn set_trs(&mut self, translation: Vec3, rotation_deg: Vec3, scale: Vec3) {
        self.position = translation;
        self.rotation = Quat::from_euler(
            EulerRot::XYZ,
            rotation_deg.x.to_radians(),
            rotation_deg.y.to_radians(),
            rotation_deg.z.to_radians(),
        );
        self.scale = scale;
    }

    pub fn set_pose(&mut self, translation: Vec3, rotation: Quat, scale: Vec3) {
        self.position = translation;
        self.rotation = rotation;
        self.scale = scale;
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Euler rotation in degrees (XYZ order).
    #[must_use]
    pub fn rotation_euler_deg(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.world_matrix)
    }

    pub(crate) fn set_world_matrix(&mut self, mat: Affine3A) {
        self.world_matrix = mat;
    }

    /// Sets the local matrix directly. The TRS components are recovered by
    /// decomposition, which drops any shear.
    pub fn apply_local_matrix(&mut self, mat: Affine3A) {
        self.local_matrix = mat;

        let (scale, rotation, translation) = mat.to_scale_rotation_translation();
        self.scale = scale;
        self.rotation = rotation;
        self.position = translation;

        self.last_scale = scale;
        self.last_rotation = rotation;
        self.last_position = translation;
        // The matrix is kept as given; only the world matrix needs recomputing.
        self.force_update = false;
    }

    pub fn apply_local_matrix_from_mat4(&mut self, mat: Mat4) {
        self.apply_local_matrix(Affine3A::from_mat4(mat));
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trs_round_trip_in_degrees() {
        let mut t = Transform::new();
        t.set_trs(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 90.0, 0.0), Vec3::splat(2.0));
        assert!(t.update_local_matrix());
        assert!(!t.update_local_matrix());

        let euler = t.rotation_euler_deg();
        assert!((euler.y - 90.0).abs() < 1e-3);
        let p = t.local_matrix().transform_point3(Vec3::X);
        // 2x scale, then +X rotated 90 degrees about Y points to -Z.
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_apply_matrix_keeps_components_in_sync() {
        let mut t = Transform::new();
        t.update_local_matrix();
        t.apply_local_matrix(Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        assert_eq!(t.translation(), Vec3::new(0.0, 5.0, 0.0));
        assert!(!t.update_local_matrix());
    }
}
