//! Camera projection and view frustum.
//!
//! Cameras follow the OpenGL conventions of the external renderer: right-handed
//! view space looking down -Z and clip-space depth in `[-1, 1]`.

use arbor_core::{ArborError, BoundingBox, NodeHandle, Result};
use glam::{Affine3A, Mat4, Vec3, Vec4};

use crate::node::{CameraData, NodeKind, NodeType};
use crate::scene::Scene;

impl CameraData {
    /// Sets up a symmetric perspective frustum from a vertical field of view in
    /// degrees.
    pub fn setup_view(&mut self, fov_deg: f32, aspect: f32, near: f32, far: f32) {
        let ymax = near * (fov_deg.to_radians() / 2.0).tan();
        let xmax = ymax * aspect;
        self.left = -xmax;
        self.right = xmax;
        self.bottom = -ymax;
        self.top = ymax;
        self.near = near;
        self.far = far;
    }

    /// Projection matrix built from the frustum planes.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        if self.ortho {
            Mat4::orthographic_rh_gl(self.left, self.right, self.bottom, self.top, self.near, self.far)
        } else {
            frustum_matrix(self.left, self.right, self.bottom, self.top, self.near, self.far)
        }
    }
}

impl Scene {
    /// Sets a symmetric perspective frustum on a Camera node.
    pub fn setup_camera_view(&mut self, camera: NodeHandle, fov_deg: f32, aspect: f32, near: f32, far: f32) -> Result<()> {
        self.expect_type(camera, NodeType::Camera)?;
        if !(near > 0.0 && far > near && aspect > 0.0) {
            return Err(ArborError::InvalidValue {
                context: "camera view",
                value: format!("aspect {aspect}, near {near}, far {far}"),
            });
        }
        if let NodeKind::Camera(cam) = &mut self.node_mut(camera)?.kind {
            cam.setup_view(fov_deg, aspect, near, far);
        }
        Ok(())
    }

    pub fn camera_projection(&self, camera: NodeHandle) -> Result<Mat4> {
        self.expect_type(camera, NodeType::Camera)?
            .camera()
            .map(CameraData::projection_matrix)
            .ok_or(ArborError::InvalidNode(camera))
    }
}

/// OpenGL-style perspective matrix for an off-center frustum.
#[must_use]
pub fn frustum_matrix(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new((right + left) / width, (top + bottom) / height, -(far + near) / depth, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * far * near / depth, 0.0),
    )
}

/// View matrix of a camera with the given world transform.
#[must_use]
pub fn view_matrix(world: &Affine3A) -> Mat4 {
    Mat4::from(world.inverse())
}

/// The six clip planes of a view-projection matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Extracts the planes with the Gribb-Hartmann method. Plane normals point
    /// inwards.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[3] + rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    /// Returns `false` only if the box lies completely outside one plane.
    #[must_use]
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        if bbox.is_empty() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            // Corner furthest along the plane normal.
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bbox.max, bbox.min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}
