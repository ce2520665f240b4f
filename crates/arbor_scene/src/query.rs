//! Scene queries: name search, ray casts, visibility and picking.

use arbor_core::{ArborError, NodeHandle, Result, intersect_triangle};
use arbor_resources::ResourceManager;
use glam::{Mat4, Vec3};

use crate::camera::{Frustum, view_matrix};
use crate::node::{NodeFlags, NodeKind, NodeType};
use crate::scene::Scene;
use crate::transform_system;

/// One ray intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub node: NodeHandle,
    /// World-space distance from the ray origin.
    pub distance: f32,
    /// World-space intersection point.
    pub point: Vec3,
}

impl Scene {
    /// Depth-first pre-order search below (and including) `start`.
    ///
    /// An empty `name` matches every name, `None` matches every type.
    pub fn find_nodes(&self, start: NodeHandle, name: &str, node_type: Option<NodeType>) -> Result<Vec<NodeHandle>> {
        self.node(start)?;
        Ok(transform_system::collect_subtree(&self.nodes, start)
            .into_iter()
            .filter(|&h| {
                self.nodes.get(h).is_some_and(|n| {
                    (name.is_empty() || n.name == name) && node_type.is_none_or(|t| n.node_type() == t)
                })
            })
            .collect())
    }

    /// Intersects the segment `origin + t * direction`, `t` in `[0, 1]`, with the
    /// triangles of LOD 0 Meshes below `start`.
    ///
    /// Subtrees flagged `NO_RAY_QUERY` are skipped. Each Mesh reports its nearest
    /// hit. Hits are sorted by distance; `max_results == 0` keeps all of them.
    pub fn cast_ray(
        &self,
        rm: &ResourceManager,
        start: NodeHandle,
        origin: Vec3,
        direction: Vec3,
        max_results: usize,
    ) -> Result<Vec<RayHit>> {
        self.node(start)?;
        let mut hits = Vec::new();
        let mut stack = vec![start];

        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if node.flags.contains(NodeFlags::NO_RAY_QUERY) {
                continue;
            }
            stack.extend(node.children.iter().rev().copied());

            let NodeKind::Mesh(mesh) = &node.kind else {
                continue;
            };
            if mesh.lod_level != 0 {
                continue;
            }
            let Some(geo) = self.model_geometry(rm, handle) else {
                continue;
            };

            let world = node.transform.world_matrix();
            let inv = world.inverse();
            let local_origin = inv.transform_point3(origin);
            let local_dir = inv.transform_vector3(direction);

            let bounds = geo.range_bbox(mesh.vert_start as usize, mesh.vert_end as usize);
            if bounds.intersect_segment(local_origin, local_dir).is_none() {
                continue;
            }

            let positions = geo.positions();
            let start = mesh.batch_start as usize;
            let end = (start + mesh.batch_count as usize).min(geo.indices().len());
            let nearest = geo.indices()[start.min(end)..end]
                .chunks_exact(3)
                .filter_map(|tri| {
                    let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| positions.get(i as usize).copied());
                    intersect_triangle(local_origin, local_dir, a?, b?, c?)
                })
                .filter(|&t| t <= 1.0)
                .min_by(f32::total_cmp);

            if let Some(t) = nearest {
                let point = origin + direction * t;
                hits.push(RayHit {
                    node: handle,
                    distance: (point - origin).length(),
                    point,
                });
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if max_results > 0 {
            hits.truncate(max_results);
        }
        Ok(hits)
    }

    fn camera_frustum(&self, camera: NodeHandle) -> Result<(Frustum, Vec3)> {
        let node = self.expect_type(camera, NodeType::Camera)?;
        let Some(cam) = node.camera() else {
            return Err(ArborError::InvalidNode(camera));
        };
        let world = node.transform.world_matrix();
        let view_proj = cam.projection_matrix() * view_matrix(world);
        Ok((Frustum::from_matrix(view_proj), world.translation.into()))
    }

    /// Checks a node's subtree bounds against a camera.
    ///
    /// Returns `None` when the node is outside the frustum or was reported
    /// occluded for that camera. Otherwise returns the LOD level the node should
    /// be drawn at, or 0 unless `calc_lod` is set.
    pub fn check_visibility(
        &self,
        rm: &ResourceManager,
        handle: NodeHandle,
        camera: NodeHandle,
        check_occlusion: bool,
        calc_lod: bool,
    ) -> Result<Option<u32>> {
        let (frustum, cam_pos) = self.camera_frustum(camera)?;
        let node_type = self.node(handle)?.node_type();

        let bounds = self.aabb(rm, handle)?;
        if !frustum.intersects_box(&bounds) {
            return Ok(None);
        }

        let model = match node_type {
            NodeType::Mesh | NodeType::Model => self.owning_model(handle),
            _ => None,
        };

        if check_occlusion
            && let Some(cam) = self.nodes.get(camera).and_then(|n| n.camera())
            && cam.occlusion_culling
        {
            let occluded =
                cam.occluded.contains(&handle) || model.is_some_and(|m| cam.occluded.contains(&m));
            if occluded {
                return Ok(None);
            }
        }

        if !calc_lod {
            return Ok(Some(0));
        }
        let lod = model
            .and_then(|m| self.nodes.get(m))
            .and_then(|n| {
                let pos: Vec3 = n.transform.world_matrix().translation.into();
                n.model().map(|data| data.lod_level(pos.distance(cam_pos)))
            })
            .unwrap_or(0);
        Ok(Some(lod))
    }

    /// Records the occlusion query result of `node` for `camera`, consulted by
    /// the next visibility checks.
    pub fn set_occlusion_result(&mut self, camera: NodeHandle, node: NodeHandle, occluded: bool) -> Result<()> {
        self.node(node)?;
        self.expect_type(camera, NodeType::Camera)?;
        if let NodeKind::Camera(cam) = &mut self.node_mut(camera)?.kind {
            if occluded {
                cam.occluded.insert(node);
            } else {
                cam.occluded.remove(&node);
            }
        }
        Ok(())
    }

    /// World-space ray through a point of the camera's view plane.
    ///
    /// `nx` and `ny` are normalized window coordinates with the origin at the
    /// bottom left. Returns the point on the near plane and the vector to the
    /// matching point on the far plane.
    pub fn pick_ray(&self, camera: NodeHandle, nx: f32, ny: f32) -> Result<(Vec3, Vec3)> {
        let node = self.expect_type(camera, NodeType::Camera)?;
        let Some(cam) = node.camera() else {
            return Err(ArborError::InvalidNode(camera));
        };
        let view_proj: Mat4 = cam.projection_matrix() * view_matrix(node.transform.world_matrix());
        let inv = view_proj.inverse();

        let x = nx * 2.0 - 1.0;
        let y = ny * 2.0 - 1.0;
        let near = inv.project_point3(Vec3::new(x, y, -1.0));
        let far = inv.project_point3(Vec3::new(x, y, 1.0));
        Ok((near, far - near))
    }

    /// Nearest Mesh under a point of the camera's view plane.
    pub fn pick_node(&self, rm: &ResourceManager, camera: NodeHandle, nx: f32, ny: f32) -> Result<Option<NodeHandle>> {
        let (origin, direction) = self.pick_ray(camera, nx, ny)?;
        Ok(self
            .cast_ray(rm, NodeHandle::ROOT, origin, direction, 1)?
            .first()
            .map(|hit| hit.node))
    }
}
