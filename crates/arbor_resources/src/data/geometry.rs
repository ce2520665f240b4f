use arbor_core::{BoundingBox, Result};
use glam::{Mat4, Vec3};
use serde::Deserialize;

use super::{Elements, invalid, parse_json};
use crate::params::{GeoParam, ResElem, ResParam};

/// Floats per vertex in the tangent stream.
pub const TANGENT_STRIDE: usize = 7;
/// Floats per vertex in the static attribute stream.
pub const STATIC_STRIDE: usize = 12;

const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Deserialize)]
struct GeometryDesc {
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    indices: Vec<u32>,
    #[serde(default)]
    normals: Vec<[f32; 3]>,
    #[serde(default)]
    tangents: Vec<[f32; 4]>,
    #[serde(default)]
    texcoords0: Vec<[f32; 2]>,
    #[serde(default)]
    texcoords1: Vec<[f32; 2]>,
    #[serde(default)]
    joint_indices: Vec<[f32; 4]>,
    #[serde(default)]
    joint_weights: Vec<[f32; 4]>,
    #[serde(default)]
    joints: Vec<JointDesc>,
    #[serde(default)]
    morph_targets: Vec<MorphTargetDesc>,
}

#[derive(Debug, Deserialize)]
struct JointDesc {
    name: String,
    #[serde(default = "identity_matrix")]
    inv_bind_matrix: [f32; 16],
}

fn identity_matrix() -> [f32; 16] {
    IDENTITY_MATRIX
}

#[derive(Debug, Deserialize)]
struct MorphTargetDesc {
    name: String,
    #[serde(default)]
    vertices: Vec<u32>,
    #[serde(default)]
    offsets: Vec<[f32; 3]>,
}

/// A skeleton joint stored in a Geometry resource.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJoint {
    pub name: String,
    /// Column-major inverse bind matrix.
    pub inv_bind: Mat4,
}

/// Sparse position offsets of one morph target.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    pub vertices: Vec<u32>,
    pub offsets: Vec<Vec3>,
}

/// Triangle geometry with optional skeleton and morph targets.
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    pub(crate) positions: Vec<Vec3>,
    pub(crate) indices: Vec<u32>,
    pub(crate) tangents: Vec<f32>,
    pub(crate) statics: Vec<f32>,
    pub(crate) joints: Vec<GeoJoint>,
    pub(crate) morph_targets: Vec<MorphTarget>,
    pub(crate) bbox: BoundingBox,
}

impl GeometryData {
    pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let desc: GeometryDesc = parse_json(name, bytes)?;
        let vertex_count = desc.positions.len();

        if desc.indices.len() % 3 != 0 {
            return Err(invalid(name, "index count is not a multiple of 3"));
        }
        if let Some(bad) = desc.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(invalid(name, format!("index {bad} exceeds vertex count {vertex_count}")));
        }

        let check_len = |len: usize, what: &str| {
            if len != 0 && len != vertex_count {
                Err(invalid(name, format!("{what} has {len} entries for {vertex_count} vertices")))
            } else {
                Ok(())
            }
        };
        check_len(desc.normals.len(), "normals")?;
        check_len(desc.tangents.len(), "tangents")?;
        check_len(desc.texcoords0.len(), "texcoords0")?;
        check_len(desc.texcoords1.len(), "texcoords1")?;
        check_len(desc.joint_indices.len(), "joint_indices")?;
        check_len(desc.joint_weights.len(), "joint_weights")?;

        let joint_count = desc.joints.len() as f32;
        if desc.joint_indices.iter().flatten().any(|&j| j < 0.0 || (j >= joint_count && j != 0.0)) {
            return Err(invalid(name, "joint index out of range"));
        }

        let mut tangents = Vec::with_capacity(vertex_count * TANGENT_STRIDE);
        let mut statics = Vec::with_capacity(vertex_count * STATIC_STRIDE);
        for v in 0..vertex_count {
            let n = desc.normals.get(v).copied().unwrap_or([0.0, 0.0, 1.0]);
            let t = desc.tangents.get(v).copied().unwrap_or([1.0, 0.0, 0.0, 1.0]);
            tangents.extend_from_slice(&n);
            tangents.extend_from_slice(&t);

            let uv0 = desc.texcoords0.get(v).copied().unwrap_or_default();
            let uv1 = desc.texcoords1.get(v).copied().unwrap_or_default();
            let ji = desc.joint_indices.get(v).copied().unwrap_or_default();
            let jw = desc.joint_weights.get(v).copied().unwrap_or([1.0, 0.0, 0.0, 0.0]);
            statics.extend_from_slice(&uv0);
            statics.extend_from_slice(&ji);
            statics.extend_from_slice(&jw);
            statics.extend_from_slice(&uv1);
        }

        let mut morph_targets = Vec::with_capacity(desc.morph_targets.len());
        for target in desc.morph_targets {
            if target.vertices.len() != target.offsets.len() {
                return Err(invalid(name, format!("morph target '{}' has mismatched offsets", target.name)));
            }
            if target.vertices.iter().any(|&i| i as usize >= vertex_count) {
                return Err(invalid(name, format!("morph target '{}' references a missing vertex", target.name)));
            }
            morph_targets.push(MorphTarget {
                name: target.name,
                vertices: target.vertices,
                offsets: target.offsets.into_iter().map(Vec3::from).collect(),
            });
        }

        let positions: Vec<Vec3> = desc.positions.into_iter().map(Vec3::from).collect();
        let bbox = BoundingBox::from_points(&positions);

        Ok(Self {
            positions,
            indices: desc.indices,
            tangents,
            statics,
            joints: desc
                .joints
                .into_iter()
                .map(|j| GeoJoint {
                    name: j.name,
                    inv_bind: Mat4::from_cols_array(&j.inv_bind_matrix),
                })
                .collect(),
            morph_targets,
            bbox,
        })
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn joints(&self) -> &[GeoJoint] {
        &self.joints
    }

    #[must_use]
    pub fn morph_targets(&self) -> &[MorphTarget] {
        &self.morph_targets
    }

    /// Object-space bounds of all vertices.
    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Bounds of the vertex range `[start, end]`.
    #[must_use]
    pub fn range_bbox(&self, start: usize, end: usize) -> BoundingBox {
        match self.positions.get(start..=end.min(self.positions.len().saturating_sub(1))) {
            Some(range) if start <= end => BoundingBox::from_points(range),
            _ => BoundingBox::EMPTY,
        }
    }

    pub(crate) fn update_bbox(&mut self) {
        self.bbox = BoundingBox::from_points(&self.positions);
    }
}

impl Elements for GeometryData {
    fn elem_count(&self, elem: ResElem) -> usize {
        usize::from(elem == ResElem::Geometry)
    }

    fn get_int(&self, _elem: ResElem, _index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Geo(GeoParam::IndexCount) => self.indices.len() as i32,
            ResParam::Geo(GeoParam::VertexCount) => self.positions.len() as i32,
            // Indices are always stored as 32 bit
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = r#"{
        "positions": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
        "indices": [0,1,2, 0,2,3],
        "joints": [{"name": "hip"}],
        "morph_targets": [{"name": "smile", "vertices": [2], "offsets": [[0,0.5,0]]}]
    }"#;

    #[test]
    fn test_parse_builds_streams() {
        let geo = GeometryData::parse("quad", QUAD.as_bytes()).unwrap();
        assert_eq!(geo.vertex_count(), 4);
        assert_eq!(geo.index_count(), 6);
        assert_eq!(geo.tangents.len(), 4 * TANGENT_STRIDE);
        assert_eq!(geo.statics.len(), 4 * STATIC_STRIDE);
        assert_eq!(geo.joints()[0].inv_bind, Mat4::IDENTITY);
        assert_eq!(geo.bbox().max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let data = r#"{"positions": [[0,0,0],[1,0,0],[1,1,0]], "indices": [0,1,5]}"#;
        assert!(GeometryData::parse("bad", data.as_bytes()).is_err());
    }

    #[test]
    fn test_range_bbox() {
        let geo = GeometryData::parse("quad", QUAD.as_bytes()).unwrap();
        let bb = geo.range_bbox(1, 2);
        assert_eq!(bb.min, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bb.max, Vec3::new(1.0, 1.0, 0.0));
    }
}
