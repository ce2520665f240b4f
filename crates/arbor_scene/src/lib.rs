//! Arbor Scene
//!
//! A handle-based scene graph. Nodes form a tree rooted at [`NodeHandle::ROOT`];
//! each node carries a local transform, a cached world transform, flags and
//! type-specific data (models, meshes, joints, lights, cameras, particle
//! emitters).
//!
//! All operations live on [`Scene`]. Operations that need resource data take the
//! [`arbor_resources::ResourceManager`] as an explicit argument.
//!
//! [`NodeHandle::ROOT`]: arbor_core::NodeHandle::ROOT

pub mod animation;
pub mod camera;
pub mod emitter;
pub mod instantiate;
pub mod node;
pub mod params;
pub mod query;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use camera::{Frustum, frustum_matrix, view_matrix};
pub use emitter::Particle;
pub use node::{CameraData, EmitterData, JointData, LightData, MeshData, ModelData, Node, NodeFlags, NodeKind, NodeType};
pub use params::{CameraParam, EmitterParam, JointParam, LightParam, MeshParam, ModelParam, NodeParam};
pub use query::RayHit;
pub use scene::{Scene, SceneSettings};
pub use transform::Transform;
