//! Arbor Animation
//!
//! Frame sampling, animation stages with layered weight blending, and pose
//! accumulation. The scene crate drives these per Model node.

pub mod blend;
pub mod pose;
pub mod stage;
pub mod values;

pub use blend::PoseBlender;
pub use pose::{Pose, sample_frames, wrap_time};
pub use stage::{AnimStage, STAGE_COUNT, stage_weights};
pub use values::Interpolatable;
