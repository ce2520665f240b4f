//! Animation Stages
//!
//! Every Model owns [`STAGE_COUNT`] playback slots. Each slot plays one
//! Animation resource at its own time and weight.
//!
//! # Layer cascade
//!
//! Non-additive stages are grouped by layer and resolved from the highest layer
//! down. Within a layer, weights summing to more than 1.0 are normalised to 1.0.
//! Whatever capacity a layer leaves unused is handed to the next lower layer, so a
//! fully weighted upper layer starves everything below it.
//!
//! Additive stages are outside the cascade and keep their raw weight.

use arbor_core::ResHandle;

/// Number of animation stages available on every Model.
pub const STAGE_COUNT: usize = 16;

/// One playback slot of a Model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimStage {
    /// Animation resource, `NONE` for an empty slot.
    pub anim: ResHandle,
    /// Blending priority. Higher layers are resolved first.
    pub layer: u32,
    /// Name of the node whose subtree the stage is restricted to. Empty means the
    /// whole model.
    pub start_node: String,
    pub additive: bool,
    /// Current frame position, already wrapped into the animation's frame range.
    pub time: f32,
    pub weight: f32,
}

impl Default for AnimStage {
    fn default() -> Self {
        Self {
            anim: ResHandle::NONE,
            layer: 0,
            start_node: String::new(),
            additive: false,
            time: 0.0,
            weight: 0.0,
        }
    }
}

impl AnimStage {
    /// A stage takes part in blending once an animation is assigned.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.anim.is_none()
    }
}

/// Computes the effective blend weight of every stage.
///
/// Inactive stages get 0. Additive stages get their own weight clamped to be
/// non-negative. Non-additive stages get their share of the layer cascade.
#[must_use]
pub fn stage_weights(stages: &[AnimStage]) -> [f32; STAGE_COUNT] {
    let mut weights = [0.0; STAGE_COUNT];

    let mut layers: Vec<u32> = stages
        .iter()
        .take(STAGE_COUNT)
        .filter(|s| s.is_active() && !s.additive)
        .map(|s| s.layer)
        .collect();
    layers.sort_unstable_by(|a, b| b.cmp(a));
    layers.dedup();

    let mut residual = 1.0_f32;
    for layer in layers {
        let members = || {
            stages
                .iter()
                .take(STAGE_COUNT)
                .enumerate()
                .filter(move |(_, s)| s.is_active() && !s.additive && s.layer == layer)
        };

        let sum: f32 = members().map(|(_, s)| s.weight.max(0.0)).sum();
        let norm = if sum > 1.0 { 1.0 / sum } else { 1.0 };

        for (i, stage) in members() {
            weights[i] = stage.weight.max(0.0) * norm * residual;
        }
        residual *= (1.0 - sum * norm).max(0.0);
    }

    for (i, stage) in stages.iter().take(STAGE_COUNT).enumerate() {
        if stage.is_active() && stage.additive {
            weights[i] = stage.weight.max(0.0);
        }
    }

    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(layer: u32, weight: f32) -> AnimStage {
        AnimStage {
            anim: ResHandle::from_raw(1),
            layer,
            weight,
            ..AnimStage::default()
        }
    }

    #[test]
    fn test_residual_cascades_to_lower_layer() {
        let stages = [stage(1, 0.3), stage(1, 0.3), stage(0, 1.0)];
        let w = stage_weights(&stages);
        assert!((w[0] - 0.3).abs() < 1e-6);
        assert!((w[1] - 0.3).abs() < 1e-6);
        assert!((w[2] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_overweight_layer_is_normalised_and_starves_below() {
        let stages = [stage(2, 1.0), stage(2, 3.0), stage(0, 1.0)];
        let w = stage_weights(&stages);
        assert!((w[0] - 0.25).abs() < 1e-6);
        assert!((w[1] - 0.75).abs() < 1e-6);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn test_additive_and_empty_stages() {
        let mut additive = stage(5, 0.8);
        additive.additive = true;
        let stages = [AnimStage::default(), additive, stage(0, 0.5)];
        let w = stage_weights(&stages);
        assert_eq!(w[0], 0.0);
        assert!((w[1] - 0.8).abs() < 1e-6);
        assert!((w[2] - 0.5).abs() < 1e-6);
    }
}
