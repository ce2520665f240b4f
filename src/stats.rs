//! Frame statistics.

/// Names of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStat {
    /// Triangles submitted since the last reset.
    TriCount,
    /// Mesh batches submitted since the last reset.
    BatchCount,
    /// Light passes submitted since the last reset.
    LightPassCount,
    /// Duration of the last finished frame in milliseconds.
    FrameTime,
    /// Time spent blending animations, in milliseconds.
    AnimationTime,
    /// Time spent simulating particles, in milliseconds.
    ParticleSimTime,
    /// Memory held by geometry data, in megabytes.
    GeometryVMem,
    /// Memory held by texture data, in megabytes.
    TextureVMem,
}

/// Counters accumulated by the render session.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrameStats {
    pub tri_count: u64,
    pub batch_count: u64,
    pub light_pass_count: u64,
    pub frame_time_ms: f32,
    pub animation_time_ms: f32,
    pub particle_time_ms: f32,
}

impl FrameStats {
    /// Reads a counter and optionally resets it. Memory statistics are not
    /// counters and are handled by the engine.
    pub fn take(&mut self, stat: EngineStat, reset: bool) -> f32 {
        let value = match stat {
            EngineStat::TriCount => self.tri_count as f32,
            EngineStat::BatchCount => self.batch_count as f32,
            EngineStat::LightPassCount => self.light_pass_count as f32,
            EngineStat::FrameTime => self.frame_time_ms,
            EngineStat::AnimationTime => self.animation_time_ms,
            EngineStat::ParticleSimTime => self.particle_time_ms,
            EngineStat::GeometryVMem | EngineStat::TextureVMem => 0.0,
        };
        if reset {
            match stat {
                EngineStat::TriCount => self.tri_count = 0,
                EngineStat::BatchCount => self.batch_count = 0,
                EngineStat::LightPassCount => self.light_pass_count = 0,
                EngineStat::AnimationTime => self.animation_time_ms = 0.0,
                EngineStat::ParticleSimTime => self.particle_time_ms = 0.0,
                EngineStat::FrameTime | EngineStat::GeometryVMem | EngineStat::TextureVMem => {}
            }
        }
        value
    }
}
