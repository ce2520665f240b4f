use std::time::{Duration, Instant};

/// Engine clock: seconds since initialisation plus the length of the last frame.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
    frame_start: Instant,
    frame_duration: Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            frame_start: now,
            frame_duration: Duration::ZERO,
        }
    }

    /// Closes the current frame and starts the next one.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.frame_duration = now - self.frame_start;
        self.frame_start = now;
    }

    /// Live seconds since the timer was created. Used to stamp messages.
    #[must_use]
    pub fn now_seconds(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Length of the last closed frame in seconds.
    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.frame_duration.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration_starts_at_zero() {
        let mut timer = Timer::new();
        assert_eq!(timer.dt_seconds(), 0.0);
        timer.tick();
        assert!(timer.dt_seconds() >= 0.0);
        assert!(timer.now_seconds() >= timer.dt_seconds());
    }
}
