use std::time::{Duration, Instant};

/// Longest frame delta handed to the camera; longer stalls (window drags,
/// the blocking model load) are clamped so the camera does not jump
const MAX_DELTA: Duration = Duration::from_millis(250);

/// Seconds between frame rate samples
const FPS_UPDATE_INTERVAL: f32 = 1.0;

/// Frame clock owned by the draw loop
#[derive(Debug)]
pub struct Clock {
    last_tick: Instant,
    frames: u32,
    fps_elapsed: f32,
    fps: f32,
}

impl Clock {
    /// Create new clock starting now
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            frames: 0,
            fps_elapsed: 0.0,
            fps: 0.0,
        }
    }

    /// Seconds since the previous tick; advances the clock
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).min(MAX_DELTA).as_secs_f32();
        self.last_tick = now;
        self.record_frame(delta);
        delta
    }

    /// Restart timing from now, e.g. after a long blocking load
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
    }

    /// Frames per second over the last full sample interval
    pub fn fps(&self) -> f32 {
        self.fps
    }

    fn record_frame(&mut self, delta: f32) {
        self.frames += 1;
        self.fps_elapsed += delta;
        if self.fps_elapsed >= FPS_UPDATE_INTERVAL {
            self.fps = self.frames as f32 / self.fps_elapsed;
            log::debug!("{:.1} fps", self.fps);
            self.frames = 0;
            self.fps_elapsed = 0.0;
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
