use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(1000);

/// Rolling frames-per-second figure, recomputed once more than a second has
/// passed since the last recomputation.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new(start: Instant) -> Self {
        Self { frames: 0, window_start: start }
    }

    /// Count one rendered frame. Returns the fresh figure when the window
    /// rolled over on this frame.
    pub fn frame(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed <= WINDOW {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

pub fn fps_label(fps: f64) -> String {
    format!("{fps:.1} FPS")
}
