// Emulation clock - frame timing and skip policy

use crate::emulator::frame_time_micros;
use std::time::Instant;

/// Monotonic microsecond time source
pub trait Clock {
    fn now_micros(&self) -> u64;
}

/// Wall clock measured from creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Frame pacing state
///
/// Decides after every emulated frame whether the next one is rendered. A
/// frame is skipped when the previous one ran over budget, when a full-screen
/// update was just pushed (it occupies the display link for about a frame),
/// or in bursts of `2 * speedup` while fast-forwarding.
#[derive(Debug, Clone)]
pub struct EmulationClock {
    frame_duration_micros: u64,
    skip_frames: u32,
    speedup: u32,
    last_elapsed_micros: u64,
    draw_next: bool,
    drawn: u64,
    skipped: u64,
}

impl EmulationClock {
    /// Clock for a core running at `refresh_rate` Hz
    pub fn new(refresh_rate: u32) -> Self {
        Self {
            frame_duration_micros: frame_time_micros(refresh_rate),
            skip_frames: 0,
            speedup: 0,
            last_elapsed_micros: 0,
            draw_next: true,
            drawn: 0,
            skipped: 0,
        }
    }

    pub fn frame_duration_micros(&self) -> u64 {
        self.frame_duration_micros
    }

    /// Frames still to be skipped
    pub fn skip_frames(&self) -> u32 {
        self.skip_frames
    }

    /// Whether the next frame is rendered and published
    pub fn draw_next(&self) -> bool {
        self.draw_next
    }

    /// Speedup factor sampled on the last iteration
    pub fn speedup(&self) -> u32 {
        self.speedup
    }

    pub fn last_elapsed_micros(&self) -> u64 {
        self.last_elapsed_micros
    }

    /// Frames rendered and skipped so far
    pub fn counts(&self) -> (u64, u64) {
        (self.drawn, self.skipped)
    }

    /// Account for one finished frame
    ///
    /// # Arguments
    ///
    /// * `elapsed_micros` - Time spent on the frame
    /// * `speedup` - Host fast-forward factor, 0 when off
    /// * `full_update` - The frame was drawn and published as a full update
    ///
    /// # Returns
    ///
    /// Whether the next frame is drawn
    pub fn advance(&mut self, elapsed_micros: u64, speedup: u32, full_update: bool) -> bool {
        if self.draw_next {
            self.drawn += 1;
        } else {
            self.skipped += 1;
        }
        self.last_elapsed_micros = elapsed_micros;
        self.speedup = speedup;

        if self.skip_frames == 0 {
            if speedup > 0 {
                self.skip_frames = speedup.saturating_mul(2);
            } else if elapsed_micros >= self.frame_duration_micros {
                self.skip_frames = 1;
            } else if self.draw_next && full_update {
                self.skip_frames = 1;
            }
        } else {
            self.skip_frames -= 1;
        }

        self.draw_next = self.skip_frames == 0;
        self.draw_next
    }

    /// Forget pending skips; the next frame is drawn
    pub fn reset(&mut self) {
        self.skip_frames = 0;
        self.draw_next = true;
    }
}
