// Frame pacer - wall-clock throttle used when no audio device drives timing

use super::AudioSink;
use std::thread;
use std::time::{Duration, Instant};

/// Frames of lag after which the pacer gives up catching up
const MAX_LAG_FRAMES: u32 = 4;

/// Sleeps so that each submitted frame of audio takes one frame period
///
/// Deadlines advance by a fixed step, so short oversleeps are absorbed by the
/// next frame. When the caller falls further behind than [`MAX_LAG_FRAMES`],
/// the deadline is moved to now instead of bursting to catch up.
#[derive(Debug)]
pub struct FramePacer {
    frame: Duration,
    deadline: Option<Instant>,
    resyncs: u64,
}

impl FramePacer {
    pub fn new(frame: Duration) -> Self {
        Self {
            frame,
            deadline: None,
            resyncs: 0,
        }
    }

    /// Pacer for a display refresh rate in Hz
    pub fn for_refresh_rate(refresh_rate: u32) -> Self {
        Self::new(Duration::from_micros(
            crate::emulator::frame_time_micros(refresh_rate),
        ))
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    /// Times the schedule was dropped because the caller fell behind
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Wait until the current frame period has elapsed
    pub fn pace(&mut self) {
        let now = Instant::now();
        let deadline = match self.deadline {
            Some(deadline) => deadline + self.frame,
            None => now + self.frame,
        };

        if now > deadline + self.frame * MAX_LAG_FRAMES {
            tracing::debug!("frame pacer: {:?} behind, resyncing", now - deadline);
            self.resyncs += 1;
            self.deadline = Some(now);
            return;
        }

        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.deadline = Some(deadline);
    }
}

impl AudioSink for FramePacer {
    fn submit(&mut self, _samples: &[i16]) {
        self.pace();
    }
}
