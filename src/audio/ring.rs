// Sample ring buffer shared between the scheduler and the audio device
//
// The scheduler side blocks while the ring is full, so emulation runs at the
// rate the device drains samples.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Fixed-capacity FIFO of signed 16-bit samples
pub struct SampleRing {
    buffer: Vec<i16>,
    read_pos: usize,
    write_pos: usize,
    count: usize,
}

impl SampleRing {
    /// Create a ring holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
            count: 0,
        }
    }

    /// Create a ring sized for `milliseconds` of audio at `sample_rate`
    pub fn with_duration(milliseconds: u32, sample_rate: u32) -> Self {
        Self::new((milliseconds as usize * sample_rate as usize) / 1000)
    }

    /// Push as many of `samples` as fit; returns how many were taken
    pub fn push_slice(&mut self, samples: &[i16]) -> usize {
        let taken = samples.len().min(self.free());
        for &sample in &samples[..taken] {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.buffer.len();
        }
        self.count += taken;
        taken
    }

    pub fn pop(&mut self) -> Option<i16> {
        if self.count == 0 {
            return None;
        }
        let sample = self.buffer[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.buffer.len();
        self.count -= 1;
        Some(sample)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Free slots
    pub fn free(&self) -> usize {
        self.buffer.len() - self.count
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.count = 0;
    }
}

/// [`SampleRing`] with a condition variable for back-pressure
pub struct BlockingRing {
    ring: Mutex<SampleRing>,
    space: Condvar,
}

impl BlockingRing {
    pub fn new(ring: SampleRing) -> Self {
        Self {
            ring: Mutex::new(ring),
            space: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SampleRing> {
        // A panicking holder cannot leave the ring indices inconsistent
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `samples`, waiting for space for at most `timeout`
    ///
    /// Returns the number of samples queued; samples that still do not fit
    /// when the timeout expires are dropped.
    pub fn push_blocking(&self, samples: &[i16], timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut queued = 0;
        let mut ring = self.lock();

        while queued < samples.len() {
            queued += ring.push_slice(&samples[queued..]);
            if queued == samples.len() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            ring = match self.space.wait_timeout(ring, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        queued
    }

    /// Fill `out` from the ring, padding with silence when it runs dry
    ///
    /// Each sample is repeated `channels` times.
    pub fn drain_into(&self, out: &mut [f32], channels: usize) {
        let mut ring = self.lock();
        for frame in out.chunks_mut(channels.max(1)) {
            let sample = ring.pop().map_or(0.0, |s| s as f32 / 32768.0);
            frame.fill(sample);
        }
        drop(ring);
        self.space.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.space.notify_all();
    }
}
