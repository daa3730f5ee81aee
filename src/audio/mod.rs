// Audio module - sample submission and emulation pacing
//
// The scheduler hands each frame's samples to an `AudioSink`. With the
// `audio` feature the samples go to the sound card through cpal, whose
// playback rate then paces emulation. Without a device, `FramePacer` sleeps
// one frame period per submission instead.

#[cfg(feature = "audio")]
pub mod output;
pub mod pacer;
pub mod ring;

#[cfg(feature = "audio")]
pub use output::{AudioConfig, AudioOutput};
pub use pacer::FramePacer;
pub use ring::{BlockingRing, SampleRing};

use thiserror::Error;

/// Audio device errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Consumer of emulated audio
pub trait AudioSink {
    /// Queue one frame of mono samples
    fn submit(&mut self, samples: &[i16]);
}

/// Discards all audio
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn submit(&mut self, _samples: &[i16]) {}
}
