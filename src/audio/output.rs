// Audio output - plays submitted samples through cpal
//
// The device callback runs on cpal's thread and drains a shared
// BlockingRing; `submit` blocks while the ring is full.

use super::ring::{BlockingRing, SampleRing};
use super::{AudioError, AudioSink};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::sync::Arc;
use std::time::Duration;

/// Audio output configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u32,
}

impl AudioConfig {
    /// Create default audio configuration
    ///
    /// - Sample rate: 32 kHz
    /// - Channels: 1 (mono)
    /// - Buffer duration: 50 ms
    pub fn new() -> Self {
        Self {
            sample_rate: 32000,
            channels: 1,
            buffer_duration_ms: 50,
        }
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the buffer duration in milliseconds
    pub fn with_buffer_duration(mut self, duration_ms: u32) -> Self {
        self.buffer_duration_ms = duration_ms;
        self
    }

    /// Longest time `submit` waits for the device before dropping samples
    fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_duration_ms as u64 * 2)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio output handle
pub struct AudioOutput {
    config: AudioConfig,

    /// Kept alive for playback
    stream: Stream,

    ring: Arc<BlockingRing>,
}

impl AudioOutput {
    /// Open the default output device and start playback
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        tracing::info!("audio device: {}", device.name().unwrap_or_default());

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = Arc::new(BlockingRing::new(SampleRing::with_duration(
            config.buffer_duration_ms,
            config.sample_rate,
        )));
        let callback_ring = Arc::clone(&ring);
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_ring.drain_into(data, channels);
                },
                move |err| {
                    tracing::error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        tracing::info!(
            "audio output initialized: {} Hz, {} channel(s)",
            config.sample_rate,
            config.channels
        );

        Ok(Self {
            config,
            stream,
            ring,
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Samples waiting to be played
    pub fn buffer_len(&self) -> usize {
        self.ring.len()
    }

    /// Pause audio playback
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    /// Resume audio playback
    pub fn resume(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))
    }
}

impl AudioSink for AudioOutput {
    fn submit(&mut self, samples: &[i16]) {
        let queued = self
            .ring
            .push_blocking(samples, self.config.submit_timeout());
        if queued < samples.len() {
            tracing::debug!("audio: dropped {} samples", samples.len() - queued);
        }
    }
}
