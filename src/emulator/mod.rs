// Emulator module - boundary to the emulation core
//
// The scheduler treats the core as an opaque machine that advances exactly one
// video frame per `step`, optionally rendering into a pooled frame buffer, and
// hands back the audio samples produced during that frame.

mod demo;
mod error;
mod save_state;

pub use demo::DemoCore;
pub use error::{CoreError, LoadError, StateError};
pub use save_state::SaveSlots;

use crate::display::FrameBuffer;
use crate::input::{NesPad, Port};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Video region of the emulated system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Pick the region from the inserted media
    #[default]
    Detect,
    /// 60 Hz
    Ntsc,
    /// 50 Hz
    Pal,
    /// 50 Hz with NTSC-like timing
    Dendy,
}

/// Emulation core adapter
pub trait EmulationCore {
    /// Create a core for `region`, producing audio at `sample_rate`
    fn init(region: Region, sample_rate: u32) -> Result<Self, LoadError>
    where
        Self: Sized;

    /// Load a ROM image, with an optional BIOS for media that needs one
    fn insert_media(&mut self, rom: &Path, bios: Option<&Path>) -> Result<(), LoadError>;

    /// Native refresh rate in Hz
    fn refresh_rate(&self) -> u32;

    /// Rows hidden at the top and bottom when overscan is enabled
    fn overscan(&self) -> usize;

    /// Background tile activity near the left edge of the last rendered frame
    fn left_bg_counter(&self) -> u32;

    /// Plug a standard joypad into `port`
    fn connect_joypad(&mut self, port: Port);

    /// Unplug the joypad in `port`
    fn disconnect_joypad(&mut self, port: Port);

    /// Latch the button state for `port`
    fn set_input(&mut self, port: Port, pad: NesPad);

    fn sprite_limit(&self) -> bool;

    fn set_sprite_limit(&mut self, enabled: bool);

    /// Emulate one frame
    ///
    /// When `target` is given the frame is rendered into it; otherwise video
    /// output is skipped. Returns the audio samples of the frame.
    fn step(&mut self, target: Option<&mut FrameBuffer>) -> Result<&[i16], CoreError>;

    /// Reset the machine; a hard reset also clears RAM
    fn reset(&mut self, hard: bool);

    fn save_state(&mut self, path: &Path) -> Result<(), StateError>;

    /// Restore a save state
    ///
    /// On error the machine may be half-restored; callers must reset it.
    fn load_state(&mut self, path: &Path) -> Result<(), StateError>;
}

/// Frame duration in microseconds for a refresh rate
pub fn frame_time_micros(refresh_rate: u32) -> u64 {
    1_000_000 / refresh_rate.max(1) as u64
}
