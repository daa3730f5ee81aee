// nes-runner library
// Frame pacing, display publishing and netplay input sync around an NES core

// Public modules
pub mod audio;
pub mod config;
pub mod display;
pub mod emulator;
pub mod error;
pub mod input;
pub mod netplay;
pub mod scheduler;
pub mod settings;

// Re-export main types for convenience
pub use audio::{AudioSink, FramePacer, NullAudio};
pub use config::RunnerConfig;
pub use display::{
    CropRect, DisplayUpdate, FrameBuffer, FramePool, PaletteKind, PaletteTable,
    PresentationSink, Publisher, UpdateKind,
};
pub use emulator::{DemoCore, EmulationCore, Region};
pub use error::{Error, Result};
pub use input::{GamepadState, InputSource, NesPad, Port};
pub use netplay::{Netplay, NetplayEvent, NetplayStatus, PeerLink, Role, TcpLink};
pub use scheduler::{
    Clock, FrameReport, Handlers, Host, MenuRequest, Scheduler, SchedulerIo, ShutdownHandle,
    StartAction,
};
pub use settings::{CropMode, PersistedSettings, SettingsStore, TomlSettingsStore};
