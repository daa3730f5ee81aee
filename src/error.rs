// Error taxonomy
//
// Each subsystem owns its error enum next to the code that raises it; this
// module aggregates them for callers that drive the whole runner.

use crate::audio::AudioError;
use crate::config::ConfigError;
use crate::display::{ScreenshotError, WindowError};
use crate::emulator::{CoreError, LoadError, StateError};
use crate::netplay::PeerError;
use crate::settings::SettingsError;
use thiserror::Error;

/// Convenience alias used by the binary and the scheduler loop
pub type Result<T> = std::result::Result<T, Error>;

/// Any error the runner can surface to its caller
#[derive(Debug, Error)]
pub enum Error {
    /// Media could not be loaded (fatal at startup)
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// The emulation core failed while stepping a frame (fatal)
    #[error("emulation core failed: {0}")]
    Core(#[from] CoreError),

    /// Save state could not be written or read
    #[error("save state error: {0}")]
    State(#[from] StateError),

    /// Netplay transport failure
    #[error("netplay error: {0}")]
    Peer(#[from] PeerError),

    /// Persisted settings could not be written
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Runtime configuration could not be read or written
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audio device could not be opened
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    /// The desktop window failed
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Screenshot could not be saved
    #[error("screenshot error: {0}")]
    Screenshot(#[from] ScreenshotError),
}
