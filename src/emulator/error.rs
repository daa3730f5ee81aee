// Emulation core errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Media or system could not be loaded; fatal at startup
#[derive(Debug, Error)]
pub enum LoadError {
    /// The requested region/system is not emulated
    #[error("unsupported system")]
    UnsupportedSystem,

    /// ROM file does not exist or cannot be read
    #[error("ROM not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Cartridge uses a mapper the core does not implement
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),

    /// Media needs a BIOS image that was not supplied
    #[error("BIOS file required")]
    BiosRequired,

    /// File is not a recognized ROM image
    #[error("unsupported ROM format")]
    UnsupportedFormat,
}

/// Save state could not be written or restored
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// State document is malformed
    #[error("corrupt save state: {0}")]
    Corrupt(String),

    /// Save state version mismatch
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// State belongs to another ROM
    #[error("save state is for '{0}'")]
    WrongRom(String),
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Corrupt(e.to_string())
    }
}

/// Unrecoverable failure while stepping a frame
#[derive(Debug, Error)]
pub enum CoreError {
    /// No media has been inserted
    #[error("no media loaded")]
    NoMedia,

    /// The emulated machine reached a state it cannot continue from
    #[error("emulation halted: {0}")]
    Halted(String),
}
