// Save state slots
//
// Maps slot numbers to files, one directory per ROM:
// `<save_dir>/<rom_name>/slot_<n>.state`

use std::path::{Path, PathBuf};

/// Number of save slots per ROM
pub const SLOT_COUNT: u8 = 10;

/// Save slot directory for the loaded ROM
#[derive(Debug, Clone)]
pub struct SaveSlots {
    dir: PathBuf,
}

impl SaveSlots {
    /// Slots for `rom_path` under `base_dir`
    pub fn new(base_dir: &Path, rom_path: Option<&Path>) -> Self {
        let dir = match rom_path.and_then(|p| p.file_stem()) {
            Some(rom_name) => base_dir.join(rom_name),
            // No ROM loaded, use default directory
            None => base_dir.join("default"),
        };
        Self { dir }
    }

    /// Directory holding the slot files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `slot`; out-of-range slots wrap
    pub fn path(&self, slot: u8) -> PathBuf {
        self.dir.join(format!("slot_{}.state", slot % SLOT_COUNT))
    }

    /// Whether a state exists in `slot`
    pub fn exists(&self, slot: u8) -> bool {
        self.path(slot).is_file()
    }
}
