// Persisted settings - display/emulation options stored as key/value pairs
//
// Settings are read once at startup (missing keys fall back to defaults) and
// each field is written back immediately when the user changes it. There is
// no batching and no migration logic.

use crate::display::PaletteKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a settings store
#[derive(Debug, Error)]
pub enum SettingsError {
    /// I/O error while writing the settings file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The settings document could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The four persisted settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    Overscan,
    CropMode,
    Palette,
    SpriteLimit,
}

impl SettingKey {
    /// Key name used in the backing store
    pub fn name(self) -> &'static str {
        match self {
            SettingKey::Overscan => "overscan",
            SettingKey::CropMode => "autocrop",
            SettingKey::Palette => "palette",
            SettingKey::SpriteLimit => "spritelimit",
        }
    }
}

/// Typed key/value storage with default substitution
pub trait SettingsStore {
    /// Read an integer setting, returning `default` when the key is absent
    fn get_i32(&self, key: SettingKey, default: i32) -> i32;

    /// Write an integer setting immediately
    fn set_i32(&mut self, key: SettingKey, value: i32) -> Result<(), SettingsError>;
}

/// Horizontal crop policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropMode {
    /// Never crop the sides
    #[default]
    Never,
    /// Crop when the core reports background activity near the left edge
    Auto,
    /// Always crop the sides
    Always,
}

impl CropMode {
    /// Number of crop modes, used for wrap-around navigation
    pub const COUNT: i32 = 3;

    /// Convert a stored value into a crop mode; unknown values map to `Never`
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => CropMode::Auto,
            2 => CropMode::Always,
            _ => CropMode::Never,
        }
    }

    /// Stored representation
    pub fn as_i32(self) -> i32 {
        match self {
            CropMode::Never => 0,
            CropMode::Auto => 1,
            CropMode::Always => 2,
        }
    }

    /// Short label for menus
    pub fn label(self) -> &'static str {
        match self {
            CropMode::Never => "Never",
            CropMode::Auto => "Auto",
            CropMode::Always => "Always",
        }
    }

    /// Previous mode, wrapping from `Never` to `Always`
    pub fn prev(self) -> Self {
        Self::from_i32((self.as_i32() + Self::COUNT - 1) % Self::COUNT)
    }

    /// Next mode, wrapping from `Always` to `Never`
    pub fn next(self) -> Self {
        Self::from_i32((self.as_i32() + 1) % Self::COUNT)
    }
}

/// Snapshot of the persisted display/emulation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedSettings {
    /// Hide the overscan border rows
    pub overscan: bool,

    /// Side crop policy
    pub crop_mode: CropMode,

    /// Selected color palette
    pub palette: PaletteKind,

    /// Emulate the 8-sprites-per-scanline hardware limit
    pub sprite_limit: bool,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            overscan: true,
            crop_mode: CropMode::Never,
            palette: PaletteKind::Default,
            sprite_limit: true,
        }
    }
}

impl PersistedSettings {
    /// Load all settings, substituting defaults for missing keys
    pub fn load(store: &dyn SettingsStore) -> Self {
        let defaults = Self::default();
        Self {
            overscan: store.get_i32(SettingKey::Overscan, defaults.overscan as i32) != 0,
            crop_mode: CropMode::from_i32(
                store.get_i32(SettingKey::CropMode, defaults.crop_mode.as_i32()),
            ),
            palette: PaletteKind::from_index(
                store.get_i32(SettingKey::Palette, defaults.palette.index() as i32),
            ),
            sprite_limit: store.get_i32(SettingKey::SpriteLimit, defaults.sprite_limit as i32)
                != 0,
        }
    }
}

/// In-memory settings store
///
/// Used by tests and by frontends that do not persist anything.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: BTreeMap<SettingKey, i32>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, if any
    pub fn raw(&self, key: SettingKey) -> Option<i32> {
        self.values.get(&key).copied()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_i32(&self, key: SettingKey, default: i32) -> i32 {
        self.values.get(&key).copied().unwrap_or(default)
    }

    fn set_i32(&mut self, key: SettingKey, value: i32) -> Result<(), SettingsError> {
        self.values.insert(key, value);
        Ok(())
    }
}

/// File-backed settings store
///
/// Values live in a flat TOML table keyed by [`SettingKey::name`]. Every
/// `set_i32` rewrites the whole file.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl TomlSettingsStore {
    /// Open the store at `path`
    ///
    /// A missing or unreadable file yields an empty store; the file is created
    /// on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string(&self.values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get_i32(&self, key: SettingKey, default: i32) -> i32 {
        self.values
            .get(key.name())
            .and_then(|v| i32::try_from(*v).ok())
            .unwrap_or(default)
    }

    fn set_i32(&mut self, key: SettingKey, value: i32) -> Result<(), SettingsError> {
        self.values.insert(key.name().to_string(), value as i64);
        self.flush()
    }
}
