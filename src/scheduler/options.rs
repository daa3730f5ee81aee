// User-adjustable settings exposed to the settings menu
//
// Each option takes a menu event, applies and persists the change, and
// returns the label to show for the current value.

use super::Scheduler;
use crate::display::{PaletteKind, PaletteTable};
use crate::emulator::EmulationCore;
use crate::settings::SettingKey;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Settle delay after a palette change when the sink cannot acknowledge
pub const PALETTE_SETTLE: Duration = Duration::from_millis(50);

/// Menu navigation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    Prev,
    Next,
    /// Only report the current value
    Refresh,
}

/// Entries of the settings menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingOption {
    Palette,
    Overscan,
    Crop,
    SpriteLimit,
}

impl SettingOption {
    pub const ALL: [SettingOption; 4] = [
        SettingOption::Palette,
        SettingOption::Overscan,
        SettingOption::Crop,
        SettingOption::SpriteLimit,
    ];

    /// Menu caption
    pub fn title(self) -> &'static str {
        match self {
            SettingOption::Palette => "Palette",
            SettingOption::Overscan => "Overscan",
            SettingOption::Crop => "Crop sides",
            SettingOption::SpriteLimit => "Sprite limit",
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}

impl<C: EmulationCore> Scheduler<C> {
    /// Dispatch a menu event to the matching option
    pub fn apply_option(&mut self, option: SettingOption, event: MenuEvent) -> &'static str {
        match option {
            SettingOption::Palette => self.palette_option(event),
            SettingOption::Overscan => self.overscan_option(event),
            SettingOption::Crop => self.crop_option(event),
            SettingOption::SpriteLimit => self.sprite_limit_option(event),
        }
    }

    /// Cycle through the color palettes
    pub fn palette_option(&mut self, event: MenuEvent) -> &'static str {
        let current = self.settings.palette;
        let selected = match event {
            MenuEvent::Prev => current.prev(),
            MenuEvent::Next => current.next(),
            MenuEvent::Refresh => current,
        };
        if selected != current {
            self.set_palette(selected);
        }
        self.settings.palette.label()
    }

    /// Toggle hiding of the overscan rows
    pub fn overscan_option(&mut self, event: MenuEvent) -> &'static str {
        if event != MenuEvent::Refresh {
            self.settings.overscan = !self.settings.overscan;
            self.persist(SettingKey::Overscan, self.settings.overscan as i32);
        }
        if self.settings.overscan {
            "Auto"
        } else {
            "Off"
        }
    }

    /// Cycle the side crop policy
    pub fn crop_option(&mut self, event: MenuEvent) -> &'static str {
        let mode = self.settings.crop_mode;
        let mode = match event {
            MenuEvent::Prev => mode.prev(),
            MenuEvent::Next => mode.next(),
            MenuEvent::Refresh => return mode.label(),
        };
        self.settings.crop_mode = mode;
        self.persist(SettingKey::CropMode, mode.as_i32());
        mode.label()
    }

    /// Toggle the hardware sprite-per-line limit
    pub fn sprite_limit_option(&mut self, event: MenuEvent) -> &'static str {
        if event != MenuEvent::Refresh {
            self.settings.sprite_limit = !self.settings.sprite_limit;
            self.persist(SettingKey::SpriteLimit, self.settings.sprite_limit as i32);
            self.core.set_sprite_limit(self.settings.sprite_limit);
        }
        on_off(self.settings.sprite_limit)
    }

    /// Switch palettes
    ///
    /// Persists the choice, rebuilds the color table for both pooled
    /// buffers and pushes the last frame twice in the new colors. Returns
    /// once the sink reports the display settled, or after
    /// [`PALETTE_SETTLE`] when it cannot tell.
    pub fn set_palette(&mut self, kind: PaletteKind) {
        self.settings.palette = kind;
        self.persist(SettingKey::Palette, kind.index() as i32);

        let table = Arc::new(PaletteTable::build(kind));
        self.pool.set_palette(table);
        self.publisher.invalidate();

        for _ in 0..2 {
            self.present_last_frame();
        }
        if !self.io.video.wait_ready(PALETTE_SETTLE) {
            thread::sleep(PALETTE_SETTLE);
        }
        tracing::info!("palette: {}", kind.label());
    }

    fn persist(&mut self, key: SettingKey, value: i32) {
        if let Err(e) = self.store.set_i32(key, value) {
            tracing::warn!("cannot persist {}: {}", key.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::display::{NullSink, UpdateKind};
    use crate::emulator::{DemoCore, Region};
    use crate::input::NoInput;
    use crate::scheduler::{NullHost, SchedulerIo, SystemClock};
    use crate::settings::{CropMode, MemorySettingsStore, SettingsStore};
    use std::path::Path;

    fn scheduler(dir: &Path, store: MemorySettingsStore) -> Scheduler<DemoCore> {
        let rom = dir.join("test.nes");
        let mut image = vec![0u8; 16 + 16 * 1024];
        image[..4].copy_from_slice(b"NES\x1A");
        std::fs::write(&rom, image).unwrap();

        let mut core = DemoCore::init(Region::Ntsc, 32000).unwrap();
        core.insert_media(&rom, None).unwrap();
        let io = SchedulerIo {
            video: Box::new(NullSink),
            audio: Box::new(NullAudio),
            input: Box::new(NoInput),
            host: Box::new(NullHost),
            clock: Box::new(SystemClock::new()),
        };
        Scheduler::new(core, Box::new(store), io)
    }

    #[test]
    fn test_palette_option_wraps_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path(), MemorySettingsStore::new());

        assert_eq!(scheduler.palette_option(MenuEvent::Refresh), "Default");
        assert_eq!(scheduler.palette_option(MenuEvent::Prev), "Smooth");
        assert_eq!(scheduler.store().get_i32(SettingKey::Palette, -1), 5);
        assert_eq!(scheduler.palette_option(MenuEvent::Next), "Default");
        assert_eq!(scheduler.palette_option(MenuEvent::Next), "Composite");
        assert_eq!(
            scheduler.pool().current().palette().source(),
            PaletteKind::Composite
        );
    }

    #[test]
    fn test_palette_change_forces_full_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path(), MemorySettingsStore::new());
        scheduler.start(crate::scheduler::StartAction::NewGame).unwrap();

        // Let the first full update and its skip pass
        scheduler.run_frame().unwrap();
        scheduler.run_frame().unwrap();

        scheduler.palette_option(MenuEvent::Next);
        let report = scheduler.run_frame().unwrap();
        assert!(report.drew);
        assert_eq!(report.update, Some(UpdateKind::Full));
    }

    #[test]
    fn test_stored_settings_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemorySettingsStore::new();
        store.set_i32(SettingKey::Palette, 3).unwrap();
        store.set_i32(SettingKey::SpriteLimit, 0).unwrap();
        let scheduler = scheduler(dir.path(), store);

        assert_eq!(scheduler.settings().palette, PaletteKind::Ntsc);
        assert!(!scheduler.core().sprite_limit());
    }

    #[test]
    fn test_overscan_and_sprite_limit_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path(), MemorySettingsStore::new());

        assert_eq!(scheduler.overscan_option(MenuEvent::Refresh), "Auto");
        assert_eq!(scheduler.overscan_option(MenuEvent::Next), "Off");
        assert_eq!(scheduler.store().get_i32(SettingKey::Overscan, -1), 0);

        assert_eq!(scheduler.sprite_limit_option(MenuEvent::Refresh), "On");
        assert_eq!(scheduler.sprite_limit_option(MenuEvent::Prev), "Off");
        assert!(!scheduler.core().sprite_limit());
    }

    #[test]
    fn test_crop_option_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path(), MemorySettingsStore::new());

        assert_eq!(scheduler.crop_option(MenuEvent::Prev), "Always");
        assert_eq!(scheduler.crop_option(MenuEvent::Next), "Never");
        assert_eq!(scheduler.crop_option(MenuEvent::Next), "Auto");
        assert_eq!(scheduler.settings().crop_mode, CropMode::Auto);
        assert_eq!(
            scheduler.apply_option(SettingOption::Crop, MenuEvent::Refresh),
            "Auto"
        );
        assert_eq!(scheduler.store().get_i32(SettingKey::CropMode, -1), 1);
    }
}
