// Demo core - a stand-in machine for running the frontend without a real
// NES core
//
// It validates the inserted media the way a real core would (iNES/FDS
// headers, mapper support, BIOS requirement), then renders a static test
// pattern with one movable block per connected controller and a square-wave
// tone whose pitch follows player 1's block.

use super::error::{CoreError, LoadError, StateError};
use super::{EmulationCore, Region};
use crate::display::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::input::{NesPad, Port};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current save state format version
const SAVE_STATE_VERSION: u32 = 1;

/// Mappers the demo core accepts
const SUPPORTED_MAPPERS: [u16; 7] = [0, 1, 2, 3, 4, 7, 66];

/// Backdrop color
const BACKDROP: u8 = 0x0F;

/// Side of a player block in pixels
const BLOCK_SIZE: usize = 8;

/// Frames between toggles of the left-edge background band
const BAND_PERIOD: u64 = 120;

const BLOCK_COLORS: [u8; 2] = [0x16, 0x2A];

/// Player block position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Block {
    x: usize,
    y: usize,
}

impl Block {
    fn start(port: Port) -> Self {
        match port {
            Port::One => Block { x: 64, y: 112 },
            Port::Two => Block { x: 184, y: 112 },
        }
    }

    fn advance(&mut self, pad: NesPad) {
        if pad.contains(NesPad::LEFT) {
            self.x = self.x.saturating_sub(1);
        }
        if pad.contains(NesPad::RIGHT) {
            self.x = (self.x + 1).min(SCREEN_WIDTH - BLOCK_SIZE);
        }
        if pad.contains(NesPad::UP) {
            self.y = self.y.saturating_sub(1);
        }
        if pad.contains(NesPad::DOWN) {
            self.y = (self.y + 1).min(SCREEN_HEIGHT - BLOCK_SIZE);
        }
    }
}

/// Serialized machine state
#[derive(Debug, Serialize, Deserialize)]
struct DemoState {
    /// Version number for compatibility checking
    version: u32,

    /// Timestamp when the save state was created
    timestamp: String,

    /// ROM identifier (file name for validation)
    rom_name: Option<String>,

    frame: u64,
    blocks: [Block; 2],
    phase: u32,
}

/// Test-pattern emulation core
pub struct DemoCore {
    region: Region,
    sample_rate: u32,
    rom_name: Option<String>,
    frame: u64,
    blocks: [Block; 2],
    pads: [NesPad; 2],
    connected: [bool; 2],
    sprite_limit: bool,
    left_bg_counter: u32,
    /// Square wave phase accumulator
    phase: u32,
    audio: Vec<i16>,
}

impl DemoCore {
    /// Frames emulated since the last reset
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn is_pal(&self) -> bool {
        matches!(self.region, Region::Pal)
    }

    fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.refresh_rate()) as usize
    }

    fn render(&mut self, target: &mut FrameBuffer) {
        let band_visible = (self.frame / BAND_PERIOD) % 2 == 1;

        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                let pixel = if x < 8 && !band_visible {
                    BACKDROP
                } else {
                    ((x / 16) + (y / 16) * 16) as u8 % 64
                };
                target.set_pixel(x, y, pixel);
            }
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if !self.connected[index] {
                continue;
            }
            for y in block.y..block.y + BLOCK_SIZE {
                for x in block.x..block.x + BLOCK_SIZE {
                    target.set_pixel(x, y, BLOCK_COLORS[index]);
                }
            }
        }

        self.left_bg_counter = (0..SCREEN_HEIGHT)
            .filter(|&y| (0..8).any(|x| target.get_pixel(x, y) != BACKDROP))
            .count() as u32;
    }

    fn synthesize(&mut self) {
        let samples = self.samples_per_frame();
        // Pitch follows player 1's horizontal position: 220-476 Hz
        let frequency = 220 + self.blocks[0].x as u32;
        let step = (frequency as u64 * (1 << 16) / self.sample_rate.max(1) as u64) as u32;

        self.audio.clear();
        for _ in 0..samples {
            self.phase = self.phase.wrapping_add(step);
            let high = (self.phase >> 15) & 1 == 1;
            self.audio.push(if high { 2000 } else { -2000 });
        }
    }
}

impl EmulationCore for DemoCore {
    fn init(region: Region, sample_rate: u32) -> Result<Self, LoadError> {
        if matches!(region, Region::Dendy) || sample_rate == 0 {
            return Err(LoadError::UnsupportedSystem);
        }
        Ok(Self {
            region,
            sample_rate,
            rom_name: None,
            frame: 0,
            blocks: [Block::start(Port::One), Block::start(Port::Two)],
            pads: [NesPad::empty(); 2],
            connected: [true, false],
            sprite_limit: true,
            left_bg_counter: 0,
            phase: 0,
            audio: Vec::new(),
        })
    }

    fn insert_media(&mut self, rom: &Path, bios: Option<&Path>) -> Result<(), LoadError> {
        let data = fs::read(rom).map_err(|_| LoadError::NotFound(rom.to_path_buf()))?;

        if data.len() >= 16 && data.starts_with(b"NES\x1A") {
            let mapper = ((data[6] >> 4) | (data[7] & 0xF0)) as u16;
            if !SUPPORTED_MAPPERS.contains(&mapper) {
                return Err(LoadError::UnsupportedMapper(mapper));
            }
            if self.region == Region::Detect && data[9] & 0x01 != 0 {
                self.region = Region::Pal;
            }
        } else if data.starts_with(b"FDS\x1A") || data.starts_with(b"\x01*NINTENDO-HVC*") {
            match bios {
                Some(path) if path.is_file() => {}
                _ => return Err(LoadError::BiosRequired),
            }
        } else {
            return Err(LoadError::UnsupportedFormat);
        }

        self.rom_name = rom
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string());
        tracing::info!(
            "inserted {} ({:?}, {} Hz)",
            rom.display(),
            self.region,
            self.refresh_rate()
        );
        self.reset(true);
        Ok(())
    }

    fn refresh_rate(&self) -> u32 {
        if self.is_pal() {
            50
        } else {
            60
        }
    }

    fn overscan(&self) -> usize {
        if self.is_pal() {
            0
        } else {
            8
        }
    }

    fn left_bg_counter(&self) -> u32 {
        self.left_bg_counter
    }

    fn connect_joypad(&mut self, port: Port) {
        self.connected[port.index()] = true;
    }

    fn disconnect_joypad(&mut self, port: Port) {
        self.connected[port.index()] = false;
        self.pads[port.index()] = NesPad::empty();
    }

    fn set_input(&mut self, port: Port, pad: NesPad) {
        self.pads[port.index()] = pad;
    }

    fn sprite_limit(&self) -> bool {
        self.sprite_limit
    }

    fn set_sprite_limit(&mut self, enabled: bool) {
        self.sprite_limit = enabled;
    }

    fn step(&mut self, target: Option<&mut FrameBuffer>) -> Result<&[i16], CoreError> {
        if self.rom_name.is_none() {
            return Err(CoreError::NoMedia);
        }

        for port in [Port::One, Port::Two] {
            if self.connected[port.index()] {
                let pad = self.pads[port.index()];
                self.blocks[port.index()].advance(pad);
            }
        }

        if let Some(target) = target {
            self.render(target);
        }
        self.synthesize();
        self.frame += 1;

        Ok(&self.audio)
    }

    fn reset(&mut self, hard: bool) {
        self.frame = 0;
        self.blocks = [Block::start(Port::One), Block::start(Port::Two)];
        if hard {
            self.pads = [NesPad::empty(); 2];
            self.phase = 0;
        }
    }

    fn save_state(&mut self, path: &Path) -> Result<(), StateError> {
        let state = DemoState {
            version: SAVE_STATE_VERSION,
            timestamp: chrono::Local::now().to_rfc3339(),
            rom_name: self.rom_name.clone(),
            frame: self.frame,
            blocks: self.blocks,
            phase: self.phase,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<(), StateError> {
        let json = fs::read_to_string(path)?;
        let state: DemoState = serde_json::from_str(&json)?;

        // Version check
        if state.version != SAVE_STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: SAVE_STATE_VERSION,
                found: state.version,
            });
        }
        if state.rom_name != self.rom_name {
            return Err(StateError::WrongRom(state.rom_name.unwrap_or_default()));
        }

        // The frame counter is restored first so a bad block position below
        // leaves a visibly half-restored machine for the caller to reset
        self.frame = state.frame;
        for block in &state.blocks {
            if block.x > SCREEN_WIDTH - BLOCK_SIZE || block.y > SCREEN_HEIGHT - BLOCK_SIZE {
                return Err(StateError::Corrupt(format!(
                    "block position ({}, {}) out of range",
                    block.x, block.y
                )));
            }
        }
        self.blocks = state.blocks;
        self.phase = state.phase;
        Ok(())
    }
}
