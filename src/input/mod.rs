// Input module - local input sampling and controller layout translation
//
// Input sources report a generic gamepad bitset. Once per frame the scheduler
// translates the two controller slots into the NES joypad bit layout and
// pushes them to the emulation core.

pub mod gamepad;
pub mod keyboard;

pub use gamepad::{GamepadInput, GamepadMapping};
pub use keyboard::{KeyboardInput, KeyboardMapping};

use bitflags::bitflags;

bitflags! {
    /// Generic gamepad buttons as reported by an input source
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct GamepadState: u32 {
        const UP = 1 << 0;
        const RIGHT = 1 << 1;
        const DOWN = 1 << 2;
        const LEFT = 1 << 3;
        const SELECT = 1 << 4;
        const START = 1 << 5;
        const A = 1 << 6;
        const B = 1 << 7;
        /// Opens the in-game menu
        const MENU = 1 << 8;
        /// Opens the settings menu
        const OPTION = 1 << 9;
    }
}

bitflags! {
    /// NES standard controller, in shift register order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct NesPad: u8 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const UP = 0x10;
        const DOWN = 0x20;
        const LEFT = 0x40;
        const RIGHT = 0x80;
    }
}

const PAD_LAYOUT: [(GamepadState, NesPad); 8] = [
    (GamepadState::START, NesPad::START),
    (GamepadState::SELECT, NesPad::SELECT),
    (GamepadState::UP, NesPad::UP),
    (GamepadState::RIGHT, NesPad::RIGHT),
    (GamepadState::DOWN, NesPad::DOWN),
    (GamepadState::LEFT, NesPad::LEFT),
    (GamepadState::A, NesPad::A),
    (GamepadState::B, NesPad::B),
];

impl GamepadState {
    /// Translate into the NES joypad layout; menu buttons are dropped
    pub fn to_nes_pad(self) -> NesPad {
        PAD_LAYOUT
            .iter()
            .filter(|(generic, _)| self.contains(*generic))
            .fold(NesPad::empty(), |pad, (_, nes)| pad | *nes)
    }
}

/// Controller port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Controller port 1
    One,
    /// Controller port 2
    Two,
}

impl Port {
    /// Slot index (0 for port 1, 1 for port 2)
    pub fn index(self) -> usize {
        match self {
            Port::One => 0,
            Port::Two => 1,
        }
    }

    /// The other port
    pub fn other(self) -> Port {
        match self {
            Port::One => Port::Two,
            Port::Two => Port::One,
        }
    }
}

/// Button state of both controller slots for one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    slots: [GamepadState; 2],
}

impl InputFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port: Port) -> GamepadState {
        self.slots[port.index()]
    }

    pub fn set(&mut self, port: Port, state: GamepadState) {
        self.slots[port.index()] = state;
    }
}

/// Source of local controller input
pub trait InputSource {
    /// Sample the current button state
    fn poll(&mut self) -> GamepadState;
}

/// Input source with no buttons pressed
#[derive(Debug, Default)]
pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> GamepadState {
        GamepadState::empty()
    }
}

/// Merges several input sources with OR logic
#[derive(Default)]
pub struct CombinedInput {
    sources: Vec<Box<dyn InputSource>>,
}

impl CombinedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source
    pub fn with(mut self, source: Box<dyn InputSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl InputSource for CombinedInput {
    fn poll(&mut self) -> GamepadState {
        self.sources
            .iter_mut()
            .fold(GamepadState::empty(), |state, source| state | source.poll())
    }
}
