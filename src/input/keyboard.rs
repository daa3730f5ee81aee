// Keyboard input source
//
// The window receives key events and records them here; the scheduler polls
// the same handle once per frame. Both sides run on the event loop thread.

use super::{GamepadState, InputSource};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard mapping configuration
#[derive(Debug, Clone)]
pub struct KeyboardMapping {
    bindings: Vec<(KeyCode, GamepadState)>,
}

impl KeyboardMapping {
    /// Create default keyboard mapping
    ///
    /// # Default Mappings
    /// - Arrow keys: D-pad
    /// - X: A button
    /// - Z: B button
    /// - Enter: Start
    /// - Right Shift: Select
    /// - Escape: menu
    /// - F1: settings
    pub fn default_mapping() -> Self {
        Self {
            bindings: vec![
                (KeyCode::KeyX, GamepadState::A),
                (KeyCode::KeyZ, GamepadState::B),
                (KeyCode::ShiftRight, GamepadState::SELECT),
                (KeyCode::Enter, GamepadState::START),
                (KeyCode::ArrowUp, GamepadState::UP),
                (KeyCode::ArrowDown, GamepadState::DOWN),
                (KeyCode::ArrowLeft, GamepadState::LEFT),
                (KeyCode::ArrowRight, GamepadState::RIGHT),
                (KeyCode::Escape, GamepadState::MENU),
                (KeyCode::F1, GamepadState::OPTION),
            ],
        }
    }

    /// Button bit for a key, if mapped
    pub fn lookup(&self, key: KeyCode) -> Option<GamepadState> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, state)| *state)
    }
}

impl Default for KeyboardMapping {
    fn default() -> Self {
        Self::default_mapping()
    }
}

#[derive(Debug, Default)]
struct KeyboardState {
    pressed_keys: HashSet<KeyCode>,
}

/// Shared keyboard state handle
#[derive(Debug, Clone)]
pub struct KeyboardInput {
    mapping: Rc<KeyboardMapping>,
    state: Rc<RefCell<KeyboardState>>,
}

impl KeyboardInput {
    pub fn new(mapping: KeyboardMapping) -> Self {
        Self {
            mapping: Rc::new(mapping),
            state: Rc::new(RefCell::new(KeyboardState::default())),
        }
    }

    /// Record a key press
    pub fn handle_key_press(&self, physical_key: PhysicalKey) {
        if let PhysicalKey::Code(key_code) = physical_key {
            self.state.borrow_mut().pressed_keys.insert(key_code);
        }
    }

    /// Record a key release
    pub fn handle_key_release(&self, physical_key: PhysicalKey) {
        if let PhysicalKey::Code(key_code) = physical_key {
            self.state.borrow_mut().pressed_keys.remove(&key_code);
        }
    }

    /// Current button state
    pub fn state(&self) -> GamepadState {
        self.state
            .borrow()
            .pressed_keys
            .iter()
            .filter_map(|&key| self.mapping.lookup(key))
            .fold(GamepadState::empty(), |acc, bit| acc | bit)
    }
}

impl Default for KeyboardInput {
    fn default() -> Self {
        Self::new(KeyboardMapping::default_mapping())
    }
}

impl InputSource for KeyboardInput {
    fn poll(&mut self) -> GamepadState {
        self.state()
    }
}
