// Gamepad input source
//
// Polls physical gamepads through gilrs and reports the first connected pad
// as the local player's controller.

use super::{GamepadState, InputSource};
use gilrs::{Button as GilrsButton, Event, EventType, Gilrs};

/// Gamepad-to-button mapping
#[derive(Debug, Clone)]
pub struct GamepadMapping {
    bindings: Vec<(GilrsButton, GamepadState)>,
}

impl GamepadMapping {
    /// Create default gamepad mapping
    ///
    /// # Default Mappings (Standard Gamepad Layout)
    /// - D-pad: D-pad buttons
    /// - South button (A/Cross): B button
    /// - East button (B/Circle): A button
    /// - Start: Start
    /// - Select/Back: Select
    /// - Mode (guide): menu
    /// - North (Y/Triangle): settings
    pub fn default_mapping() -> Self {
        Self {
            bindings: vec![
                (GilrsButton::East, GamepadState::A),
                (GilrsButton::South, GamepadState::B),
                (GilrsButton::Select, GamepadState::SELECT),
                (GilrsButton::Start, GamepadState::START),
                (GilrsButton::DPadUp, GamepadState::UP),
                (GilrsButton::DPadDown, GamepadState::DOWN),
                (GilrsButton::DPadLeft, GamepadState::LEFT),
                (GilrsButton::DPadRight, GamepadState::RIGHT),
                (GilrsButton::Mode, GamepadState::MENU),
                (GilrsButton::North, GamepadState::OPTION),
            ],
        }
    }

    /// Button bit for a gamepad button, if mapped
    pub fn lookup(&self, button: GilrsButton) -> Option<GamepadState> {
        self.bindings
            .iter()
            .find(|(b, _)| *b == button)
            .map(|(_, state)| *state)
    }
}

impl Default for GamepadMapping {
    fn default() -> Self {
        Self::default_mapping()
    }
}

/// Gilrs-backed input source
pub struct GamepadInput {
    gilrs: Gilrs,
    mapping: GamepadMapping,
    /// Gamepad driving the local controller
    active: Option<gilrs::GamepadId>,
    state: GamepadState,
}

impl GamepadInput {
    /// Initialize gamepad support
    ///
    /// Returns `None` when the platform has no gamepad backend.
    pub fn new(mapping: GamepadMapping) -> Option<Self> {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => gilrs,
            Err(e) => {
                tracing::warn!("gamepad support unavailable: {}", e);
                return None;
            }
        };

        let active = gilrs
            .gamepads()
            .find(|(_, pad)| pad.is_connected())
            .map(|(id, pad)| {
                tracing::info!("gamepad '{}' (ID: {}) drives the local controller", pad.name(), id);
                id
            });
        if active.is_none() {
            tracing::info!("no gamepad detected; keyboard input only");
        }

        Some(Self {
            gilrs,
            mapping,
            active,
            state: GamepadState::empty(),
        })
    }

    fn apply(&mut self, event: EventType) {
        match event {
            EventType::ButtonPressed(button, _) => {
                if let Some(bit) = self.mapping.lookup(button) {
                    self.state.insert(bit);
                }
            }
            EventType::ButtonReleased(button, _) => {
                if let Some(bit) = self.mapping.lookup(button) {
                    self.state.remove(bit);
                }
            }
            EventType::Disconnected => {
                self.state = GamepadState::empty();
                self.active = None;
            }
            _ => {}
        }
    }
}

impl InputSource for GamepadInput {
    fn poll(&mut self) -> GamepadState {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if self.active.is_none() && matches!(event, EventType::Connected) {
                tracing::info!("gamepad {} connected", id);
                self.active = Some(id);
            }
            if self.active == Some(id) {
                self.apply(event);
            }
        }
        self.state
    }
}
