// Frame scheduler - drives the emulation core one video frame at a time
//
// Each iteration samples input, trades it with the netplay peer, steps the
// core, publishes the rendered frame (when drawing), applies the skip policy,
// reports the frame time to the host and submits audio.

pub mod clock;
pub mod options;

pub use clock::{Clock, EmulationClock, SystemClock};
pub use options::{MenuEvent, SettingOption};

use crate::audio::AudioSink;
use crate::display::{
    save_frame, screenshot_path, CropCalculator, FramePool, FrameView, PaletteTable,
    PresentationSink, Publisher, ScreenshotError, UpdateKind,
};
use crate::emulator::{CoreError, EmulationCore, SaveSlots, StateError};
use crate::error::Result;
use crate::input::{GamepadState, InputFrame, InputSource, Port};
use crate::netplay::{Netplay, NetplayEvent, NetplayStatus, PeerLink, Transition};
use crate::settings::{PersistedSettings, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Services the scheduler needs from the surrounding system
pub trait Host {
    /// Fast-forward factor; 0 runs at normal speed
    fn speedup(&self) -> u32;

    /// Called once per frame with the time the frame took
    fn tick(&mut self, elapsed_micros: u64);

    /// Show a message to the user
    fn alert(&mut self, title: &str, message: &str);
}

/// Host that never speeds up and logs alerts
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn speedup(&self) -> u32 {
        0
    }

    fn tick(&mut self, _elapsed_micros: u64) {}

    fn alert(&mut self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);
    }
}

/// How the session begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartAction {
    #[default]
    NewGame,
    /// Restore save slot 0 after warm-up
    Resume,
}

/// Menu the local player asked for during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuRequest {
    /// In-game menu (save, load, reset, quit)
    Game,
    /// Display/emulation settings
    Settings,
}

/// Outcome of one scheduler iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// The frame was rendered and published
    pub drew: bool,
    /// Publication result when drawn
    pub update: Option<UpdateKind>,
    pub elapsed_micros: u64,
    /// Frames still to skip after this one
    pub skip_frames: u32,
    pub menu: Option<MenuRequest>,
    /// Netplay status change caused by this frame
    pub transition: Option<Transition>,
}

/// Cloneable flag that stops [`Scheduler::run`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outputs and services driven by the scheduler
pub struct SchedulerIo {
    pub video: Box<dyn PresentationSink>,
    pub audio: Box<dyn AudioSink>,
    pub input: Box<dyn InputSource>,
    pub host: Box<dyn Host>,
    pub clock: Box<dyn Clock>,
}

/// Operations exposed to menus and hotkeys
pub trait Handlers {
    /// Restore `slot`; on failure the core is hard-reset and the error returned
    fn load_state(&mut self, slot: u8) -> std::result::Result<(), StateError>;

    fn save_state(&mut self, slot: u8) -> std::result::Result<(), StateError>;

    fn reset(&mut self, hard: bool);

    fn netplay_event(&mut self, event: NetplayEvent);

    /// Save the last presented frame as PNG
    fn screenshot(&mut self, path: &Path) -> std::result::Result<(), ScreenshotError>;

    /// User controls offered by the settings menu
    fn settings_options(&self) -> &'static [SettingOption];
}

/// Frame scheduler
pub struct Scheduler<C: EmulationCore> {
    core: C,
    pool: FramePool,
    publisher: Publisher,
    crop: CropCalculator,
    settings: PersistedSettings,
    store: Box<dyn SettingsStore>,
    clock: EmulationClock,
    io: SchedulerIo,
    netplay: Option<Netplay>,
    input: InputFrame,
    /// Samples of the last stepped frame
    audio: Vec<i16>,
    slots: SaveSlots,
    screenshot_dir: PathBuf,
    rom: Option<PathBuf>,
    shutdown: ShutdownHandle,
    frames: u64,
}

impl<C: EmulationCore> Scheduler<C> {
    /// Create a scheduler around a core with media inserted
    ///
    /// Persisted settings are loaded from `store`; the palette is built and
    /// the sprite limit applied to the core.
    pub fn new(mut core: C, store: Box<dyn SettingsStore>, io: SchedulerIo) -> Self {
        let settings = PersistedSettings::load(store.as_ref());
        let palette = Arc::new(PaletteTable::build(settings.palette));
        core.set_sprite_limit(settings.sprite_limit);
        let clock = EmulationClock::new(core.refresh_rate());

        tracing::debug!(
            "scheduler: {} Hz, palette {}, crop {}, overscan {}",
            core.refresh_rate(),
            settings.palette.label(),
            settings.crop_mode.label(),
            settings.overscan
        );

        Self {
            core,
            pool: FramePool::new(palette),
            publisher: Publisher::new(),
            crop: CropCalculator::new(),
            settings,
            store,
            clock,
            io,
            netplay: None,
            input: InputFrame::new(),
            audio: Vec::new(),
            slots: SaveSlots::new(Path::new("saves"), None),
            screenshot_dir: PathBuf::from("screenshots"),
            rom: None,
            shutdown: ShutdownHandle::new(),
            frames: 0,
        }
    }

    /// Use per-ROM save slots and screenshot names
    pub fn with_storage(mut self, rom: Option<&Path>, save_dir: &Path, screenshot_dir: &Path) -> Self {
        self.slots = SaveSlots::new(save_dir, rom);
        self.screenshot_dir = screenshot_dir.to_path_buf();
        self.rom = rom.map(Path::to_path_buf);
        self
    }

    pub fn with_crop_smoothing(mut self, smoothing: bool) -> Self {
        self.crop = CropCalculator::with_smoothing(smoothing);
        self
    }

    /// Enable netplay with a (possibly not yet connected) session
    pub fn with_netplay(mut self, session: Netplay) -> Self {
        self.netplay = Some(session);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    /// Backing store of the persisted settings
    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &EmulationClock {
        &self.clock
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn netplay(&self) -> Option<&Netplay> {
        self.netplay.as_ref()
    }

    /// Controller state pushed to the core on the last frame
    pub fn input_frame(&self) -> InputFrame {
        self.input
    }

    pub fn save_slots(&self) -> &SaveSlots {
        &self.slots
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Frames run since start
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Warm the core up and apply the start action
    ///
    /// The core is stepped twice without video before anything else; a
    /// resume then restores slot 0. A failed restore leaves a hard-reset
    /// machine and is not fatal. Slot 0 is local to this machine, so a
    /// resume is skipped while a netplay peer is connected.
    pub fn start(&mut self, action: StartAction) -> Result<()> {
        for _ in 0..2 {
            self.core.step(None)?;
        }

        let connected = self.netplay.as_ref().is_some_and(Netplay::is_connected);
        if action == StartAction::Resume && connected {
            tracing::info!("netplay: connected, not resuming local state");
        } else if action == StartAction::Resume {
            if let Err(e) = Handlers::load_state(self, 0) {
                tracing::warn!("resume failed, starting fresh: {}", e);
            }
        }

        self.clock.reset();
        tracing::info!("started ({:?})", action);
        Ok(())
    }

    /// Run one frame
    pub fn run_frame(&mut self) -> std::result::Result<FrameReport, CoreError> {
        let start = self.io.clock.now_micros();

        let local = self.io.input.poll();
        let menu = if local.contains(GamepadState::MENU) {
            Some(MenuRequest::Game)
        } else if local.contains(GamepadState::OPTION) {
            Some(MenuRequest::Settings)
        } else {
            None
        };

        let transition = self.sync_input(local);
        self.core
            .set_input(Port::One, self.input.get(Port::One).to_nes_pad());
        self.core
            .set_input(Port::Two, self.input.get(Port::Two).to_nes_pad());

        let drew = self.clock.draw_next();
        let target = if drew {
            Some(self.pool.current_mut())
        } else {
            None
        };
        let samples = self.core.step(target)?;
        self.audio.clear();
        self.audio.extend_from_slice(samples);

        let update = if drew {
            let rect = self.crop.compute(
                self.settings.crop_mode,
                self.settings.overscan,
                self.core.overscan(),
                self.core.left_bg_counter(),
            );
            Some(
                self.publisher
                    .publish(&mut self.pool, rect, self.io.video.as_mut()),
            )
        } else {
            None
        };

        let elapsed_micros = self.io.clock.now_micros().saturating_sub(start);
        let speedup = self.io.host.speedup();
        let full = update.is_some_and(|kind| kind.is_full());
        self.clock.advance(elapsed_micros, speedup, full);

        self.io.host.tick(elapsed_micros);

        if speedup == 0 {
            self.io.audio.submit(&self.audio);
        }

        self.frames += 1;
        Ok(FrameReport {
            drew,
            update,
            elapsed_micros,
            skip_frames: self.clock.skip_frames(),
            menu,
            transition,
        })
    }

    /// Run frames until shutdown is requested or the core fails
    ///
    /// Menu requests are passed to `menu` between frames.
    pub fn run<F>(&mut self, mut menu: F) -> Result<()>
    where
        F: FnMut(&mut Self, MenuRequest),
    {
        while !self.shutdown.is_requested() {
            let report = self.run_frame()?;
            if let Some(request) = report.menu {
                menu(self, request);
            }
        }

        let (drawn, skipped) = self.clock.counts();
        let stats = self.publisher.stats();
        tracing::info!(
            "stopped after {} frames ({} drawn, {} skipped; {} full, {} partial, {} unchanged)",
            self.frames,
            drawn,
            skipped,
            stats.full,
            stats.partial,
            stats.unchanged
        );
        Ok(())
    }

    /// Install a connected peer link
    pub fn connect_peer(&mut self, link: Box<dyn PeerLink>) {
        let Some(session) = self.netplay.as_mut() else {
            tracing::warn!("netplay: link offered but netplay is disabled");
            return;
        };
        let transition = session.attach(link);
        self.handle_transition(transition);
    }

    /// Save the last presented frame under the screenshot directory
    pub fn take_screenshot(&mut self) -> std::result::Result<PathBuf, ScreenshotError> {
        let path = screenshot_path(&self.screenshot_dir, self.rom.as_deref());
        Handlers::screenshot(self, &path)?;
        Ok(path)
    }

    /// Fill the input frame for this iteration
    ///
    /// Without a connected peer the local player drives port 1 and port 2 is
    /// idle. A failed exchange ends the session and the frame continues with
    /// local input only.
    fn sync_input(&mut self, local: GamepadState) -> Option<Transition> {
        self.input = InputFrame::new();

        let mut transition = None;
        let mut remote = GamepadState::empty();
        if let Some(session) = self.netplay.as_mut().filter(|s| s.is_connected()) {
            match session.exchange(local) {
                Ok(state) => remote = state,
                Err(e) => {
                    tracing::warn!("netplay: {}", e);
                    transition = Some(session.set_status(NetplayStatus::Disconnected));
                }
            }
        }
        if let Some(t) = transition {
            self.handle_transition(t);
        }

        match self.netplay.as_ref().filter(|s| s.is_connected()) {
            Some(session) => {
                self.input.set(session.local_port(), local);
                self.input.set(session.remote_port(), remote);
            }
            None => self.input.set(Port::One, local),
        }
        transition
    }

    fn handle_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Lost => {
                tracing::info!("netplay: connection lost");
                self.core.disconnect_joypad(Port::Two);
                self.io.host.alert("Netplay", "Connection lost!");
            }
            Transition::Gained => {
                tracing::info!("netplay: connected, resetting");
                self.core.connect_joypad(Port::Two);
                self.core.reset(true);
                self.clock.reset();
            }
            Transition::Unchanged => {}
        }
    }

    fn present_last_frame(&mut self) -> bool {
        self.publisher
            .republish(&self.pool, self.io.video.as_mut())
    }
}

impl<C: EmulationCore> Handlers for Scheduler<C> {
    fn load_state(&mut self, slot: u8) -> std::result::Result<(), StateError> {
        let path = self.slots.path(slot);
        match self.core.load_state(&path) {
            Ok(()) => {
                tracing::info!("loaded state from {}", path.display());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("cannot load {}: {}; hard reset", path.display(), e);
                self.core.reset(true);
                Err(e)
            }
        }
    }

    fn save_state(&mut self, slot: u8) -> std::result::Result<(), StateError> {
        let path = self.slots.path(slot);
        self.core.save_state(&path)?;
        tracing::info!("saved state to {}", path.display());
        Ok(())
    }

    fn reset(&mut self, hard: bool) {
        tracing::info!("{} reset", if hard { "hard" } else { "soft" });
        self.core.reset(hard);
    }

    fn netplay_event(&mut self, event: NetplayEvent) {
        let Some(session) = self.netplay.as_mut() else {
            tracing::debug!("netplay: ignoring {:?}", event);
            return;
        };
        let transition = match event {
            NetplayEvent::StatusChanged(status) => session.set_status(status),
            NetplayEvent::RoleChanged(role) => {
                session.set_role(role);
                Transition::Unchanged
            }
        };
        self.handle_transition(transition);
    }

    fn screenshot(&mut self, path: &Path) -> std::result::Result<(), ScreenshotError> {
        let (buffer, rect) = self.pool.previous().ok_or(ScreenshotError::NoFrame)?;
        save_frame(&FrameView { buffer, rect }, path)?;
        tracing::info!("screenshot saved to {}", path.display());
        Ok(())
    }

    fn settings_options(&self) -> &'static [SettingOption] {
        &SettingOption::ALL
    }
}
