// Common test utilities for scheduler integration tests
//
// A scripted core that advances a manual clock by a preset duration per
// frame, and recording implementations of every scheduler collaborator.

#![allow(dead_code)]

use nes_runner::audio::AudioSink;
use nes_runner::display::{
    BufferId, DisplayUpdate, FrameBuffer, FrameView, PresentationSink, UpdateKind,
};
use nes_runner::emulator::{CoreError, EmulationCore, LoadError, Region, StateError};
use nes_runner::input::{GamepadState, InputSource, NesPad, Port};
use nes_runner::netplay::{InputRecord, PeerError, PeerLink};
use nes_runner::scheduler::{Clock, Host, Scheduler, SchedulerIo};
use nes_runner::settings::MemorySettingsStore;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

pub const MS: u64 = 1000;

/// Clock advanced by hand
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn advance(&self, micros: u64) {
        self.0.set(self.0.get() + micros);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.0.get()
    }
}

/// Core whose frames take scripted amounts of clock time
///
/// Every rendered frame has a static background and one moving dot, so
/// consecutive frames publish as small partial updates.
pub struct ScriptedCore {
    clock: ManualClock,
    refresh_rate: u32,
    durations: VecDeque<u64>,
    frame_micros: u64,
    fail_at: Option<u64>,
    pub steps: u64,
    pub rendered: u64,
    pub soft_resets: u32,
    pub hard_resets: u32,
    pub joypad_two: bool,
    pub pads: [NesPad; 2],
    pub sprite_limit: bool,
    audio: Vec<i16>,
}

impl ScriptedCore {
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Durations of the next frames, in microseconds
    pub fn script(&mut self, durations: &[u64]) {
        self.durations.extend(durations.iter().copied());
    }

    /// Fail with `CoreError::Halted` on the given step
    pub fn fail_at(&mut self, step: u64) {
        self.fail_at = Some(step);
    }
}

impl EmulationCore for ScriptedCore {
    fn init(region: Region, sample_rate: u32) -> Result<Self, LoadError> {
        let refresh_rate = match region {
            Region::Pal => 50,
            Region::Dendy => return Err(LoadError::UnsupportedSystem),
            _ => 60,
        };
        Ok(Self {
            clock: ManualClock::default(),
            refresh_rate,
            durations: VecDeque::new(),
            frame_micros: 5 * MS,
            fail_at: None,
            steps: 0,
            rendered: 0,
            soft_resets: 0,
            hard_resets: 0,
            joypad_two: false,
            pads: [NesPad::empty(); 2],
            sprite_limit: true,
            audio: vec![0; (sample_rate / refresh_rate) as usize],
        })
    }

    fn insert_media(&mut self, _rom: &Path, _bios: Option<&Path>) -> Result<(), LoadError> {
        Ok(())
    }

    fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    fn overscan(&self) -> usize {
        8
    }

    fn left_bg_counter(&self) -> u32 {
        0
    }

    fn connect_joypad(&mut self, port: Port) {
        if port == Port::Two {
            self.joypad_two = true;
        }
    }

    fn disconnect_joypad(&mut self, port: Port) {
        if port == Port::Two {
            self.joypad_two = false;
        }
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
        self.steps += 1;
        if self.fail_at == Some(self.steps) {
            return Err(CoreError::Halted("scripted failure".to_string()));
        }

        if let Some(fb) = target {
            fb.clear(0x0F);
            let x = (self.steps as usize * 3) % 200 + 20;
            fb.set_pixel(x, 120, 0x30);
            self.rendered += 1;
        }

        let micros = self.durations.pop_front().unwrap_or(self.frame_micros);
        self.clock.advance(micros);
        Ok(&self.audio)
    }

    fn reset(&mut self, hard: bool) {
        if hard {
            self.hard_resets += 1;
        } else {
            self.soft_resets += 1;
        }
    }

    fn save_state(&mut self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("steps={}", self.steps))?;
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<(), StateError> {
        let text = fs::read_to_string(path)?;
        let steps = text
            .strip_prefix("steps=")
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| StateError::Corrupt(text.clone()))?;
        self.steps = steps;
        Ok(())
    }
}

/// One presented update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presented {
    pub buffer: BufferId,
    pub kind: UpdateKind,
}

/// Sink recording every update it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub log: Rc<RefCell<Vec<Presented>>>,
    pub acknowledges: bool,
    pub waits: Rc<Cell<u32>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<UpdateKind> {
        self.log.borrow().iter().map(|p| p.kind).collect()
    }

    pub fn buffers(&self) -> Vec<usize> {
        self.log.borrow().iter().map(|p| p.buffer.index()).collect()
    }
}

impl PresentationSink for RecordingSink {
    fn present(&mut self, _frame: &FrameView<'_>, update: &DisplayUpdate) {
        self.log.borrow_mut().push(Presented {
            buffer: update.buffer,
            kind: update.kind,
        });
    }

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        self.waits.set(self.waits.get() + 1);
        self.acknowledges
    }
}

/// Audio sink recording submission sizes
#[derive(Clone, Default)]
pub struct RecordingAudio(pub Rc<RefCell<Vec<usize>>>);

impl AudioSink for RecordingAudio {
    fn submit(&mut self, samples: &[i16]) {
        self.0.borrow_mut().push(samples.len());
    }
}

/// Input source whose state is set by the test
#[derive(Clone, Default)]
pub struct SharedInput(pub Rc<Cell<GamepadState>>);

impl SharedInput {
    pub fn press(&self, state: GamepadState) {
        self.0.set(state);
    }
}

impl InputSource for SharedInput {
    fn poll(&mut self) -> GamepadState {
        self.0.get()
    }
}

#[derive(Default)]
pub struct HostState {
    pub speedup: Cell<u32>,
    pub ticks: RefCell<Vec<u64>>,
    pub alerts: RefCell<Vec<(String, String)>>,
}

/// Host recording ticks and alerts
#[derive(Clone, Default)]
pub struct TestHost(pub Rc<HostState>);

impl Host for TestHost {
    fn speedup(&self) -> u32 {
        self.0.speedup.get()
    }

    fn tick(&mut self, elapsed_micros: u64) {
        self.0.ticks.borrow_mut().push(elapsed_micros);
    }

    fn alert(&mut self, title: &str, message: &str) {
        self.0
            .alerts
            .borrow_mut()
            .push((title.to_string(), message.to_string()));
    }
}

/// Peer link replaying scripted replies and recording what was sent
#[derive(Default)]
pub struct ScriptedLink {
    pub replies: VecDeque<Result<InputRecord, PeerError>>,
    pub sent: Rc<RefCell<Vec<InputRecord>>>,
}

impl ScriptedLink {
    /// Peer answering each frame with `buttons`, `frames` times
    pub fn answering(buttons: GamepadState, frames: u32) -> Self {
        Self {
            replies: (0..frames)
                .map(|frame| {
                    Ok(InputRecord {
                        frame,
                        buttons: buttons.bits(),
                    })
                })
                .collect(),
            sent: Rc::default(),
        }
    }
}

impl PeerLink for ScriptedLink {
    fn exchange(&mut self, local: &InputRecord) -> Result<InputRecord, PeerError> {
        self.sent.borrow_mut().push(*local);
        self.replies
            .pop_front()
            .unwrap_or(Err(PeerError::Timeout))
    }
}

/// Scheduler wired to recording collaborators
pub struct Harness {
    pub scheduler: Scheduler<ScriptedCore>,
    pub sink: RecordingSink,
    pub audio: RecordingAudio,
    pub input: SharedInput,
    pub host: TestHost,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(region: Region) -> Self {
        Self::with_store(region, MemorySettingsStore::new())
    }

    pub fn with_store(region: Region, store: MemorySettingsStore) -> Self {
        let core = match ScriptedCore::init(region, 32000) {
            Ok(core) => core,
            Err(e) => panic!("scripted core: {}", e),
        };
        let clock = core.clock();
        let sink = RecordingSink {
            acknowledges: true,
            ..RecordingSink::default()
        };
        let audio = RecordingAudio::default();
        let input = SharedInput::default();
        let host = TestHost::default();

        let io = SchedulerIo {
            video: Box::new(sink.clone()),
            audio: Box::new(audio.clone()),
            input: Box::new(input.clone()),
            host: Box::new(host.clone()),
            clock: Box::new(clock.clone()),
        };
        Self {
            scheduler: Scheduler::new(core, Box::new(store), io),
            sink,
            audio,
            input,
            host,
            clock,
        }
    }

    /// Run `n` frames, returning whether each was drawn
    pub fn run(&mut self, n: usize) -> Vec<bool> {
        (0..n)
            .map(|_| match self.scheduler.run_frame() {
                Ok(report) => report.drew,
                Err(e) => panic!("frame failed: {}", e),
            })
            .collect()
    }
}
