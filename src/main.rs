// nes-runner - Main Entry Point
//
// Loads a ROM into the demo core and runs it in a window (or headless),
// optionally against a netplay peer.

use clap::Parser;
use nes_runner::audio::{AudioSink, FramePacer};
use nes_runner::config::{NetplayMode, RunnerConfig, CONFIG_FILE};
use nes_runner::display::{run_window, NullSink, WindowConfig, WindowHandles};
use nes_runner::emulator::{DemoCore, EmulationCore};
use nes_runner::input::{CombinedInput, GamepadInput, GamepadMapping};
use nes_runner::netplay::{Netplay, Role, TcpLink};
use nes_runner::scheduler::{
    Host, MenuEvent, MenuRequest, Scheduler, SchedulerIo, SettingOption, ShutdownHandle,
    StartAction, SystemClock,
};
use nes_runner::settings::TomlSettingsStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nes-runner", version, about = "Frame-paced NES frontend")]
struct Cli {
    /// ROM image (.nes or .fds)
    rom: PathBuf,

    /// BIOS image for disk system media
    #[arg(long)]
    bios: Option<PathBuf>,

    /// Restore save slot 0 on start
    #[arg(long)]
    resume: bool,

    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Host a netplay session on ADDR
    #[arg(long, value_name = "ADDR", conflicts_with = "join")]
    host: Option<String>,

    /// Join the netplay session at ADDR
    #[arg(long, value_name = "ADDR")]
    join: Option<String>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames (headless only)
    #[arg(long, requires = "headless")]
    frames: Option<u64>,
}

/// Host for headless runs: stops after a frame budget
struct HeadlessHost {
    shutdown: ShutdownHandle,
    remaining: Option<u64>,
}

impl Host for HeadlessHost {
    fn speedup(&self) -> u32 {
        0
    }

    fn tick(&mut self, _elapsed_micros: u64) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.shutdown.request();
            }
        }
    }

    fn alert(&mut self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = RunnerConfig::load_or_default(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("nes-runner: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: RunnerConfig) -> nes_runner::Result<()> {
    let mut core = DemoCore::init(config.system.region, config.audio.sample_rate)?;
    core.insert_media(&cli.rom, cli.bios.as_deref())?;
    let refresh_rate = core.refresh_rate();

    let store = TomlSettingsStore::open(&config.paths.settings_file);
    let audio: Box<dyn AudioSink> = match device_audio(&config) {
        Some(output) => output,
        None => Box::new(FramePacer::for_refresh_rate(refresh_rate)),
    };

    let mut input = CombinedInput::new();
    if let Some(gamepad) = GamepadInput::new(GamepadMapping::default_mapping()) {
        input = input.with(Box::new(gamepad));
    }

    let shutdown = ShutdownHandle::new();
    let handles = WindowHandles::new();
    let io = if cli.headless {
        SchedulerIo {
            video: Box::new(NullSink),
            audio,
            input: Box::new(input),
            host: Box::new(HeadlessHost {
                shutdown: shutdown.clone(),
                remaining: cli.frames,
            }),
            clock: Box::new(SystemClock::new()),
        }
    } else {
        SchedulerIo {
            video: Box::new(handles.sink.clone()),
            audio,
            input: Box::new(input.with(Box::new(handles.keyboard.clone()))),
            host: Box::new(handles.host.clone()),
            clock: Box::new(SystemClock::new()),
        }
    };

    let mut scheduler = Scheduler::new(core, Box::new(store), io)
        .with_storage(
            Some(&cli.rom),
            &config.paths.save_directory,
            &config.paths.screenshot_directory,
        )
        .with_crop_smoothing(config.video.crop_smoothing)
        .with_shutdown(shutdown);

    let (mode, address) = match (&cli.host, &cli.join) {
        (Some(addr), _) => (NetplayMode::Host, addr.clone()),
        (None, Some(addr)) => (NetplayMode::Guest, addr.clone()),
        (None, None) => (config.netplay.mode, config.netplay.address.clone()),
    };
    let action = if cli.resume {
        StartAction::Resume
    } else {
        StartAction::NewGame
    };
    if let Some(role) = mode.role() {
        scheduler = scheduler.with_netplay(Netplay::new(role));
    }
    scheduler.start(action)?;

    // Must follow start: gaining a peer hard-resets the core
    if let Some(role) = mode.role() {
        let timeout = Duration::from_millis(config.netplay.timeout_ms);
        let link = match role {
            Role::Host => TcpLink::host(address.as_str(), timeout),
            Role::Guest => TcpLink::join(address.as_str(), timeout),
        };
        match link {
            Ok(link) => scheduler.connect_peer(Box::new(link)),
            Err(e) => tracing::warn!("netplay unavailable, playing offline: {}", e),
        }
    }

    if cli.headless {
        let stop = scheduler.shutdown_handle();
        scheduler.run(|scheduler, request| match request {
            MenuRequest::Game => stop.request(),
            MenuRequest::Settings => {
                for option in SettingOption::ALL {
                    let label = scheduler.apply_option(option, MenuEvent::Refresh);
                    tracing::info!("{}: {}", option.title(), label);
                }
            }
        })
    } else {
        run_window(scheduler, handles, WindowConfig::from(&config.video))?;
        Ok(())
    }
}

/// Sound card output, when enabled and available
#[cfg(feature = "audio")]
fn device_audio(config: &RunnerConfig) -> Option<Box<dyn AudioSink>> {
    use nes_runner::audio::{AudioConfig, AudioOutput};

    if !config.audio.enabled {
        return None;
    }
    let output_config = AudioConfig::new()
        .with_sample_rate(config.audio.sample_rate)
        .with_buffer_duration(config.audio.buffer_ms);
    match AudioOutput::new(output_config) {
        Ok(output) => Some(Box::new(output)),
        Err(e) => {
            tracing::warn!("{}; pacing with a timer instead", e);
            None
        }
    }
}

#[cfg(not(feature = "audio"))]
fn device_audio(config: &RunnerConfig) -> Option<Box<dyn AudioSink>> {
    if config.audio.enabled {
        tracing::info!("built without the audio feature; pacing with a timer");
    }
    None
}
