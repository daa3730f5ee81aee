// Window module - desktop presentation sink and event loop
//
// The scheduler publishes into a `WindowSink`, which keeps an RGBA staging
// image of the screen and only converts the rows and columns an update
// touched. The winit application runs one scheduler frame per loop
// iteration and copies the staging image into the pixels surface when it
// changed.

use super::framebuffer::{FrameView, SCREEN_HEIGHT, SCREEN_WIDTH};
use super::publisher::{DisplayUpdate, PresentationSink, UpdateKind};
use crate::config::VideoConfig;
use crate::emulator::EmulationCore;
use crate::input::KeyboardInput;
use crate::scheduler::{Handlers, Host, MenuEvent, MenuRequest, Scheduler, SettingOption};
use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const TITLE: &str = "nes-runner";

/// Fast-forward factor while the speedup key is held
const SPEEDUP_FACTOR: u32 = 2;

/// Window errors
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("cannot create window: {0}")]
    Os(#[from] winit::error::OsError),

    #[error("rendering error: {0}")]
    Pixels(#[from] pixels::Error),

    #[error("emulation stopped: {0}")]
    Core(#[from] crate::emulator::CoreError),
}

/// Window configuration
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Scale factor (1x, 2x, 3x, 4x, etc.)
    pub scale: u32,

    /// Whether to enable VSync
    pub vsync: bool,
}

impl WindowConfig {
    /// Create a new window configuration with default values
    ///
    /// Default: 3x scale, VSync enabled
    pub fn new() -> Self {
        Self {
            scale: 3,
            vsync: true,
        }
    }

    /// Set the scale factor
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.clamp(1, 8); // Clamp between 1x and 8x
        self
    }

    /// Set VSync enabled or disabled
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Get the window width in pixels
    pub fn window_width(&self) -> u32 {
        SCREEN_WIDTH as u32 * self.scale
    }

    /// Get the window height in pixels
    pub fn window_height(&self) -> u32 {
        SCREEN_HEIGHT as u32 * self.scale
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&VideoConfig> for WindowConfig {
    fn from(video: &VideoConfig) -> Self {
        Self::new().with_scale(video.scale).with_vsync(video.vsync)
    }
}

struct Staging {
    rgba: Vec<u8>,
    dirty: bool,
    /// Updates converted, by kind: full, partial
    converted: (u64, u64),
}

/// Presentation sink backed by an RGBA staging image
///
/// Clones share the same image.
#[derive(Clone)]
pub struct WindowSink {
    staging: Rc<RefCell<Staging>>,
}

impl WindowSink {
    pub fn new() -> Self {
        Self {
            staging: Rc::new(RefCell::new(Staging {
                rgba: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
                dirty: false,
                converted: (0, 0),
            })),
        }
    }

    /// Whether the image changed since the last call
    pub fn take_dirty(&self) -> bool {
        std::mem::replace(&mut self.staging.borrow_mut().dirty, false)
    }

    /// Copy the staging image into a 256×240 RGBA frame
    pub fn copy_to(&self, frame: &mut [u8]) {
        let staging = self.staging.borrow();
        let len = frame.len().min(staging.rgba.len());
        frame[..len].copy_from_slice(&staging.rgba[..len]);
    }

    /// RGBA value at screen position (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let staging = self.staging.borrow();
        let i = (y * SCREEN_WIDTH + x) * 4;
        [
            staging.rgba[i],
            staging.rgba[i + 1],
            staging.rgba[i + 2],
            staging.rgba[i + 3],
        ]
    }

    /// Number of (full, partial) updates converted
    pub fn converted(&self) -> (u64, u64) {
        self.staging.borrow().converted
    }
}

impl Default for WindowSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for WindowSink {
    fn present(&mut self, frame: &FrameView<'_>, update: &DisplayUpdate) {
        let rect = update.rect;
        let (x0, y0, width, height) = match update.kind {
            UpdateKind::None => return,
            UpdateKind::Full => (0, 0, rect.width, rect.height),
            UpdateKind::Partial(dirty) => (dirty.x, dirty.y, dirty.width, dirty.height),
        };

        let mut staging = self.staging.borrow_mut();
        if update.kind.is_full() {
            // Cropped borders are black
            staging.rgba.fill(0);
            for alpha in staging.rgba.iter_mut().skip(3).step_by(4) {
                *alpha = 0xFF;
            }
            staging.converted.0 += 1;
        } else {
            staging.converted.1 += 1;
        }

        let palette = frame.buffer.palette();
        for y in y0..y0 + height {
            let row = frame.row(y);
            let screen_y = rect.y + y;
            let start = (screen_y * SCREEN_WIDTH + rect.x + x0) * 4;
            let out = &mut staging.rgba[start..start + width * 4];
            for (px, rgba) in row[x0..x0 + width].iter().zip(out.chunks_exact_mut(4)) {
                rgba.copy_from_slice(&palette.rgba(*px));
            }
        }
        staging.dirty = true;
    }
}

#[derive(Default)]
struct HostState {
    speedup: Cell<u32>,
    frame_micros: Cell<u64>,
    alert: RefCell<Option<String>>,
}

/// Host services for the window frontend
///
/// Clones share state: the window sets the speedup while the speedup key
/// is held, and shows alerts in the title bar.
#[derive(Clone, Default)]
pub struct WindowHost {
    state: Rc<HostState>,
}

impl WindowHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_speedup(&self, speedup: u32) {
        self.state.speedup.set(speedup);
    }

    /// Duration of the last frame in microseconds
    pub fn last_frame_micros(&self) -> u64 {
        self.state.frame_micros.get()
    }

    fn take_alert(&self) -> Option<String> {
        self.state.alert.borrow_mut().take()
    }
}

impl Host for WindowHost {
    fn speedup(&self) -> u32 {
        self.state.speedup.get()
    }

    fn tick(&mut self, elapsed_micros: u64) {
        self.state.frame_micros.set(elapsed_micros);
    }

    fn alert(&mut self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);
        *self.state.alert.borrow_mut() = Some(format!("{} - {}", title, message));
    }
}

/// Shared endpoints the window and the scheduler both hold
#[derive(Clone, Default)]
pub struct WindowHandles {
    pub sink: WindowSink,
    pub keyboard: KeyboardInput,
    pub host: WindowHost,
}

impl WindowHandles {
    pub fn new() -> Self {
        Self::default()
    }
}

struct App<C: EmulationCore> {
    scheduler: Scheduler<C>,
    handles: WindowHandles,
    config: WindowConfig,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    last_menu: Option<MenuRequest>,
    settings_cursor: usize,
    failure: Option<WindowError>,
}

impl<C: EmulationCore> App<C> {
    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<(), WindowError> {
        let window_attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(
                self.config.window_width(),
                self.config.window_height(),
            ))
            .with_resizable(false);

        // Wrap window in Arc for shared ownership
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let window_size = window.inner_size();

        // Create surface texture using Arc<Window> for safe 'static lifetime
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());
        let pixels = PixelsBuilder::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, surface_texture)
            .enable_vsync(self.config.vsync)
            .build()?;

        self.window = Some(window);
        self.pixels = Some(pixels);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: WindowError) {
        tracing::error!("{}", error);
        self.failure = Some(error);
        event_loop.exit();
    }

    fn render(&mut self) -> Result<(), pixels::Error> {
        if let Some(pixels) = &mut self.pixels {
            self.handles.sink.copy_to(pixels.frame_mut());
            pixels.render()?;
        }
        Ok(())
    }

    /// Act on a menu request on the frame the button goes down
    fn handle_menu(&mut self, event_loop: &ActiveEventLoop, request: Option<MenuRequest>) {
        let rising = request.is_some() && request != self.last_menu;
        self.last_menu = request;
        if !rising {
            return;
        }
        match request {
            Some(MenuRequest::Game) => {
                tracing::info!("menu: quit");
                event_loop.exit();
            }
            Some(MenuRequest::Settings) => {
                let options = self.scheduler.settings_options();
                let option = options[self.settings_cursor % options.len()];
                self.settings_cursor += 1;
                let label = self.scheduler.apply_option(option, MenuEvent::Next);
                self.set_title(&format!("{}: {}", option.title(), label));
            }
            None => {}
        }
    }

    fn set_title(&self, status: &str) {
        if let Some(window) = &self.window {
            window.set_title(&format!("{} - {}", TITLE, status));
        }
    }

    /// Hotkeys outside the controller layout
    fn handle_hotkey(&mut self, key: KeyCode) {
        let status = match key {
            KeyCode::F5 => match self.scheduler.save_state(0) {
                Ok(()) => "State saved".to_string(),
                Err(e) => format!("Save failed: {}", e),
            },
            KeyCode::F7 => match self.scheduler.load_state(0) {
                Ok(()) => "State loaded".to_string(),
                Err(e) => format!("Load failed: {}", e),
            },
            KeyCode::F8 => {
                self.scheduler.reset(false);
                "Reset".to_string()
            }
            KeyCode::F9 => match self.scheduler.take_screenshot() {
                Ok(path) => format!("Screenshot {}", path.display()),
                Err(e) => format!("Screenshot failed: {}", e),
            },
            KeyCode::F2 => self.option_status(SettingOption::Palette, MenuEvent::Prev),
            KeyCode::F3 => self.option_status(SettingOption::Palette, MenuEvent::Next),
            KeyCode::F4 => self.option_status(SettingOption::Crop, MenuEvent::Next),
            KeyCode::F6 => self.option_status(SettingOption::Overscan, MenuEvent::Next),
            KeyCode::F10 => self.option_status(SettingOption::SpriteLimit, MenuEvent::Next),
            _ => return,
        };
        self.set_title(&status);
    }

    fn option_status(&mut self, option: SettingOption, event: MenuEvent) -> String {
        let label = self.scheduler.apply_option(option, event);
        format!("{}: {}", option.title(), label)
    }
}

impl<C: EmulationCore> ApplicationHandler for App<C> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_surface(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        repeat,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.handles.keyboard.handle_key_press(physical_key);
                    if let PhysicalKey::Code(code) = physical_key {
                        if code == KeyCode::Tab {
                            self.handles.host.set_speedup(SPEEDUP_FACTOR);
                        } else if !repeat {
                            self.handle_hotkey(code);
                        }
                    }
                }
                ElementState::Released => {
                    self.handles.keyboard.handle_key_release(physical_key);
                    if physical_key == PhysicalKey::Code(KeyCode::Tab) {
                        self.handles.host.set_speedup(0);
                    }
                }
            },
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e.into());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            return;
        }
        if self.scheduler.shutdown_handle().is_requested() {
            event_loop.exit();
            return;
        }

        match self.scheduler.run_frame() {
            Ok(report) => self.handle_menu(event_loop, report.menu),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        }

        if let Some(alert) = self.handles.host.take_alert() {
            self.set_title(&alert);
        }
        if self.handles.sink.take_dirty() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

/// Run the scheduler in a desktop window until it is closed
///
/// `handles` must be the endpoints the scheduler was built with.
pub fn run_window<C: EmulationCore>(
    scheduler: Scheduler<C>,
    handles: WindowHandles,
    config: WindowConfig,
) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;
    // Pacing comes from the audio sink; keep the loop spinning
    event_loop.set_control_flow(ControlFlow::Poll);

    tracing::info!(
        "window {}x{} (scale {}x, vsync {})",
        config.window_width(),
        config.window_height(),
        config.scale,
        config.vsync
    );

    let mut app = App {
        scheduler,
        handles,
        config,
        window: None,
        pixels: None,
        last_menu: None,
        settings_cursor: 0,
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{BufferId, CropRect, DirtyRect, FrameBuffer, PaletteKind, PaletteTable};

    fn frame_with(pixel: u8) -> FrameBuffer {
        let mut fb = FrameBuffer::new(Arc::new(PaletteTable::build(PaletteKind::Default)));
        fb.clear(pixel);
        fb
    }

    #[test]
    fn test_window_config_builder() {
        let config = WindowConfig::new().with_scale(2).with_vsync(false);
        assert_eq!(config.window_width(), 512);
        assert_eq!(config.window_height(), 480);
        assert!(!config.vsync);
        assert_eq!(WindowConfig::new().with_scale(20).scale, 8);
    }

    #[test]
    fn test_full_update_blacks_out_cropped_border() {
        let fb = frame_with(0x30);
        let rect = CropRect::inset(8, 8);
        let mut sink = WindowSink::new();
        sink.present(
            &FrameView { buffer: &fb, rect },
            &DisplayUpdate {
                buffer: BufferId::default(),
                rect,
                kind: UpdateKind::Full,
            },
        );

        assert!(sink.take_dirty());
        assert!(!sink.take_dirty());
        assert_eq!(sink.pixel(0, 0), [0, 0, 0, 0xFF]);
        assert_eq!(sink.pixel(8, 8), fb.palette().rgba(0x30));
        assert_eq!(sink.pixel(247, 231), fb.palette().rgba(0x30));
        assert_eq!(sink.pixel(248, 231), [0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_partial_update_converts_only_dirty_region() {
        let rect = CropRect::FULL;
        let mut sink = WindowSink::new();
        let base = frame_with(0x0F);
        sink.present(
            &FrameView { buffer: &base, rect },
            &DisplayUpdate {
                buffer: BufferId::default(),
                rect,
                kind: UpdateKind::Full,
            },
        );

        let changed = frame_with(0x16);
        let dirty = DirtyRect {
            x: 10,
            y: 20,
            width: 4,
            height: 2,
        };
        sink.present(
            &FrameView {
                buffer: &changed,
                rect,
            },
            &DisplayUpdate {
                buffer: BufferId::default(),
                rect,
                kind: UpdateKind::Partial(dirty),
            },
        );

        assert_eq!(sink.pixel(10, 20), changed.palette().rgba(0x16));
        assert_eq!(sink.pixel(13, 21), changed.palette().rgba(0x16));
        assert_eq!(sink.pixel(14, 21), base.palette().rgba(0x0F));
        assert_eq!(sink.pixel(10, 22), base.palette().rgba(0x0F));
        assert_eq!(sink.converted(), (1, 1));
    }

    #[test]
    fn test_host_shares_speedup_and_alerts() {
        let host = WindowHost::new();
        let mut scheduler_side = host.clone();
        host.set_speedup(2);
        assert_eq!(scheduler_side.speedup(), 2);

        scheduler_side.alert("Netplay", "Connection lost!");
        assert_eq!(
            host.take_alert().as_deref(),
            Some("Netplay - Connection lost!")
        );
        assert_eq!(host.take_alert(), None);
    }
}
