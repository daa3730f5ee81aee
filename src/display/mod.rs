// Display module - frame buffers, palettes and presentation
//
// This module provides:
// - NES color palettes converted to byte-swapped RGB565
// - A two-buffer frame pool with padded 256×240 paletted buffers
// - Crop/overscan rectangle calculation
// - The update publisher (full / partial / unchanged detection)
// - PNG screenshots
// - A winit + pixels window acting as presentation sink

pub mod crop;
pub mod framebuffer;
pub mod palette;
pub mod publisher;
pub mod screenshot;
pub mod window;

pub use crop::{CropCalculator, AUTO_CROP_THRESHOLD, HORIZONTAL_CROP};
pub use framebuffer::{
    BufferId, CropRect, FrameBuffer, FramePool, FrameView, PixelFormat, OVERDRAW, SCREEN_HEIGHT,
    SCREEN_PITCH, SCREEN_WIDTH,
};
pub use palette::{PaletteKind, PaletteTable, NES_PALETTE, PALETTE_SIZE, PIXEL_MASK};
pub use publisher::{
    DirtyRect, DisplayUpdate, NullSink, PresentationSink, PublishStats, Publisher, UpdateKind,
};
pub use screenshot::{save_frame, screenshot_path, ScreenshotError};
pub use window::{run_window, WindowConfig, WindowError, WindowHandles, WindowHost, WindowSink};
