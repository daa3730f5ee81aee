// Frame Buffer - padded pixel storage shared between the core and the display
//
// The NES has a resolution of 256×240 pixels. Each pixel is represented
// by a palette index (0-63) which maps to a color in the current palette table.
//
// The working buffer is wider than the visible picture: sprites and the
// background are allowed to overdraw 8 pixels past either side, so each row
// has an 8 pixel guard band on the left and right.

use super::palette::{PaletteTable, PIXEL_MASK};
use bitflags::bitflags;
use std::sync::Arc;

/// NES screen width in pixels
pub const SCREEN_WIDTH: usize = 256;

/// NES screen height in pixels
pub const SCREEN_HEIGHT: usize = 240;

/// Guard band on each side of a row
pub const OVERDRAW: usize = 8;

/// Bytes per row of the padded working buffer
pub const SCREEN_PITCH: usize = OVERDRAW + SCREEN_WIDTH + OVERDRAW;

bitflags! {
    /// Pixel format of a frame buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PixelFormat: u8 {
        /// Pixels are indices into a palette table
        const PALETTED = 0x01;
        /// Colors are RGB565
        const RGB565 = 0x02;
        /// Colors are stored big-endian
        const BIG_ENDIAN = 0x04;
    }
}

/// Logical sub-rectangle over a frame buffer, in visible-picture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    /// The whole visible picture
    pub const FULL: CropRect = CropRect {
        x: 0,
        y: 0,
        width: SCREEN_WIDTH,
        height: SCREEN_HEIGHT,
    };

    /// Rectangle with `horizontal` pixels removed from the left and right and
    /// `vertical` rows removed from the top and bottom
    pub fn inset(horizontal: usize, vertical: usize) -> Self {
        let horizontal = horizontal.min(SCREEN_WIDTH / 2);
        let vertical = vertical.min(SCREEN_HEIGHT / 2);
        CropRect {
            x: horizontal,
            y: vertical,
            width: SCREEN_WIDTH - horizontal * 2,
            height: SCREEN_HEIGHT - vertical * 2,
        }
    }

    /// Number of pixels covered
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the rectangle has the same size as `other`
    pub fn same_size(&self, other: &CropRect) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Frame buffer for storing pixel data
///
/// Stores palette indices for the padded 272×240 working area. The display
/// only ever sees the visible part, described by a [`CropRect`].
pub struct FrameBuffer {
    /// Pixel data stored as palette indices (0-63)
    pixels: Vec<u8>,

    /// Bytes per row, fixed for the session
    stride: usize,

    format: PixelFormat,

    /// Shared read-only palette
    palette: Arc<PaletteTable>,

    /// Mask applied to each pixel before lookup
    pixel_mask: u8,
}

impl FrameBuffer {
    /// Create a new frame buffer initialized to black (palette index 0x0F)
    pub fn new(palette: Arc<PaletteTable>) -> Self {
        Self {
            pixels: vec![0x0F; SCREEN_PITCH * SCREEN_HEIGHT],
            stride: SCREEN_PITCH,
            format: PixelFormat::PALETTED | PixelFormat::RGB565 | PixelFormat::BIG_ENDIAN,
            palette,
            pixel_mask: PIXEL_MASK,
        }
    }

    /// Visible width in pixels
    pub fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    /// Visible height in pixels
    pub fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    /// Bytes per row of the working buffer
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixel_mask(&self) -> u8 {
        self.pixel_mask
    }

    /// Palette table attached to this buffer
    pub fn palette(&self) -> &Arc<PaletteTable> {
        &self.palette
    }

    /// Attach a new palette table
    pub fn set_palette(&mut self, palette: Arc<PaletteTable>) {
        self.palette = palette;
    }

    /// Offset of visible pixel (x, y) in the working buffer
    #[inline]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + OVERDRAW + x
    }

    /// Set a visible pixel
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, palette_index: u8) {
        assert!(x < SCREEN_WIDTH, "X coordinate {} out of bounds", x);
        assert!(y < SCREEN_HEIGHT, "Y coordinate {} out of bounds", y);

        let offset = self.offset(x, y);
        self.pixels[offset] = palette_index & self.pixel_mask;
    }

    /// Get a visible pixel
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        assert!(x < SCREEN_WIDTH, "X coordinate {} out of bounds", x);
        assert!(y < SCREEN_HEIGHT, "Y coordinate {} out of bounds", y);

        self.pixels[self.offset(x, y)]
    }

    /// Visible pixels of row `y` between columns `x` and `x + width`
    #[inline]
    pub fn row(&self, y: usize, x: usize, width: usize) -> &[u8] {
        let start = self.offset(x, y);
        &self.pixels[start..start + width]
    }

    /// Clear the working buffer to a specific palette index
    pub fn clear(&mut self, palette_index: u8) {
        self.pixels.fill(palette_index & self.pixel_mask);
    }

    /// Raw working buffer, including guard bands
    pub fn as_slice(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw working buffer, including guard bands
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Read-only view of a published frame
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    pub buffer: &'a FrameBuffer,
    pub rect: CropRect,
}

impl<'a> FrameView<'a> {
    /// Pixels of row `y` (relative to the crop rectangle)
    pub fn row(&self, y: usize) -> &'a [u8] {
        self.buffer
            .row(self.rect.y + y, self.rect.x, self.rect.width)
    }

    /// Convert the view to packed RGB bytes
    pub fn to_rgb(&self) -> Vec<u8> {
        let palette = self.buffer.palette();
        let mut out = Vec::with_capacity(self.rect.area() * 3);
        for y in 0..self.rect.height {
            for &pixel in self.row(y) {
                let rgba = palette.rgba(pixel);
                out.extend_from_slice(&rgba[..3]);
            }
        }
        out
    }
}

/// Index of a buffer inside the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferId(usize);

impl BufferId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Exactly two frame buffers whose roles rotate after every published frame
///
/// The core renders into `current`; once published, `current` becomes the
/// diff baseline (`previous`) and the other buffer is handed back to the core.
pub struct FramePool {
    buffers: [FrameBuffer; 2],
    current: usize,
    previous: Option<usize>,
    rects: [CropRect; 2],
}

impl FramePool {
    /// Allocate both buffers with the given palette
    pub fn new(palette: Arc<PaletteTable>) -> Self {
        Self {
            buffers: [
                FrameBuffer::new(Arc::clone(&palette)),
                FrameBuffer::new(palette),
            ],
            current: 0,
            previous: None,
            rects: [CropRect::FULL; 2],
        }
    }

    /// Buffer the core should render into next
    pub fn current(&self) -> &FrameBuffer {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffers[self.current]
    }

    pub fn current_id(&self) -> BufferId {
        BufferId(self.current)
    }

    /// Last published buffer and the rectangle it was published with
    pub fn previous(&self) -> Option<(&FrameBuffer, CropRect)> {
        self.previous
            .map(|index| (&self.buffers[index], self.rects[index]))
    }

    pub fn previous_id(&self) -> Option<BufferId> {
        self.previous.map(BufferId)
    }

    /// Record the rectangle `current` was published with and swap roles
    pub fn rotate(&mut self, rect: CropRect) {
        self.rects[self.current] = rect;
        self.previous = Some(self.current);
        self.current ^= 1;
    }

    /// Attach a palette table to both buffers
    pub fn set_palette(&mut self, palette: Arc<PaletteTable>) {
        for buffer in &mut self.buffers {
            buffer.set_palette(Arc::clone(&palette));
        }
    }
}
