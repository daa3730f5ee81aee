// NES Color Palette - builds the 64-entry display color table
//
// The NES has a master palette of 64 colors (indexed 0x00-0x3F).
// This includes 52 unique colors plus some duplicates and unused entries.
//
// The display takes 16-bit RGB565 pixels in big-endian byte order, so every
// table entry is packed and byte-swapped once when the palette is built. The
// table is immutable: selecting another palette builds a new one.

use std::f32::consts::PI;

/// Number of entries in a palette table
pub const PALETTE_SIZE: usize = 64;

/// Mask applied to pixel values before palette lookup
pub const PIXEL_MASK: u8 = 0x3F;

/// NES master palette in RGB format (64 colors)
///
/// Each color is represented as a 32-bit value: 0xRRGGBB
/// The palette uses a standard RGB conversion that approximates the NTSC NES output.
pub const NES_PALETTE: [u32; PALETTE_SIZE] = [
    // $00-$0F
    0x666666, 0x002A88, 0x1412A7, 0x3B00A4, 0x5C007E, 0x6E0040, 0x6C0600, 0x561D00,
    0x333500, 0x0B4800, 0x005200, 0x004F08, 0x00404D, 0x000000, 0x000000, 0x000000,
    // $10-$1F
    0xADADAD, 0x155FD9, 0x4240FF, 0x7527FE, 0xA01ACC, 0xB71E7B, 0xB53120, 0x994E00,
    0x6B6D00, 0x388700, 0x0C9300, 0x008F32, 0x007C8D, 0x000000, 0x000000, 0x000000,
    // $20-$2F
    0xFFFEFF, 0x64B0FF, 0x9290FF, 0xC676FF, 0xF36AFF, 0xFE6ECC, 0xFE8170, 0xEA9E22,
    0xBCBE00, 0x88D800, 0x5CE430, 0x45E082, 0x48CDDE, 0x4F4F4F, 0x000000, 0x000000,
    // $30-$3F
    0xFFFEFF, 0xC0DFFF, 0xD3D2FF, 0xE8C8FF, 0xFBC2FF, 0xFEC4EA, 0xFECCC5, 0xF7D8A5,
    0xE4E594, 0xCFEF96, 0xBDF4AB, 0xB3F3CC, 0xB5EBF2, 0xB8B8B8, 0x000000, 0x000000,
];

/// Selectable palettes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteKind {
    Default,
    Composite,
    NesClassic,
    Ntsc,
    Pvm,
    Smooth,
}

impl PaletteKind {
    /// Number of selectable palettes
    pub const COUNT: usize = 6;

    const ALL: [PaletteKind; Self::COUNT] = [
        PaletteKind::Default,
        PaletteKind::Composite,
        PaletteKind::NesClassic,
        PaletteKind::Ntsc,
        PaletteKind::Pvm,
        PaletteKind::Smooth,
    ];

    /// Palette for a stored index; out-of-range values select `Default`
    pub fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(PaletteKind::Default)
    }

    /// Stored index of this palette
    pub fn index(self) -> usize {
        self as usize
    }

    /// Previous palette, wrapping from the first to the last
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::COUNT - 1) % Self::COUNT]
    }

    /// Next palette, wrapping from the last to the first
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }

    /// Menu label
    pub fn label(self) -> &'static str {
        match self {
            PaletteKind::Default => "Default",
            PaletteKind::Composite => "Composite",
            PaletteKind::NesClassic => "NES Classic",
            PaletteKind::Ntsc => "NTSC",
            PaletteKind::Pvm => "PVM",
            PaletteKind::Smooth => "Smooth",
        }
    }

    /// RGB source colors for this palette
    pub fn rgb(self) -> [u32; PALETTE_SIZE] {
        match self {
            PaletteKind::Default => NES_PALETTE,
            PaletteKind::Composite => generate(&SignalParams::NEUTRAL),
            PaletteKind::NesClassic => generate(&SignalParams {
                hue: -0.15,
                saturation: 0.85,
                contrast: 1.05,
                brightness: 0.0,
                gamma: 1.1,
            }),
            PaletteKind::Ntsc => generate(&SignalParams {
                hue: 0.0,
                saturation: 1.2,
                contrast: 1.0,
                brightness: 0.0,
                gamma: 1.0,
            }),
            PaletteKind::Pvm => generate(&SignalParams {
                hue: 0.1,
                saturation: 1.1,
                contrast: 1.1,
                brightness: -0.02,
                gamma: 0.9,
            }),
            PaletteKind::Smooth => generate(&SignalParams {
                hue: 0.0,
                saturation: 0.75,
                contrast: 0.95,
                brightness: 0.03,
                gamma: 1.15,
            }),
        }
    }
}

/// Composite signal decoder parameters
struct SignalParams {
    /// Hue shift in chroma phase steps (one step is 30 degrees)
    hue: f32,
    saturation: f32,
    contrast: f32,
    brightness: f32,
    gamma: f32,
}

impl SignalParams {
    const NEUTRAL: SignalParams = SignalParams {
        hue: 0.0,
        saturation: 1.0,
        contrast: 1.0,
        brightness: 0.0,
        gamma: 1.0,
    };
}

// Composite output voltages per luma level, relative to sync
const LEVELS_LOW: [f32; 4] = [0.350, 0.518, 0.962, 1.550];
const LEVELS_HIGH: [f32; 4] = [1.094, 1.506, 1.962, 1.962];
const BLACK: f32 = 0.518;
const WHITE: f32 = 1.962;

/// Generate a palette by decoding the PPU's square-wave composite signal
///
/// Each color index selects a luma level (bits 4-5) and a chroma phase
/// (bits 0-3). The signal is sampled over the 12 chroma phases and
/// demodulated to YIQ, then converted to RGB.
fn generate(params: &SignalParams) -> [u32; PALETTE_SIZE] {
    let mut out = [0u32; PALETTE_SIZE];

    for (index, entry) in out.iter_mut().enumerate() {
        let level = index >> 4;
        let hue = index & 0x0F;

        // $xE and $xF are forced black
        if hue >= 0x0E {
            continue;
        }

        let (low, high) = match hue {
            0x00 => (LEVELS_HIGH[level], LEVELS_HIGH[level]),
            0x0D => (LEVELS_LOW[level], LEVELS_LOW[level]),
            _ => (LEVELS_LOW[level], LEVELS_HIGH[level]),
        };

        let (mut y, mut i, mut q) = (0.0f32, 0.0f32, 0.0f32);
        for phase in 0..12 {
            let in_color = (hue + phase) % 12 < 6;
            let voltage = if in_color { high } else { low };
            let v = (voltage - BLACK) / (WHITE - BLACK);
            let angle = PI * (phase as f32 + params.hue) / 6.0;
            y += v;
            i += v * angle.cos();
            q += v * angle.sin();
        }
        y = y / 12.0 * params.contrast + params.brightness;
        i = i / 12.0 * params.saturation;
        q = q / 12.0 * params.saturation;

        let r = y + 0.946_882 * i + 0.623_557 * q;
        let g = y - 0.274_788 * i - 0.635_691 * q;
        let b = y - 1.108_545 * i + 1.709_007 * q;

        let to_byte = |c: f32| -> u32 {
            let c = c.clamp(0.0, 1.0).powf(1.0 / params.gamma);
            (c * 255.0).round() as u32
        };
        *entry = (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b);
    }

    out
}

/// Pack a 0xRRGGBB color into RGB565
#[inline]
pub fn rgb_to_565(rgb: u32) -> u16 {
    let r = ((rgb >> 16) & 0xFF) as u16;
    let g = ((rgb >> 8) & 0xFF) as u16;
    let b = (rgb & 0xFF) as u16;
    ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)
}

/// Expand a byte-swapped RGB565 table entry into RGBA bytes
#[inline]
pub fn swapped_565_to_rgba(value: u16) -> [u8; 4] {
    let c = value.swap_bytes();
    let r = ((c >> 11) & 0x1F) as u8;
    let g = ((c >> 5) & 0x3F) as u8;
    let b = (c & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 0xFF]
}

/// Display color table
///
/// 64 packed RGB565 colors in big-endian byte order, built wholesale from a
/// [`PaletteKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteTable {
    colors: [u16; PALETTE_SIZE],
    source: PaletteKind,
}

impl PaletteTable {
    /// Build the table for `kind`
    pub fn build(kind: PaletteKind) -> Self {
        let rgb = kind.rgb();
        let mut colors = [0u16; PALETTE_SIZE];
        for (dst, &src) in colors.iter_mut().zip(rgb.iter()) {
            *dst = rgb_to_565(src).swap_bytes();
        }
        Self {
            colors,
            source: kind,
        }
    }

    /// Palette this table was built from
    pub fn source(&self) -> PaletteKind {
        self.source
    }

    /// All packed colors
    pub fn colors(&self) -> &[u16; PALETTE_SIZE] {
        &self.colors
    }

    /// Packed color for a pixel value (masked to 0-63)
    #[inline]
    pub fn color(&self, pixel: u8) -> u16 {
        self.colors[(pixel & PIXEL_MASK) as usize]
    }

    /// RGBA bytes for a pixel value
    #[inline]
    pub fn rgba(&self, pixel: u8) -> [u8; 4] {
        swapped_565_to_rgba(self.color(pixel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_size() {
        assert_eq!(NES_PALETTE.len(), 64);
        assert_eq!(PaletteTable::build(PaletteKind::Default).colors().len(), 64);
    }

    #[test]
    fn test_default_table_is_byte_swapped_565() {
        let table = PaletteTable::build(PaletteKind::Default);
        // 0x666666 -> 0x632C in RGB565, stored big-endian
        assert_eq!(table.color(0x00), 0x2C63);
        // 0xFFFEFF -> 0xFFFF either way
        assert_eq!(table.color(0x30), 0xFFFF);
        // Black stays black
        assert_eq!(table.color(0x0F), 0x0000);
    }

    #[test]
    fn test_lookup_masks_pixel_value() {
        let table = PaletteTable::build(PaletteKind::Default);
        assert_eq!(table.color(0x40), table.color(0x00));
        assert_eq!(table.color(0xFF), table.color(0x3F));
    }

    #[test]
    fn test_rgba_round_trip_of_white_and_gray() {
        let table = PaletteTable::build(PaletteKind::Default);
        assert_eq!(table.rgba(0x30), [0xFF, 0xFF, 0xFF, 0xFF]);
        let gray = table.rgba(0x00);
        assert!((gray[0] as i32 - 0x66).abs() <= 4);
        assert_eq!(gray[3], 0xFF);
    }

    #[test]
    fn test_generated_palettes() {
        for kind in PaletteKind::ALL {
            let rgb = kind.rgb();
            // Unused columns are black in every palette
            assert_eq!(rgb[0x0E], 0);
            assert_eq!(rgb[0x3F], 0);
            // Light gray is brighter than dark gray
            assert!((rgb[0x30] & 0xFF) > (rgb[0x00] & 0xFF), "{:?}", kind);
        }
        assert_ne!(PaletteKind::Ntsc.rgb(), PaletteKind::Smooth.rgb());
        assert_ne!(PaletteKind::Composite.rgb(), NES_PALETTE);
    }

    #[test]
    fn test_navigation_wraps() {
        assert_eq!(PaletteKind::Default.prev(), PaletteKind::Smooth);
        assert_eq!(PaletteKind::Smooth.next(), PaletteKind::Default);
        assert_eq!(PaletteKind::Default.next(), PaletteKind::Composite);
        assert_eq!(PaletteKind::from_index(-1), PaletteKind::Default);
        assert_eq!(PaletteKind::from_index(5), PaletteKind::Smooth);
        assert_eq!(PaletteKind::from_index(6), PaletteKind::Default);
    }

    #[test]
    fn test_build_remembers_source() {
        let table = PaletteTable::build(PaletteKind::Pvm);
        assert_eq!(table.source(), PaletteKind::Pvm);
        assert_eq!(PaletteKind::Pvm.label(), "PVM");
    }
}
