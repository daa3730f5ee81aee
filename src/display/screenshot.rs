// Screenshot functionality
//
// Saves the last presented frame (cropped, through its palette table) as a
// PNG file.

use super::framebuffer::FrameView;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during screenshot operations
#[derive(Debug, Error)]
pub enum ScreenshotError {
    /// Nothing has been presented yet
    #[error("no frame has been presented yet")]
    NoFrame,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PNG encoding error
    #[error("PNG encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),
}

/// Write `frame` to `path` as an RGB PNG
///
/// The image has the size of the frame's crop rectangle. Parent directories
/// are created as needed.
pub fn save_frame(frame: &FrameView<'_>, path: &Path) -> Result<(), ScreenshotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let rgb = frame.to_rgb();
    save_png(path, &rgb, frame.rect.width as u32, frame.rect.height as u32)
}

/// Timestamped screenshot path for the current ROM
///
/// Creates a layout like: `<base>/<rom_name>/screenshot_<timestamp>.png`
pub fn screenshot_path(base_dir: &Path, rom_path: Option<&Path>) -> PathBuf {
    let dir = match rom_path.and_then(|p| p.file_stem()) {
        Some(rom_name) => base_dir.join(rom_name),
        None => base_dir.join("default"),
    };
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("screenshot_{}.png", timestamp))
}

/// Save RGB data as a PNG file
fn save_png(path: &Path, data: &[u8], width: u32, height: u32) -> Result<(), ScreenshotError> {
    let file = fs::File::create(path)?;
    let w = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{CropRect, FrameBuffer, PaletteKind, PaletteTable};
    use std::sync::Arc;

    #[test]
    fn test_screenshot_path_uses_rom_name() {
        let path = screenshot_path(Path::new("shots"), Some(Path::new("roms/game.nes")));
        assert!(path.starts_with("shots/game"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

        let path = screenshot_path(Path::new("shots"), None);
        assert!(path.starts_with("shots/default"));
    }

    #[test]
    fn test_save_frame_writes_cropped_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("frame.png");
        let fb = FrameBuffer::new(Arc::new(PaletteTable::build(PaletteKind::Default)));
        let view = FrameView {
            buffer: &fb,
            rect: CropRect::inset(8, 8),
        };

        save_frame(&view, &path).unwrap();

        let decoder = png::Decoder::new(io::BufReader::new(fs::File::open(&path).unwrap()));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 240);
        assert_eq!(reader.info().height, 224);
    }
}
