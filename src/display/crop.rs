// Crop/overscan calculator
//
// Vertical crop hides the overscan rows when enabled. Horizontal crop hides
// the 8 pixel column many games leave garbage in, either always or when the
// core reports that the background is being drawn near the left edge.

use super::framebuffer::CropRect;
use crate::settings::CropMode;

/// Side crop width in pixels
pub const HORIZONTAL_CROP: usize = 8;

/// Left-edge background counter value above which `Auto` crops the sides
pub const AUTO_CROP_THRESHOLD: u32 = 210;

/// Weight of a new sample in the smoothed counter, as a shift (1/8)
const SMOOTHING_SHIFT: u32 = 3;

/// Per-frame crop calculation
#[derive(Debug, Clone, Default)]
pub struct CropCalculator {
    /// Smooth the Auto decision with a moving average
    smoothing: bool,

    /// Moving average of the counter, in 1/256 units
    average: Option<u32>,
}

impl CropCalculator {
    /// Calculator using the raw counter for `Auto`
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator that optionally averages the counter for `Auto`
    ///
    /// The raw threshold jitters on games whose left-edge activity hovers
    /// around the limit. Smoothing is opt-in because it changes which frames
    /// are cropped.
    pub fn with_smoothing(smoothing: bool) -> Self {
        Self {
            smoothing,
            average: None,
        }
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Vertical margin: the core's overscan when enabled, else 0
    pub fn vertical(overscan_enabled: bool, core_overscan: usize) -> usize {
        if overscan_enabled {
            core_overscan
        } else {
            0
        }
    }

    /// Horizontal margin for this frame
    pub fn horizontal(&mut self, mode: CropMode, left_bg_counter: u32) -> usize {
        let counter = self.observe(left_bg_counter);
        match mode {
            CropMode::Always => HORIZONTAL_CROP,
            CropMode::Auto if counter > AUTO_CROP_THRESHOLD => HORIZONTAL_CROP,
            _ => 0,
        }
    }

    /// Crop rectangle for this frame
    pub fn compute(
        &mut self,
        mode: CropMode,
        overscan_enabled: bool,
        core_overscan: usize,
        left_bg_counter: u32,
    ) -> CropRect {
        let h = self.horizontal(mode, left_bg_counter);
        let v = Self::vertical(overscan_enabled, core_overscan);
        CropRect::inset(h, v)
    }

    fn observe(&mut self, sample: u32) -> u32 {
        if !self.smoothing {
            return sample;
        }
        let scaled = sample << 8;
        let average = match self.average {
            None => scaled,
            Some(avg) => {
                let delta = scaled as i64 - avg as i64;
                (avg as i64 + (delta >> SMOOTHING_SHIFT)) as u32
            }
        };
        self.average = Some(average);
        average >> 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_follows_overscan_flag() {
        assert_eq!(CropCalculator::vertical(true, 8), 8);
        assert_eq!(CropCalculator::vertical(false, 8), 0);
    }

    #[test]
    fn test_always_and_never_ignore_counter() {
        let mut crop = CropCalculator::new();
        for counter in [0, 210, 211, 500] {
            assert_eq!(crop.horizontal(CropMode::Always, counter), 8);
            assert_eq!(crop.horizontal(CropMode::Never, counter), 0);
        }
    }

    #[test]
    fn test_auto_uses_strict_threshold() {
        let mut crop = CropCalculator::new();
        assert_eq!(crop.horizontal(CropMode::Auto, 210), 0);
        assert_eq!(crop.horizontal(CropMode::Auto, 211), 8);
        assert_eq!(crop.horizontal(CropMode::Auto, 0), 0);
    }

    #[test]
    fn test_compute_builds_rect() {
        let mut crop = CropCalculator::new();
        let rect = crop.compute(CropMode::Always, true, 8, 0);
        assert_eq!(rect, CropRect::inset(8, 8));
        let rect = crop.compute(CropMode::Never, false, 8, 0);
        assert_eq!(rect, CropRect::FULL);
    }

    #[test]
    fn test_smoothing_suppresses_single_frame_spike() {
        let mut crop = CropCalculator::with_smoothing(true);
        for _ in 0..32 {
            assert_eq!(crop.horizontal(CropMode::Auto, 100), 0);
        }
        // One frame over the threshold does not flip the decision
        assert_eq!(crop.horizontal(CropMode::Auto, 255), 0);

        // A sustained change eventually does
        let mut cropped = false;
        for _ in 0..64 {
            cropped = crop.horizontal(CropMode::Auto, 255) == 8;
        }
        assert!(cropped);
    }
}
