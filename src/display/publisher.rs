// Display update publisher
//
// Compares the frame the core just rendered against the previously published
// one and tells the presentation sink how much of the picture changed. Only
// the changed rows/columns need to be pushed to a slow display, so a small
// sprite moving over a static background costs a fraction of a full redraw.

use super::framebuffer::{BufferId, CropRect, FramePool, FrameView};
use std::time::Duration;

/// Changed region, relative to the published crop rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// How much of the frame must be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Every pixel must be considered changed
    Full,
    /// Only the given region differs from the previous frame
    Partial(DirtyRect),
    /// Identical to the previous frame
    None,
}

impl UpdateKind {
    pub fn is_full(&self) -> bool {
        matches!(self, UpdateKind::Full)
    }
}

/// Per-frame record handed to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayUpdate {
    pub buffer: BufferId,
    pub rect: CropRect,
    pub kind: UpdateKind,
}

/// Consumer of published frames
pub trait PresentationSink {
    /// Present `frame`; `update.kind` says which part changed
    fn present(&mut self, frame: &FrameView<'_>, update: &DisplayUpdate);

    /// Block until every queued frame has reached the display
    ///
    /// Returns `false` when the sink cannot acknowledge, in which case the
    /// caller falls back to a fixed settle delay.
    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        false
    }
}

/// Sink that drops every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn present(&mut self, _frame: &FrameView<'_>, _update: &DisplayUpdate) {}

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        true
    }
}

/// Fraction of rows (numerator/denominator) above which a partial update is
/// promoted to a full one
const FULL_UPDATE_RATIO: (usize, usize) = (3, 4);

/// Publication counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub full: u64,
    pub partial: u64,
    pub unchanged: u64,
}

/// Diffs and publishes frames out of a [`FramePool`]
#[derive(Debug, Default)]
pub struct Publisher {
    /// Whether the previous buffer may be used as a diff baseline
    baseline_valid: bool,
    stats: PublishStats,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the diff baseline; the next publish is a full update
    pub fn invalidate(&mut self) {
        self.baseline_valid = false;
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Publish the pool's current buffer, cropped to `rect`, then rotate
    pub fn publish(
        &mut self,
        pool: &mut FramePool,
        rect: CropRect,
        sink: &mut dyn PresentationSink,
    ) -> UpdateKind {
        let kind = if self.baseline_valid {
            Self::diff(pool, rect)
        } else {
            UpdateKind::Full
        };

        match kind {
            UpdateKind::Full => self.stats.full += 1,
            UpdateKind::Partial(_) => self.stats.partial += 1,
            UpdateKind::None => self.stats.unchanged += 1,
        }

        let update = DisplayUpdate {
            buffer: pool.current_id(),
            rect,
            kind,
        };
        let view = FrameView {
            buffer: pool.current(),
            rect,
        };
        sink.present(&view, &update);

        pool.rotate(rect);
        self.baseline_valid = true;
        kind
    }

    /// Present the last published buffer again as a full update
    ///
    /// Does not rotate the pool. Returns `false` when nothing has been
    /// published yet.
    pub fn republish(&mut self, pool: &FramePool, sink: &mut dyn PresentationSink) -> bool {
        let (Some(id), Some((buffer, rect))) = (pool.previous_id(), pool.previous()) else {
            return false;
        };
        let update = DisplayUpdate {
            buffer: id,
            rect,
            kind: UpdateKind::Full,
        };
        sink.present(&FrameView { buffer, rect }, &update);
        self.stats.full += 1;
        true
    }

    fn diff(pool: &FramePool, rect: CropRect) -> UpdateKind {
        let Some((previous, previous_rect)) = pool.previous() else {
            return UpdateKind::Full;
        };
        if previous_rect != rect {
            return UpdateKind::Full;
        }

        let current = pool.current();
        let mask = current.pixel_mask();
        let mut rows: Option<(usize, usize)> = None;
        let mut left = rect.width;
        let mut right = 0;

        for y in 0..rect.height {
            let a = current.row(rect.y + y, rect.x, rect.width);
            let b = previous.row(rect.y + y, rect.x, rect.width);
            if a == b {
                continue;
            }
            let differs = |(p, q): (&u8, &u8)| (p & mask) != (q & mask);
            let Some(first) = a.iter().zip(b).position(differs) else {
                continue;
            };
            let last = a.iter().zip(b).rposition(differs).unwrap_or(first);

            left = left.min(first);
            right = right.max(last + 1);
            rows = Some(match rows {
                None => (y, y),
                Some((top, _)) => (top, y),
            });
        }

        let Some((top, bottom)) = rows else {
            return UpdateKind::None;
        };
        let height = bottom - top + 1;
        let (num, den) = FULL_UPDATE_RATIO;
        if height * den >= rect.height * num {
            return UpdateKind::Full;
        }

        UpdateKind::Partial(DirtyRect {
            x: left,
            y: top,
            width: right - left,
            height,
        })
    }
}
