//! Frame Pacer Module
//!
//! Counts frames and turns them into a frames-per-second readout once per
//! measurement window. The value is for display only; pacing comes from the
//! vsync-gated present.

use std::fmt::{self, Write};
use std::time::{Duration, Instant};

use tracing::debug;

/// Readout shown until the first measurement window completes.
pub const FPS_PLACEHOLDER: &str = "FPS: ...";

/// Capacity of the FPS readout buffer, in bytes.
pub const FPS_TEXT_CAPACITY: usize = 64;

/// Shortest measurement window; a zero window would divide by zero.
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Fixed-capacity text buffer holding the FPS readout.
///
/// `rewrite` is the only way to change the contents. A write that does not
/// fit is dropped whole, so the buffer never holds a split UTF-8 sequence.
#[derive(Clone)]
pub struct FpsText {
    buf: [u8; FPS_TEXT_CAPACITY],
    len: usize,
}

impl FpsText {
    pub fn placeholder() -> Self {
        let mut text = Self {
            buf: [0; FPS_TEXT_CAPACITY],
            len: 0,
        };
        text.rewrite(format_args!("{FPS_PLACEHOLDER}"));
        text
    }

    /// Replace the contents with `args`. If the formatted text does not fit,
    /// the previous contents are kept unchanged.
    pub fn rewrite(&mut self, args: fmt::Arguments<'_>) {
        let mut scratch = Self {
            buf: [0; FPS_TEXT_CAPACITY],
            len: 0,
        };
        if scratch.write_fmt(args).is_ok() {
            *self = scratch;
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or(FPS_PLACEHOLDER)
    }
}

impl Write for FpsText {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > FPS_TEXT_CAPACITY {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

impl fmt::Debug for FpsText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FpsText").field(&self.as_str()).finish()
    }
}

impl Default for FpsText {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Per-window frame counter.
#[derive(Debug)]
pub struct FramePacer {
    window: Duration,
    frame_count: u32,
    last_measurement: Instant,
    last_frame: Instant,
    frame_delta: Duration,
    fps: f32,
    measured: bool,
    text: FpsText,
}

impl FramePacer {
    pub fn new(start: Instant, window: Duration) -> Self {
        Self {
            window: window.max(MIN_WINDOW),
            frame_count: 0,
            last_measurement: start,
            last_frame: start,
            frame_delta: Duration::ZERO,
            fps: 0.0,
            measured: false,
            text: FpsText::placeholder(),
        }
    }

    /// Record one frame at the current instant.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// Record one frame at `now`. Returns `true` when this frame closed a
    /// measurement window and the readout was refreshed.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        self.frame_delta = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;

        // Whole milliseconds, like the readout's own resolution.
        let elapsed_ms = now.saturating_duration_since(self.last_measurement).as_millis();
        if elapsed_ms < self.window.as_millis() {
            return false;
        }

        let elapsed_secs = elapsed_ms as f32 / 1000.0;
        self.fps = self.frame_count as f32 / elapsed_secs;
        debug!(
            "FPS window closed: {} frames in {} ms -> {:.1}",
            self.frame_count, elapsed_ms, self.fps
        );

        self.frame_count = 0;
        self.last_measurement = now;
        self.measured = true;
        self.text.rewrite(format_args!("FPS: {:.1}", self.fps));
        true
    }

    /// Last measured frames per second, `None` before the first window.
    pub fn fps(&self) -> Option<f32> {
        self.measured.then_some(self.fps)
    }

    pub fn is_measured(&self) -> bool {
        self.measured
    }

    pub fn display_text(&self) -> &str {
        self.text.as_str()
    }

    /// Time between the two most recent ticks.
    pub fn frame_delta(&self) -> Duration {
        self.frame_delta
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Frames counted in the currently open window.
    pub fn pending_frames(&self) -> u32 {
        self.frame_count
    }
}
