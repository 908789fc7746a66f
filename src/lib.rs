//! Full-screen, topmost overlay with a live FPS readout.
//!
//! The overlay is dismissed by Escape or by a double primary click anywhere on
//! screen. Platform-independent pieces (pacing, gesture recognition, surface
//! lifecycle, GUI frame construction, the render loop itself) live at the
//! crate root; the Windows backend lives in [`win32`].

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod gesture;
pub mod logging;
pub mod pacer;
pub mod presentation;
pub mod render_loop;
pub mod route;
pub mod ui;

#[cfg(windows)]
pub mod win32;

pub use context::{ExitSignal, ScreenSize};
pub use error::{OverlayError, OverlayResult};
