//! Shared overlay state
//!
//! The exit signal is the only value crossing execution contexts: the mouse
//! hook thread, the window procedure and the Ctrl+C handler raise it, the
//! render loop polls it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative termination flag.
///
/// Raising is a `Release` store and polling an `Acquire` load, so anything a
/// raiser wrote before raising is visible to the loop that observes it.
#[derive(Debug, Clone, Default)]
pub struct ExitSignal(Arc<AtomicBool>);

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Pixel dimensions of the overlay (the full primary screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width_f32(&self) -> f32 {
        self.width as f32
    }

    pub fn height_f32(&self) -> f32 {
        self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_one_flag() {
        let signal = ExitSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_raised());

        signal.raise();
        assert!(observer.is_raised());
    }

    #[test]
    fn raise_from_another_thread_is_observed() {
        let signal = ExitSignal::new();
        let raiser = signal.clone();

        thread::spawn(move || raiser.raise()).join().unwrap();

        assert!(signal.is_raised());
    }

    #[test]
    fn raising_twice_stays_raised() {
        let signal = ExitSignal::new();
        signal.raise();
        signal.raise();
        assert!(signal.is_raised());
    }
}
