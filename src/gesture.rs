//! Gesture Detector Module
//!
//! Click bookkeeping behind the double-click exit gesture. The platform hook
//! turns every primary-button-down into a [`ClickEvent`] and asks the tracker
//! whether to let it through.

use std::time::Duration;

use tracing::{info, trace};

/// Default gap allowed between the two clicks of the exit gesture.
pub const DEFAULT_GESTURE_TIMEOUT: Duration = Duration::from_millis(500);

/// A primary-button-down, stamped with the OS tick count in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub timestamp_ms: u32,
}

/// What the hook should do with the click it just reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Hand the event to the next hook.
    PassThrough,
    /// Exit gesture completed; raise the exit signal and swallow the event.
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Armed,
}

/// Double-click recognizer.
///
/// A gap of exactly the timeout still counts as a double click. Tick counts
/// wrap after ~49.7 days, so gaps are computed with wrapping arithmetic.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    timeout_ms: u32,
    last_click_ms: u32,
    click_count: u32,
}

impl ClickTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
            last_click_ms: 0,
            click_count: 0,
        }
    }

    pub fn on_click(&mut self, event: ClickEvent) -> ClickOutcome {
        let gap = event.timestamp_ms.wrapping_sub(self.last_click_ms);
        if gap > self.timeout_ms {
            self.click_count = 0;
        }

        self.click_count += 1;
        self.last_click_ms = event.timestamp_ms;
        trace!(
            "Primary click at {} ms (gap {} ms, count {})",
            event.timestamp_ms,
            gap,
            self.click_count
        );

        if self.click_count >= 2 {
            self.click_count = 0;
            info!("Double click detected, requesting exit");
            return ClickOutcome::Terminate;
        }

        ClickOutcome::PassThrough
    }

    pub fn state(&self) -> GestureState {
        if self.click_count == 0 {
            GestureState::Idle
        } else {
            GestureState::Armed
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(DEFAULT_GESTURE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(tracker: &mut ClickTracker, timestamp_ms: u32) -> ClickOutcome {
        tracker.on_click(ClickEvent { timestamp_ms })
    }

    /// Feed a sequence and report the indices of terminating clicks.
    fn terminations(timestamps: &[u32]) -> Vec<usize> {
        let mut tracker = ClickTracker::default();
        let mut fired = Vec::new();
        for (i, &t) in timestamps.iter().enumerate() {
            if click(&mut tracker, t) == ClickOutcome::Terminate {
                fired.push(i);
            }
        }
        fired
    }

    #[test]
    fn single_click_arms_only() {
        let mut tracker = ClickTracker::default();
        assert_eq!(tracker.state(), GestureState::Idle);
        assert_eq!(click(&mut tracker, 10_000), ClickOutcome::PassThrough);
        assert_eq!(tracker.state(), GestureState::Armed);
    }

    #[test]
    fn two_quick_clicks_terminate_and_reset() {
        let mut tracker = ClickTracker::default();
        click(&mut tracker, 10_000);
        assert_eq!(click(&mut tracker, 10_100), ClickOutcome::Terminate);
        assert_eq!(tracker.state(), GestureState::Idle);
    }

    #[test]
    fn slow_second_click_rearms_with_count_one() {
        let mut tracker = ClickTracker::default();
        click(&mut tracker, 10_000);
        assert_eq!(click(&mut tracker, 10_501), ClickOutcome::PassThrough);
        assert_eq!(tracker.state(), GestureState::Armed);
        assert_eq!(click(&mut tracker, 10_700), ClickOutcome::Terminate);
    }

    #[test]
    fn gap_of_exactly_the_timeout_fires() {
        assert_eq!(terminations(&[10_000, 10_500]), vec![1]);
        assert!(terminations(&[10_000, 10_501]).is_empty());
    }

    #[test]
    fn rapid_run_fires_on_every_second_click() {
        assert_eq!(
            terminations(&[10_000, 10_100, 10_200, 10_300, 10_400]),
            vec![1, 3]
        );
    }

    #[test]
    fn spaced_clicks_never_fire() {
        assert!(terminations(&[10_000, 11_000, 12_000, 13_000]).is_empty());
    }

    #[test]
    fn fires_iff_a_fresh_pair_is_within_timeout() {
        let sequences: &[&[u32]] = &[
            &[10_000, 10_600, 10_900],
            &[10_000, 10_400],
            &[10_000, 11_000, 11_200, 12_000],
            &[10_000, 10_501, 11_002, 11_503],
            &[10_000, 10_250, 10_600, 11_200, 11_300],
        ];

        for timestamps in sequences {
            // Reference model: walk pairs, a pair fires when it is quick and
            // its first click did not itself complete a gesture.
            let mut expected = Vec::new();
            let mut armed = false;
            let mut previous: Option<u32> = None;
            for (i, &t) in timestamps.iter().enumerate() {
                let quick = previous.is_some_and(|p| t - p <= 500);
                if armed && quick {
                    expected.push(i);
                    armed = false;
                } else {
                    armed = true;
                }
                previous = Some(t);
            }

            assert_eq!(terminations(timestamps), expected, "{timestamps:?}");
        }
    }

    #[test]
    fn tick_count_wraparound_is_a_short_gap() {
        let mut tracker = ClickTracker::default();
        click(&mut tracker, u32::MAX - 100);
        assert_eq!(click(&mut tracker, 150), ClickOutcome::Terminate);
    }

    #[test]
    fn custom_timeout() {
        let mut tracker = ClickTracker::new(Duration::from_millis(200));
        assert_eq!(tracker.timeout(), Duration::from_millis(200));
        click(&mut tracker, 10_000);
        assert_eq!(click(&mut tracker, 10_300), ClickOutcome::PassThrough);
        assert_eq!(click(&mut tracker, 10_450), ClickOutcome::Terminate);
    }
}
