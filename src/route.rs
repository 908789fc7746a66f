//! Process-wide input route
//!
//! Low-level hook procedures and window procedures are free functions with no
//! user pointer, so the state they touch is reached through this one accessor.
//! The route is attached before the window and the hook exist and detached
//! after both are gone.

use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::context::ExitSignal;
use crate::gesture::{ClickEvent, ClickOutcome, ClickTracker};

struct InputRoute {
    exit: ExitSignal,
    clicks: ClickTracker,
}

static ROUTE: Lazy<Mutex<Option<InputRoute>>> = Lazy::new(|| Mutex::new(None));

/// Keeps the route attached; detaches it on drop.
#[derive(Debug)]
pub struct RouteGuard {
    _private: (),
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        if let Ok(mut route) = ROUTE.lock() {
            *route = None;
        }
        debug!("Input route detached");
    }
}

pub fn attach(exit: ExitSignal, gesture_timeout: Duration) -> RouteGuard {
    match ROUTE.lock() {
        Ok(mut route) => {
            if route.is_some() {
                warn!("Input route was already attached; replacing it");
            }
            *route = Some(InputRoute {
                exit,
                clicks: ClickTracker::new(gesture_timeout),
            });
        }
        Err(e) => warn!("Input route lock poisoned: {}", e),
    }
    debug!("Input route attached");
    RouteGuard { _private: () }
}

/// Feed a primary click to the gesture tracker. Without a route every click
/// passes through.
pub fn primary_click(event: ClickEvent) -> ClickOutcome {
    let Ok(mut guard) = ROUTE.lock() else {
        return ClickOutcome::PassThrough;
    };
    let Some(route) = guard.as_mut() else {
        return ClickOutcome::PassThrough;
    };

    let outcome = route.clicks.on_click(event);
    if outcome == ClickOutcome::Terminate {
        route.exit.raise();
    }
    outcome
}

/// Raise the exit signal from the window procedure.
pub fn request_exit() {
    if let Ok(guard) = ROUTE.lock() {
        if let Some(route) = guard.as_ref() {
            route.exit.raise();
        }
    }
}
