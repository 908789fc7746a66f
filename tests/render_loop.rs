use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use fps_overlay::gesture::{ClickEvent, ClickOutcome};
use fps_overlay::pacer::FPS_PLACEHOLDER;
use fps_overlay::presentation::{FeatureLevel, GraphicsChain, PresentationSurface};
use fps_overlay::render_loop::{GuiPainter, LoopExit, MessagePump, PumpStatus, RenderLoop};
use fps_overlay::route;
use fps_overlay::ui::{GuiFrame, OverlayStyle, OverlayUi};
use fps_overlay::{ExitSignal, ScreenSize};
use serial_test::serial;

type Log = Rc<RefCell<Vec<String>>>;

/// What the fake OS queue delivers on one drain.
enum Script {
    Idle,
    Quit,
    /// Escape key seen by the window procedure.
    Escape,
    /// Primary button down seen by the mouse hook.
    Click(u32),
}

struct ScriptedPump {
    script: VecDeque<Script>,
    exit: ExitSignal,
    drains: usize,
    swallowed: usize,
}

impl ScriptedPump {
    fn new(exit: &ExitSignal, script: Vec<Script>) -> Self {
        Self {
            script: script.into(),
            exit: exit.clone(),
            drains: 0,
            swallowed: 0,
        }
    }
}

impl MessagePump for ScriptedPump {
    fn drain(&mut self) -> PumpStatus {
        self.drains += 1;
        match self.script.pop_front() {
            Some(Script::Idle) => PumpStatus::Continue,
            Some(Script::Quit) => PumpStatus::Quit,
            Some(Script::Escape) => {
                route::request_exit();
                PumpStatus::Continue
            }
            Some(Script::Click(timestamp_ms)) => {
                if route::primary_click(ClickEvent { timestamp_ms }) == ClickOutcome::Terminate {
                    self.swallowed += 1;
                }
                PumpStatus::Continue
            }
            // Script exhausted: stop the loop so a broken test cannot hang.
            None => {
                self.exit.raise();
                PumpStatus::Continue
            }
        }
    }
}

struct FakeChain {
    log: Log,
    presents: Rc<RefCell<u32>>,
}

impl GraphicsChain for FakeChain {
    fn feature_level(&self) -> FeatureLevel {
        FeatureLevel::Level11_0
    }

    fn begin_frame(&mut self, _color: [f32; 4]) {
        self.log.borrow_mut().push("clear".into());
    }

    fn present(&mut self, _sync_interval: u32) -> anyhow::Result<()> {
        *self.presents.borrow_mut() += 1;
        self.log.borrow_mut().push("present".into());
        Ok(())
    }

    fn release(self) {
        let mut log = self.log.borrow_mut();
        for handle in ["render_target_view", "swap_chain", "context", "device"] {
            log.push(format!("release {handle}"));
        }
    }
}

struct RecordingPainter {
    log: Log,
    fps_texts_seen: usize,
    frames: usize,
}

impl GuiPainter for RecordingPainter {
    fn paint(&mut self, frame: &GuiFrame) {
        self.frames += 1;
        if frame.layout.fps.width() > 0.0 {
            self.fps_texts_seen += 1;
        }
        self.log.borrow_mut().push("paint".into());
    }
}

impl Drop for RecordingPainter {
    fn drop(&mut self) {
        self.log.borrow_mut().push("painter dropped".into());
    }
}

struct Harness {
    log: Log,
    presents: Rc<RefCell<u32>>,
    exit: ExitSignal,
}

impl Harness {
    fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            presents: Rc::new(RefCell::new(0)),
            exit: ExitSignal::new(),
        }
    }

    fn build(&self, script: Vec<Script>) -> RenderLoop<ScriptedPump, FakeChain, RecordingPainter> {
        let log = self.log.clone();
        let presents = self.presents.clone();
        let surface = PresentationSurface::initialize(ScreenSize::new(1920, 1080), 1, |_| {
            Ok(FakeChain { log, presents })
        })
        .unwrap();

        RenderLoop::new(
            ScriptedPump::new(&self.exit, script),
            surface,
            OverlayUi::new("discord.gg/rankuen", OverlayStyle::default()),
            RecordingPainter {
                log: self.log.clone(),
                fps_texts_seen: 0,
                frames: 0,
            },
            self.exit.clone(),
            Duration::from_millis(1000),
        )
    }

    fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

#[test]
#[serial]
fn escape_exits_cleanly_and_releases_in_reverse_order() {
    let harness = Harness::new();
    let _route = route::attach(harness.exit.clone(), Duration::from_millis(500));

    let mut overlay = harness.build(vec![Script::Idle, Script::Idle, Script::Escape]);
    assert_eq!(overlay.run(), LoopExit::ExitRequested);
    assert_eq!(overlay.frames_presented(), 2);
    assert_eq!(overlay.pump_mut().drains, 3);
    drop(overlay);

    let entries = harness.entries();
    assert_eq!(*harness.presents.borrow(), 2);
    assert_eq!(
        &entries[entries.len() - 5..],
        &[
            "painter dropped",
            "release render_target_view",
            "release swap_chain",
            "release context",
            "release device",
        ]
    );
}

#[test]
fn quit_message_stops_without_rendering() {
    let harness = Harness::new();
    let mut overlay = harness.build(vec![Script::Idle, Script::Quit, Script::Idle]);

    assert_eq!(overlay.run(), LoopExit::QuitMessage);
    assert_eq!(overlay.frames_presented(), 1);
    assert_eq!(overlay.painter().frames, 1);
    assert!(!harness.exit.is_raised());
}

#[test]
fn exit_raised_during_drain_skips_the_frame() {
    let harness = Harness::new();
    let mut overlay = harness.build(Vec::new());

    assert_eq!(overlay.step(), Some(LoopExit::ExitRequested));
    assert_eq!(overlay.frames_presented(), 0);
    assert!(harness.entries().is_empty());
}

#[test]
fn exit_raised_before_run_never_drains() {
    let harness = Harness::new();
    harness.exit.raise();
    let mut overlay = harness.build(vec![Script::Idle]);

    assert_eq!(overlay.run(), LoopExit::ExitRequested);
    assert_eq!(overlay.pump_mut().drains, 0);
    assert_eq!(overlay.frames_presented(), 0);
}

#[test]
#[serial]
fn double_click_terminates_on_next_iteration() {
    let harness = Harness::new();
    let _route = route::attach(harness.exit.clone(), Duration::from_millis(500));

    let mut overlay = harness.build(vec![
        Script::Idle,
        Script::Click(10_000),
        Script::Idle,
        Script::Click(10_100),
        Script::Idle,
    ]);

    assert_eq!(overlay.run(), LoopExit::ExitRequested);
    // The second click raised the signal inside the drain, so its frame is skipped.
    assert_eq!(overlay.frames_presented(), 3);
    assert_eq!(overlay.pump_mut().swallowed, 1);
    assert!(overlay.surface().is_live());
}

#[test]
#[serial]
fn slow_clicks_do_not_terminate() {
    let harness = Harness::new();
    let _route = route::attach(harness.exit.clone(), Duration::from_millis(500));

    let mut overlay = harness.build(vec![
        Script::Click(1_000),
        Script::Click(1_600),
        Script::Click(2_200),
        Script::Quit,
    ]);

    assert_eq!(overlay.run(), LoopExit::QuitMessage);
    assert_eq!(overlay.frames_presented(), 3);
    assert_eq!(overlay.pump_mut().swallowed, 0);
    assert!(!harness.exit.is_raised());
}

#[test]
fn every_frame_is_cleared_painted_then_presented() {
    let harness = Harness::new();
    let mut overlay = harness.build(vec![Script::Idle, Script::Idle, Script::Quit]);
    overlay.run();

    assert_eq!(
        harness.entries(),
        ["clear", "paint", "present", "clear", "paint", "present"]
    );
    assert_eq!(overlay.painter().fps_texts_seen, 2);
}

#[test]
fn readout_shows_placeholder_before_first_window() {
    let harness = Harness::new();
    let mut overlay = harness.build(vec![Script::Idle, Script::Quit]);
    overlay.run();

    assert!(!overlay.pacer().is_measured());
    assert_eq!(overlay.pacer().display_text(), FPS_PLACEHOLDER);
    assert_eq!(overlay.pacer().pending_frames(), 1);
}
