//! Render Loop
//!
//! Drives one overlay frame per iteration: drain OS messages, check the exit
//! signal, advance the pacer, declare the GUI, clear, paint and present.
//! The vsync-gated present is the only throttle.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::context::{ExitSignal, ScreenSize};
use crate::pacer::FramePacer;
use crate::presentation::{GraphicsChain, PresentationSurface};
use crate::ui::{GuiFrame, OverlayUi};

/// Result of draining the OS message queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    Continue,
    /// A quit message was seen; the drain still ran to completion.
    Quit,
}

/// Non-blocking source of OS messages for the overlay thread.
pub trait MessagePump {
    /// Translate and dispatch every pending message.
    fn drain(&mut self) -> PumpStatus;
}

/// Turns finalized GUI draw data into GPU work on the bound render target.
pub trait GuiPainter {
    fn paint(&mut self, frame: &GuiFrame);
}

/// Why the loop stopped. Both are clean exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    QuitMessage,
    ExitRequested,
}

pub struct RenderLoop<P, G, R>
where
    P: MessagePump,
    G: GraphicsChain,
    R: GuiPainter,
{
    // Field order is drop order: GUI first, then the surface it draws into.
    painter: R,
    ui: OverlayUi,
    surface: PresentationSurface<G>,
    pump: P,
    pacer: FramePacer,
    exit: ExitSignal,
    screen: ScreenSize,
    frames_presented: u64,
}

impl<P, G, R> RenderLoop<P, G, R>
where
    P: MessagePump,
    G: GraphicsChain,
    R: GuiPainter,
{
    pub fn new(
        pump: P,
        surface: PresentationSurface<G>,
        ui: OverlayUi,
        painter: R,
        exit: ExitSignal,
        measurement_window: Duration,
    ) -> Self {
        let screen = surface.dimensions();
        Self {
            painter,
            ui,
            surface,
            pump,
            pacer: FramePacer::new(Instant::now(), measurement_window),
            exit,
            screen,
            frames_presented: 0,
        }
    }

    /// Run until a quit message arrives or the exit signal is raised.
    pub fn run(&mut self) -> LoopExit {
        info!("Entering render loop...");

        let reason = loop {
            if self.exit.is_raised() {
                break LoopExit::ExitRequested;
            }
            if let Some(reason) = self.step() {
                break reason;
            }
        };

        info!(
            "Render loop finished: {:?} after {} frames",
            reason, self.frames_presented
        );
        reason
    }

    /// One full iteration. Returns `Some` when the loop must stop; in that
    /// case no rendering happened in this iteration.
    pub fn step(&mut self) -> Option<LoopExit> {
        if self.pump.drain() == PumpStatus::Quit {
            debug!("Quit message received");
            return Some(LoopExit::QuitMessage);
        }
        if self.exit.is_raised() {
            return Some(LoopExit::ExitRequested);
        }

        self.pacer.tick();

        let frame = self.ui.build_frame(
            self.pacer.display_text(),
            self.screen,
            self.pacer.frame_delta().as_secs_f32(),
        );

        self.surface.begin_frame();
        self.painter.paint(&frame);
        self.surface.present();
        self.frames_presented += 1;

        None
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn surface(&self) -> &PresentationSurface<G> {
        &self.surface
    }

    pub fn pump_mut(&mut self) -> &mut P {
        &mut self.pump
    }

    pub fn painter(&self) -> &R {
        &self.painter
    }
}
