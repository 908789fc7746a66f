//! Startup and shutdown sequencing
//!
//! Resources are created in dependency order (input route, window, hook,
//! presentation surface, GUI) and dropped in reverse when `run` returns,
//! on success and on every early error return alike.

use crate::config::Config;
use crate::context::ExitSignal;
use crate::error::OverlayResult;
use crate::render_loop::LoopExit;

/// Bring the overlay up, run it to completion and tear it down.
#[cfg(windows)]
pub fn run(config: &Config, exit: ExitSignal) -> OverlayResult<LoopExit> {
    use tracing::info;

    use crate::error::OverlayError;
    use crate::presentation::PresentationSurface;
    use crate::render_loop::RenderLoop;
    use crate::route;
    use crate::ui::{OverlayStyle, OverlayUi};
    use crate::win32::{self, D3d11Chain, D3d11Painter, MouseHook, OverlayWindow, Win32Pump};

    win32::set_normal_priority();

    let screen = win32::primary_screen_size();
    let _route = route::attach(exit.clone(), config.gesture_timeout());
    let window = OverlayWindow::create(screen)?;
    let _hook = MouseHook::install()?;

    let hwnd = window.hwnd();
    let surface = PresentationSurface::initialize(screen, config.sync_interval, |size| {
        D3d11Chain::create(hwnd, size)
    })?;

    let chain = surface
        .chain()
        .ok_or_else(|| OverlayError::surface_init("presentation chain missing"))?;
    let painter = D3d11Painter::new(chain.device(), chain.context())?;
    let ui = OverlayUi::new(
        config.label.clone(),
        OverlayStyle {
            font_size: config.font_size,
            ..OverlayStyle::default()
        },
    );

    window.show();

    let mut overlay = RenderLoop::new(
        Win32Pump,
        surface,
        ui,
        painter,
        exit.clone(),
        config.measurement_window(),
    );
    let reason = overlay.run();

    if exit.is_raised() {
        info!("Exit signal set, tearing down");
    }
    info!("Shutting down overlay");
    Ok(reason)
}

#[cfg(not(windows))]
pub fn run(_config: &Config, _exit: ExitSignal) -> OverlayResult<LoopExit> {
    Err(crate::error::OverlayError::UnsupportedPlatform(
        std::env::consts::OS,
    ))
}

/// Show the blocking error dialog for a startup failure.
pub fn report_startup_error(err: &crate::error::OverlayError) {
    tracing::error!("{}: {}", err.dialog_text(), err);

    #[cfg(windows)]
    crate::win32::dialog::show_error(err);
}
