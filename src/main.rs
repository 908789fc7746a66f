//! Overlay entry point
//!
//! Sets up logging and configuration, wires Ctrl+C to the exit signal and
//! maps the outcome to the process exit code.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::process::ExitCode;

use tracing::{info, warn};

use fps_overlay::app;
use fps_overlay::config::Config;
use fps_overlay::ExitSignal;

fn main() -> ExitCode {
    fps_overlay::logging::init();
    info!("Overlay starting...");

    let config = Config::from_env();
    info!("Configuration: {:?}", config);

    let exit = ExitSignal::new();

    let ctrlc_exit = exit.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        ctrlc_exit.raise();
    }) {
        warn!("Ctrl+C handler unavailable: {}", e);
    }

    match app::run(&config, exit) {
        Ok(reason) => {
            info!("Overlay exited cleanly ({:?})", reason);
            ExitCode::SUCCESS
        }
        Err(err) => {
            app::report_startup_error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}
