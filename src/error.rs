//! Error Module
//!
//! Startup failures of the overlay. Every variant is fatal: it is reported
//! once through a blocking dialog and the process exits with code 1.

use std::fmt::Display;

use thiserror::Error;

/// Process exit code used for every startup failure.
pub const FAILURE_EXIT_CODE: u8 = 1;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("window creation failed: {0}")]
    WindowCreation(String),

    #[error("mouse hook installation failed: {0}")]
    HookInstall(String),

    #[error("graphics device or swap chain creation failed: {0}")]
    SurfaceInit(String),

    #[error("back buffer or render target view unavailable: {0}")]
    BackBuffer(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(&'static str),
}

impl OverlayError {
    pub fn window_creation(err: impl Display) -> Self {
        Self::WindowCreation(err.to_string())
    }

    pub fn hook_install(err: impl Display) -> Self {
        Self::HookInstall(err.to_string())
    }

    pub fn surface_init(err: impl Display) -> Self {
        Self::SurfaceInit(err.to_string())
    }

    pub fn back_buffer(err: impl Display) -> Self {
        Self::BackBuffer(err.to_string())
    }

    /// Text shown in the error dialog.
    pub fn dialog_text(&self) -> &'static str {
        match self {
            Self::WindowCreation(_) => "Error creating window!",
            Self::HookInstall(_) => "Error installing mouse hook!",
            Self::SurfaceInit(_) => "Error initializing DirectX!",
            Self::BackBuffer(_) => "Back buffer error!",
            Self::UnsupportedPlatform(_) => "This overlay only runs on Windows!",
        }
    }

    pub fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}

pub type OverlayResult<T> = std::result::Result<T, OverlayError>;
