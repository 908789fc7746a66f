//! Configuration Module
//!
//! Tunables for the overlay. Defaults reproduce the fixed constants of the
//! overlay exactly; a TOML file is only read when `OVERLAY_CONFIG` names one.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::presentation::SYNC_INTERVAL_RANGE;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV_VAR: &str = "OVERLAY_CONFIG";

/// Overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum gap between two primary clicks that still counts as a double click
    #[serde(default = "default_gesture_timeout_ms")]
    pub gesture_timeout_ms: u32,

    /// Length of one FPS measurement window
    #[serde(default = "default_measurement_window_ms")]
    pub measurement_window_ms: u64,

    /// Vertical blanks to wait per present (1 = vsync)
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u32,

    /// Static label drawn centered near the top of the screen
    #[serde(default = "default_label")]
    pub label: String,

    /// Font size of both captions, in points
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_gesture_timeout_ms() -> u32 {
    500
}

fn default_measurement_window_ms() -> u64 {
    1000
}

fn default_sync_interval() -> u32 {
    1
}

fn default_label() -> String {
    "discord.gg/rankuen".to_string()
}

fn default_font_size() -> f32 {
    13.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gesture_timeout_ms: default_gesture_timeout_ms(),
            measurement_window_ms: default_measurement_window_ms(),
            sync_interval: default_sync_interval(),
            label: default_label(),
            font_size: default_font_size(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would disable the vsync throttle or break the
    /// FPS measurement.
    pub fn validate(&self) -> Result<()> {
        if !SYNC_INTERVAL_RANGE.contains(&self.sync_interval) {
            bail!(
                "sync_interval must be within {}..={}, got {}",
                SYNC_INTERVAL_RANGE.start(),
                SYNC_INTERVAL_RANGE.end(),
                self.sync_interval
            );
        }
        if self.measurement_window_ms == 0 {
            bail!("measurement_window_ms must be at least 1");
        }
        if self.gesture_timeout_ms == 0 {
            bail!("gesture_timeout_ms must be at least 1");
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            bail!("font_size must be a positive number, got {}", self.font_size);
        }
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults, or the file named by `OVERLAY_CONFIG` when it is set.
    ///
    /// An unreadable or malformed file is not fatal; the defaults are used.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", Path::new(&path).display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring config file {}: {:#}",
                    Path::new(&path).display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn gesture_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.gesture_timeout_ms))
    }

    pub fn measurement_window(&self) -> Duration {
        Duration::from_millis(self.measurement_window_ms)
    }
}
