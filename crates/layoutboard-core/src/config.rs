//! Tunable constants of the board engine.

use crate::view::{MAX_SCALE, MIN_SCALE, ViewTransform};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default interval between periodic snapshot pulls, in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;
/// Pointer travel (screen px, either axis) at which a press stops being a click.
pub const DEFAULT_CLICK_THRESHOLD: f64 = 5.0;
/// How long a search hit stays highlighted, in milliseconds.
pub const DEFAULT_HIGHLIGHT_MS: u64 = 2000;
/// Zoom factor of one wheel notch.
pub const DEFAULT_WHEEL_STEP: f64 = 1.1;
/// Zoom factor of the zoom buttons.
pub const DEFAULT_BUTTON_STEP: f64 = 1.2;

/// Configuration load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid board configuration: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub refresh_interval: Duration,
    pub click_threshold: f64,
    pub highlight_duration: Duration,
    pub min_scale: f64,
    pub max_scale: f64,
    pub wheel_step: f64,
    pub button_step: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            click_threshold: DEFAULT_CLICK_THRESHOLD,
            highlight_duration: Duration::from_millis(DEFAULT_HIGHLIGHT_MS),
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            wheel_step: DEFAULT_WHEEL_STEP,
            button_step: DEFAULT_BUTTON_STEP,
        }
    }
}

impl BoardConfig {
    /// Load a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Check the tunables and pull the zoom bounds into `[MIN_SCALE, MAX_SCALE]`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::Invalid("refresh_interval must be positive".into()));
        }
        if !(self.click_threshold.is_finite() && self.click_threshold >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "click_threshold {} must be a non-negative number",
                self.click_threshold
            )));
        }
        for (name, step) in [("wheel_step", self.wheel_step), ("button_step", self.button_step)] {
            if !(step.is_finite() && step > 1.0) {
                return Err(ConfigError::Invalid(format!("{name} {step} must be greater than 1")));
            }
        }
        if !(self.min_scale.is_finite() && self.max_scale.is_finite()) || self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid(format!(
                "zoom bounds {}..{} are not a valid range",
                self.min_scale, self.max_scale
            )));
        }
        self.min_scale = self.min_scale.clamp(MIN_SCALE, MAX_SCALE);
        self.max_scale = self.max_scale.clamp(MIN_SCALE, MAX_SCALE);
        Ok(self)
    }

    /// A view transform with this configuration's zoom bounds.
    pub fn view(&self) -> ViewTransform {
        ViewTransform::with_bounds(self.min_scale, self.max_scale)
    }
}
