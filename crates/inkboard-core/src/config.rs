//! Editor tuning knobs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tolerances are in screen pixels and are divided by the camera zoom before
/// being applied in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Minimum pointer travel before a line drag creates a path.
    pub drag_threshold: f64,
    pub placeholder_tolerance: f64,
    pub handle_tolerance: f64,
    pub segment_tolerance: f64,
    pub stroke_tolerance: f64,
    pub double_click_ms: u64,
    pub min_resize_width: f64,
    pub min_font_size: f64,
    pub max_font_size: f64,
    pub history_limit: usize,
    pub autosave_interval_secs: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
            placeholder_tolerance: 2.0,
            handle_tolerance: 10.0,
            segment_tolerance: 14.0,
            stroke_tolerance: 5.0,
            double_click_ms: 500,
            min_resize_width: 50.0,
            min_font_size: 12.0,
            max_font_size: 72.0,
            history_limit: 50,
            autosave_interval_secs: 30,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_font_size <= 0.0 || self.min_font_size > self.max_font_size {
            return Err(ConfigError::Invalid(format!(
                "font size range {}..{} is empty",
                self.min_font_size, self.max_font_size
            )));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be positive".into()));
        }
        Ok(())
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}
