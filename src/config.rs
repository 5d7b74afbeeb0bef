// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{
    DEFAULT_COOLDOWN, DEFAULT_QUEUE_DEPTH, DEFAULT_RECOGNITION_INTERVAL, DEFAULT_TICK_INTERVAL,
    MAX_DECODE_DIMENSION, MAX_RECOGNITION_INTERVAL, MIN_RECOGNITION_INTERVAL,
};
use crate::errors::ConfigError;
use crate::recognition::{ActionPolicy, PipelineSettings, SessionSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "qrscan";

/// File name of the persisted settings
const CONFIG_FILE_NAME: &str = "config.json";

/// User settings for the recognition pipeline
///
/// Missing fields fall back to their defaults, so older files keep loading
/// after new settings are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of pending recognition requests
    pub queue_depth: usize,
    /// Scheduler tick while requests are pending (ms)
    pub tick_interval_ms: u64,
    /// Camera polling cadence (ms); also drives the overlay timeout
    pub recognition_interval_ms: u64,
    /// Repeat-sighting window (ms)
    pub cooldown_ms: u64,
    /// Frames larger than this are downscaled before decoding
    pub max_decode_dimension: u32,
    /// Draw an overlay around new detections
    pub show_overlay: bool,
    /// Copy new detections to the clipboard
    pub auto_copy: bool,
    /// Open http(s) links from new detections in the browser
    pub auto_open_url: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            recognition_interval_ms: DEFAULT_RECOGNITION_INTERVAL.as_millis() as u64,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            max_decode_dimension: MAX_DECODE_DIMENSION,
            show_overlay: true,
            auto_copy: true,
            auto_open_url: false, // Opening links unprompted is opt-in
        }
    }
}

impl Config {
    /// Location of the settings file in the user's config directory
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load and validate settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load settings, falling back to defaults when the file does not exist
    ///
    /// With `path == None` the default location is used. A file that exists
    /// but is malformed is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Ok(path) => path,
                Err(_) => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        Self::load(&path)
    }

    /// Write settings as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_depth",
                reason: "must be at least 1".into(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be greater than 0".into(),
            });
        }

        let min = MIN_RECOGNITION_INTERVAL.as_millis() as u64;
        let max = MAX_RECOGNITION_INTERVAL.as_millis() as u64;
        if !(min..=max).contains(&self.recognition_interval_ms) {
            return Err(ConfigError::Invalid {
                field: "recognition_interval_ms",
                reason: format!("must be between {} and {}", min, max),
            });
        }
        if self.max_decode_dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "max_decode_dimension",
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn recognition_interval(&self) -> Duration {
        Duration::from_millis(self.recognition_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Queue and scheduler settings
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            queue_depth: self.queue_depth,
            tick_interval: self.tick_interval(),
            max_decode_dimension: self.max_decode_dimension,
        }
    }

    /// Dedup, overlay and auto-action settings
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            cooldown: self.cooldown(),
            recognition_interval: self.recognition_interval(),
            show_overlay: self.show_overlay,
            actions: ActionPolicy {
                auto_copy: self.auto_copy,
                auto_open_url: self.auto_open_url,
            },
        }
    }
}
