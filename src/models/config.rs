use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Engine configuration loaded from a YAML file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Edge length of one canvas tile in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// Integer magnification of chunk bitmaps (odd, so a block has a centre pixel)
    #[serde(default = "default_draw_multiplier")]
    pub draw_multiplier: u32,

    /// Erase painted pixels where the template is transparent
    #[serde(default)]
    pub analyze_transparent_pixels: bool,

    /// Charges held back from every scheduling pass
    #[serde(default)]
    pub reserved_charges: u32,

    /// Spend the budget on a harmless write when nothing needs painting
    #[serde(default)]
    pub burn_when_exhausted: bool,

    /// Template set file (JSON)
    #[serde(default)]
    pub templates_file: Option<PathBuf>,

    /// Write queue file (JSON), kept between cycles
    #[serde(default)]
    pub queue_file: Option<PathBuf>,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub painter: PainterConfig,
}

fn default_tile_size() -> u32 {
    1000
}

fn default_draw_multiplier() -> u32 {
    3
}

/// Remote canvas endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Base URL serving `files/s0/tiles/{x}/{y}.png`
    #[serde(default = "default_backend_url")]
    pub tile_base_url: String,

    /// Base URL accepting `POST s0/pixel/{x}/{y}`
    #[serde(default = "default_backend_url")]
    pub write_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "https://backend.wplace.live".to_string()
}

fn default_request_timeout() -> u64 {
    20
}

impl EndpointConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            tile_base_url: default_backend_url(),
            write_base_url: default_backend_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Timing and retry policy of the execution controller
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PainterConfig {
    /// Granularity of cancellation checks in every wait
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ceiling for the paint session becoming ready
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,

    /// Ceiling for a write opportunity (charges available) to appear
    #[serde(default = "default_opportunity_timeout")]
    pub opportunity_timeout_secs: u64,

    /// Ceiling for a triggered cycle to report completion
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_secs: u64,

    /// Pause after a successful cycle
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Pause after a failed cycle
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,

    /// Consecutive failures that force a full restart
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_element_timeout() -> u64 {
    15
}

fn default_opportunity_timeout() -> u64 {
    60
}

fn default_completion_timeout() -> u64 {
    120
}

fn default_cooldown() -> u64 {
    30
}

fn default_backoff() -> u64 {
    10
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            element_timeout_secs: default_element_timeout(),
            opportunity_timeout_secs: default_opportunity_timeout(),
            completion_timeout_secs: default_completion_timeout(),
            cooldown_secs: default_cooldown(),
            backoff_secs: default_backoff(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl PainterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn opportunity_timeout(&self) -> Duration {
        Duration::from_secs(self.opportunity_timeout_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            draw_multiplier: default_draw_multiplier(),
            analyze_transparent_pixels: false,
            reserved_charges: 0,
            burn_when_exhausted: false,
            templates_file: None,
            queue_file: None,
            endpoints: EndpointConfig::default(),
            painter: PainterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration, falling back to defaults when the file is missing
    /// or invalid.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config file given, using defaults");
            return Self::default();
        };

        match Self::try_load(path) {
            Ok(config) => {
                tracing::info!(
                    path = %path.display(),
                    tile_size = config.tile_size,
                    draw_multiplier = config.draw_multiplier,
                    "Loaded configuration"
                );
                config
            }
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate configuration, surfacing every failure.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be positive".into()));
        }
        if self.draw_multiplier == 0 || self.draw_multiplier % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "draw_multiplier must be odd, got {}",
                self.draw_multiplier
            )));
        }
        if self.painter.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "painter.failure_threshold must be at least 1".into(),
            ));
        }
        if self.painter.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "painter.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
