//! # Loop Configuration
//!
//! Everything the integrator reads from `kestrel.toml`:
//!
//! ```toml
//! target_fps = 60
//! frame_budget_warn_ms = 33
//! enable_timing_logs = true
//! log_filter = "info,kestrel_core=debug"
//!
//! [world]
//! max_entities = 64000
//! strict_registration = false
//! ```
//!
//! Every key is optional.

use std::path::Path;
use std::time::Duration;

use kestrel_core::{ConfigError, WorldConfig};
use serde::Deserialize;

/// Settings of the frame loop and the world it drives.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameLoopConfig {
    /// World settings, from the `[world]` table.
    pub world: WorldConfig,
    /// Frames per second to pace to. `0` runs frames back to back.
    pub target_fps: u32,
    /// Frames slower than this are logged when timing logs are on.
    pub frame_budget_warn_ms: u64,
    /// Log frames that exceed the budget.
    pub enable_timing_logs: bool,
    /// Default `tracing` filter. `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            target_fps: 60,
            frame_budget_warn_ms: 33,
            enable_timing_logs: false,
            log_filter: "info".to_string(),
        }
    }
}

impl GameLoopConfig {
    /// Parses a full `kestrel.toml` document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a `kestrel.toml` file.
    ///
    /// # Errors
    ///
    /// See [`GameLoopConfig::from_toml_str`]; additionally [`ConfigError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges, including the world table.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        if self.frame_budget_warn_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_budget_warn_ms must be at least 1".into(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".into()));
        }
        Ok(())
    }

    /// Wall time of one paced frame, or `None` when unpaced.
    #[must_use]
    pub fn target_frame_time(&self) -> Option<Duration> {
        (self.target_fps > 0).then(|| Duration::from_secs(1) / self.target_fps)
    }

    /// Slow-frame threshold.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_warn_ms)
    }
}
