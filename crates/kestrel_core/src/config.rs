//! # World Configuration
//!
//! Startup settings for a [`World`](crate::World), read from the `[world]`
//! table of a TOML file:
//!
//! ```toml
//! [world]
//! max_entities = 64000
//! strict_registration = true
//! ```
//!
//! Missing keys fall back to their defaults.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ecs::DEFAULT_MAX_ENTITIES;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings of one ECS world.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Entity ceiling. Every pool allocates a sparse array of this size.
    pub max_entities: u32,
    /// Freeze the type registry after the manifest is registered, so any
    /// component type first seen later is an error.
    pub strict_registration: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            strict_registration: false,
        }
    }
}

#[derive(Deserialize)]
struct WorldFile {
    #[serde(default)]
    world: WorldConfig,
}

impl WorldConfig {
    /// Parses the `[world]` table of a TOML document.
    ///
    /// Other top-level tables are ignored so the world can share a file with
    /// the rest of the engine's settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, [`ConfigError::Invalid`] if
    /// validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: WorldFile = toml::from_str(source)?;
        file.world.validate()?;
        Ok(file.world)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// See [`WorldConfig::from_toml_str`]; additionally [`ConfigError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded world config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `max_entities` is zero or does not fit
    /// below the null entity index.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entities == 0 {
            return Err(ConfigError::Invalid("max_entities must be at least 1".into()));
        }
        if self.max_entities == u32::MAX {
            return Err(ConfigError::Invalid(format!(
                "max_entities must be below {}",
                u32::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.max_entities, 64_000);
        assert!(!config.strict_registration);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_world_table() {
        let config = WorldConfig::from_toml_str(
            r#"
            [world]
            max_entities = 128
            strict_registration = true

            [loop]
            target_fps = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.max_entities, 128);
        assert!(config.strict_registration);
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = WorldConfig::from_toml_str("[world]\nmax_entities = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = WorldConfig::from_toml_str("[world]\nmax_entitys = 10\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
