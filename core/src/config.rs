//! Runtime configuration for the dispatch adapter.

use serde::{Deserialize, Serialize};

use crate::classify::VolatileFields;
use crate::dispatch::BodyMode;
use crate::error::ConfigError;

/// Settings shared by every dispatch.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Largest outbound body handed to the transport.
    pub max_body_bytes: usize,

    /// Paths always tagged `do-not-test`, on top of per-request flags.
    pub volatile_fields: VolatileFields,

    pub default_body_mode: BodyMode,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 50 * 1024 * 1024,
            volatile_fields: VolatileFields::default(),
            default_body_mode: BodyMode::Auto,
        }
    }
}

impl ProbeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ProbeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
