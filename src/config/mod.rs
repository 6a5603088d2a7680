//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `MESHROOM_*` environment variables.

use crate::domain::shared::PeerId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const ENV_PREFIX: &str = "MESHROOM";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Room domain; the relay and TURN addresses derive from it
    pub domain: String,
    /// Local participant identity
    pub identity: PeerId,
    /// Relay authentication credential, forwarded to the TURN server
    #[serde(default)]
    pub credential: Option<String>,
}

impl Config {
    pub fn new(domain: impl Into<String>, identity: PeerId) -> Self {
        Self {
            domain: domain.into(),
            identity,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Load configuration, optionally layering a TOML file under the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("domain", "localhost")?
            .set_default("identity", PeerId::from_clock().to_string())?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config: Config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::Invalid("domain must not be empty".to_string()));
        }
        if self.identity.is_empty() {
            return Err(ConfigError::Invalid("identity must not be empty".to_string()));
        }
        Ok(())
    }

    /// Relay channel address; an explicit ws:// or wss:// domain is kept as is
    pub fn relay_url(&self) -> String {
        if self.domain.starts_with("ws://") || self.domain.starts_with("wss://") {
            self.domain.clone()
        } else {
            format!("wss://{}", self.domain)
        }
    }

    /// TURN server address for the room
    pub fn turn_url(&self) -> String {
        let host = self
            .domain
            .split_once("://")
            .map_or(self.domain.as_str(), |(_, rest)| rest);
        format!("turn:{}", host.trim_end_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("localhost", PeerId::from_clock())
    }
}
