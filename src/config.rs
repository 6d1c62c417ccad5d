use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const MEMORY: &str = ":memory:";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite database, or `:memory:`.
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: MEMORY.to_string(),
            max_connections: 10,
            busy_timeout_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads `path` if given, then applies `DATABASE_URL` from the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::Io {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        self
    }

    /// Every connection to an in-memory database sees its own database, so
    /// the pool is limited to one.
    pub fn pool_size(&self) -> u32 {
        if self.database_url == MEMORY {
            1
        } else {
            self.max_connections.max(1)
        }
    }

    pub fn level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
