//! Configuration management for semear.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "semear";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "records.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SEMEAR_`)
/// 2. TOML config file at `~/.config/semear/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration.
    pub store: StoreConfig,
    /// Admin credential configuration.
    pub auth: AuthConfig,
    /// Console presentation configuration.
    pub console: ConsoleConfig,
}

/// Store-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/semear/records.db`
    pub database_path: Option<PathBuf>,
}

/// Admin credential configuration.
///
/// When both fields are set, every console command requires a sign-in with
/// matching credentials. When both are absent the console runs in bootstrap
/// mode, without authentication. Setting only one of the two is a
/// configuration error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The admin account identifier (e-mail shaped).
    pub identifier: Option<String>,
    /// blake3 digest of the admin secret, 64 hex characters.
    pub secret_hash: Option<String>,
}

/// Console presentation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Days within which a donation counts as recent.
    pub recent_days: i64,
    /// Days within which a donation counts as moderate (past recent).
    pub moderate_days: i64,
    /// Maximum rows printed by list commands.
    pub list_limit: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            recent_days: 30,
            moderate_days: 60,
            list_limit: 20,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `SEMEAR_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("SEMEAR_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.console.recent_days < 1 {
            return Err(Error::ConfigValidation {
                message: "recent_days must be at least 1".to_string(),
            });
        }
        if self.console.moderate_days <= self.console.recent_days {
            return Err(Error::ConfigValidation {
                message: format!(
                    "moderate_days ({}) must be greater than recent_days ({})",
                    self.console.moderate_days, self.console.recent_days
                ),
            });
        }
        if self.console.list_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "list_limit must be greater than 0".to_string(),
            });
        }

        if self.auth.identifier.is_some() != self.auth.secret_hash.is_some() {
            return Err(Error::ConfigValidation {
                message: "auth requires both identifier and secret_hash, or neither".to_string(),
            });
        }
        if let Some(identifier) = &self.auth.identifier {
            if !session::is_valid_identifier(identifier) {
                return Err(Error::ConfigValidation {
                    message: format!("malformed auth identifier: {identifier}"),
                });
            }
        }
        if let Some(hash) = &self.auth.secret_hash {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::ConfigValidation {
                    message: "secret_hash must be 64 hex characters (a blake3 digest)".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Whether an admin credential is configured.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        self.auth.identifier.is_some() && self.auth.secret_hash.is_some()
    }
}
