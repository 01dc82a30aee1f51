//! Configuration management for Burnnote.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BurnnoteError, Result};
use crate::logging::LoggingConfig;
use crate::note::DEFAULT_KEY_ATTEMPTS;
use crate::ratelimit::{RateLimitRules, DEFAULT_MAX_TRACKED_KEYS};

/// Prefix for environment overrides, e.g. `BURNNOTE__STORE__DATABASE_URL`.
pub const ENV_PREFIX: &str = "BURNNOTE";

/// Main configuration for the Burnnote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnnoteConfig {
    /// Note store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Note creation policy
    #[serde(default)]
    pub notes: NotesConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Interval between expired-note sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://burnnote.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

/// Who may create notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationPolicy {
    /// A signed-in user is required
    #[default]
    Authenticated,
    /// Anyone may create notes
    Anonymous,
}

/// Note creation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default)]
    pub creation_policy: CreationPolicy,

    /// Fresh public keys tried before a collision is reported
    #[serde(default = "default_key_attempts")]
    pub key_attempts: u32,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            creation_policy: CreationPolicy::default(),
            key_attempts: default_key_attempts(),
        }
    }
}

fn default_key_attempts() -> u32 {
    DEFAULT_KEY_ATTEMPTS
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Inline per-action rules
    #[serde(default)]
    pub rules: RateLimitRules,

    /// Path to a rules file that replaces `rules`
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Sweep threshold: a new client arriving while this many windows are
    /// tracked triggers a sweep of stale ones, at most once a minute
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules: RateLimitRules::default(),
            rules_path: None,
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

fn default_max_tracked_keys() -> usize {
    DEFAULT_MAX_TRACKED_KEYS
}

impl RateLimitingConfig {
    /// The effective rules: the rules file if one is set, else the inline ones.
    pub fn resolve_rules(&self) -> Result<RateLimitRules> {
        match &self.rules_path {
            Some(path) => RateLimitRules::from_file(path),
            None => {
                self.rules.validate()?;
                Ok(self.rules.clone())
            }
        }
    }
}

impl BurnnoteConfig {
    /// Load configuration from a YAML file, then apply `BURNNOTE__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BurnnoteError::Config(e.to_string()))
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| BurnnoteError::Config(e.to_string()))
    }
}
