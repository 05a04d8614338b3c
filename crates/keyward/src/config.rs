// ABOUTME: Configuration loading and validation for authorized-keys
// ABOUTME: TOML file with ${VAR} expansion, defaults, and CLI overrides applied by the caller

use crate::entry::{is_safe_command, DEFAULT_COMMAND};
use crate::error::ConfigError;
use keyward_store::{is_valid_collection_name, DEFAULT_COLLECTION};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Config file read when no path is given, if it exists
pub const DEFAULT_CONFIG_PATH: &str = "/etc/keyward/config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub log: LogConfig,
    pub entry: EntryConfig,
}

/// Identity store connection settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database URL, e.g. `sqlite:///var/lib/keyward/identities.db`
    pub url: String,
    /// Table holding identities
    pub collection: String,
    /// Bound on connecting and on the lookup query, in seconds.
    /// Keep it below sshd's own patience for AuthorizedKeysCommand.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            collection: DEFAULT_COLLECTION.to_string(),
            timeout_secs: 5,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &redact_url(&self.url))
            .field("collection", &self.collection)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for `authorized-keys.log`; stderr when unset
    pub dir: Option<PathBuf>,
    /// Default level, overridable with RUST_LOG
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Forced command program; the identity id is appended as its only argument
    pub command: String,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] if it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML after expanding environment variables.
    /// Undefined variables expand to an empty string with a warning.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let contents = shellexpand::env_with_context_no_errors(contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    warn!(
                        variable = %var,
                        "Environment variable not defined, using empty string"
                    );
                    Some(String::new())
                }
            }
        });

        toml::from_str(&contents)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.url is required (set it in the config file or pass --store-url)".into(),
            ));
        }
        if !is_valid_collection_name(&self.store.collection) {
            return Err(ConfigError::Invalid(format!(
                "store.collection {:?} must match [A-Za-z_][A-Za-z0-9_]*",
                self.store.collection
            )));
        }
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.timeout_secs must be greater than zero".into(),
            ));
        }
        if !is_safe_command(&self.entry.command) {
            return Err(ConfigError::Invalid(format!(
                "entry.command {:?} must be non-empty and free of quotes, backslashes, and control characters",
                self.entry.command
            )));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log.level).map_err(|_| {
            ConfigError::Invalid(format!(
                "log.level {:?} is not one of trace, debug, info, warn, error",
                self.log.level
            ))
        })
    }
}

/// Hide credentials in a connection URL
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://[REDACTED]{}", &rest[at..]),
        None => url.to_string(),
    }
}
