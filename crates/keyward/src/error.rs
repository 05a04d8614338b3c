// ABOUTME: Error types for keyward: config, entry building, and resolution.
// ABOUTME: ResolveError is the terminal failure of a request and maps to an exit code.

use keyward_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors building an authorized_keys entry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EntryError {
    /// The identity id can't be embedded in a forced command safely.
    #[error("identity id {0:?} is not safe to embed in a forced command")]
    UnsafeIdentityId(String),

    /// The forced command program is empty or contains quoting characters.
    #[error("forced command {0:?} is not a safe command path")]
    UnsafeCommand(String),
}

/// Terminal failure of a resolution request.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("a target fingerprint is required")]
    InvalidInput,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error("failed to write authorized keys: {0}")]
    Output(#[source] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Process exit code for this failure (sysexits.h values).
    pub fn exit_code(&self) -> u8 {
        match self {
            ResolveError::InvalidInput => 64,
            ResolveError::Config(_) => 78,
            ResolveError::Store(_) => 69,
            ResolveError::Output(_) => 74,
            ResolveError::Entry(_) | ResolveError::Internal(_) => 70,
        }
    }
}

/// Result type alias using ResolveError.
pub type Result<T> = std::result::Result<T, ResolveError>;
