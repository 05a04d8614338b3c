// ABOUTME: Error types for identity store access using thiserror.
// ABOUTME: Every StoreError is fatal for a request: the caller must fail closed.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while querying the identity store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The configured collection name is not a plain SQL identifier.
    #[error("invalid identity collection name {0:?} (expected [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidCollection(String),

    /// Failed to open or connect to the store.
    #[error("failed to connect to identity store: {0}")]
    Connect(#[source] sqlx::Error),

    /// The lookup query failed.
    #[error("identity query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The store did not answer in time.
    #[error("identity store did not respond within {0:?}")]
    Timeout(Duration),

    /// An identity row could not be read at all.
    #[error("identity {id} has an unreadable key list: {source}")]
    CorruptIdentity {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;
