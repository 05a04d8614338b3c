// ABOUTME: Error types for SSH public key decoding using thiserror.
// ABOUTME: A DecodeError is always per-key and never aborts a whole request.

use thiserror::Error;

/// Errors that can occur while decoding a stored public key.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The stored key contained no key line at all.
    #[error("no public key found in input")]
    Empty,

    /// The key blob was not valid base64.
    #[error("invalid base64 in public key: {0}")]
    Base64(#[source] base64::DecodeError),

    /// The key could not be parsed as an SSH public key.
    #[error("failed to parse SSH public key: {0}")]
    Parse(#[source] ssh_key::Error),

    /// The decoded key could not be re-marshaled into wire format.
    #[error("failed to marshal SSH public key: {0}")]
    Marshal(#[source] ssh_key::Error),
}

/// Result type alias using DecodeError.
pub type Result<T> = std::result::Result<T, DecodeError>;
