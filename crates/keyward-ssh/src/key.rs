// ABOUTME: Decoding of stored SSH public keys into canonical wire form.
// ABOUTME: Accepts authorized_keys lines (with or without options) and bare base64 blobs.

use crate::error::{DecodeError, Result};
use base64::Engine;
use ssh_key::PublicKey;

/// A successfully decoded public key together with its canonical wire bytes.
///
/// The wire bytes are produced by re-marshaling the parsed key, so they are
/// the canonical encoding regardless of how the key text was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    key: PublicKey,
    key_type: String,
    wire: Vec<u8>,
}

impl DecodedKey {
    /// Wrap a parsed public key, marshaling it to SSH wire format.
    ///
    /// # Errors
    /// Returns `DecodeError::Marshal` if the key cannot be encoded.
    pub fn from_public_key(key: PublicKey) -> Result<Self> {
        let wire = key.to_bytes().map_err(DecodeError::Marshal)?;
        let key_type = key.algorithm().as_str().to_string();
        Ok(Self {
            key,
            key_type,
            wire,
        })
    }

    /// The parsed public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.key
    }

    /// Canonical SSH algorithm name, e.g. `ssh-ed25519`.
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// Canonical SSH wire encoding of the key (no comment).
    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Standard padded base64 of the wire bytes, as used in authorized_keys.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.wire)
    }
}

/// Decode a stored public key.
///
/// The input may hold several lines; blank lines and `#` comments are
/// skipped and the first key line is used. A key line is one of:
///
/// - `<type> <base64> [comment]`
/// - `<options> <type> <base64> [comment]`, options are ignored
/// - `<base64>`, a bare wire blob
///
/// # Errors
/// Returns a `DecodeError` describing why the key was rejected. Malformed
/// input never panics.
pub fn decode(encoded: &str) -> Result<DecodedKey> {
    let line = encoded
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or(DecodeError::Empty)?;

    if !line.contains(char::is_whitespace) {
        return decode_blob(line);
    }

    match PublicKey::from_openssh(&single_spaced(line)) {
        Ok(key) => DecodedKey::from_public_key(key),
        Err(err) => {
            // Report the first error if the options-stripped form fails too.
            let key = strip_options(line)
                .and_then(|rest| PublicKey::from_openssh(&single_spaced(rest)).ok())
                .ok_or(DecodeError::Parse(err))?;
            DecodedKey::from_public_key(key)
        }
    }
}

/// Rejoin whitespace-separated fields with single spaces.
///
/// sshd accepts any run of spaces or tabs between the type, blob and
/// comment; `PublicKey::from_openssh` expects exactly one space.
fn single_spaced(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode a bare base64 SSH wire blob.
pub fn decode_blob(blob: &str) -> Result<DecodedKey> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(blob.trim())
        .map_err(DecodeError::Base64)?;
    let key = PublicKey::from_bytes(&bytes).map_err(DecodeError::Parse)?;
    DecodedKey::from_public_key(key)
}

/// Skip a leading authorized_keys options field.
///
/// Options end at the first whitespace outside double quotes. Returns `None`
/// when there is nothing after the options or a quote is left open.
fn strip_options(line: &str) -> Option<&str> {
    let mut in_quotes = false;
    let mut escaped = false;

    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                let rest = line[idx..].trim_start();
                return (!rest.is_empty()).then_some(rest);
            }
            _ => {}
        }
    }

    None
}
