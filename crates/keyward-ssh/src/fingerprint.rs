// ABOUTME: SSH public key fingerprint computation.
// ABOUTME: Produces SHA256:<unpadded base64> fingerprints identical to ssh-keygen -lf.

use crate::key::DecodedKey;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Prefix of every fingerprint produced by this module.
pub const SHA256_PREFIX: &str = "SHA256:";

/// Compute the SHA256 fingerprint of a decoded public key.
///
/// The digest is taken over the key's canonical SSH wire encoding:
///
/// - Algorithm name as SSH string (4-byte length prefix + name)
/// - Algorithm-specific key fields, each length-prefixed
///
/// and rendered as `SHA256:` followed by standard base64 without padding,
/// which is the format printed by `ssh-keygen -lf`.
pub fn fingerprint(key: &DecodedKey) -> String {
    fingerprint_wire(key.wire_bytes())
}

/// Compute the SHA256 fingerprint of raw SSH wire bytes.
pub fn fingerprint_wire(wire: &[u8]) -> String {
    let hash = Sha256::digest(wire);
    format!(
        "{}{}",
        SHA256_PREFIX,
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash)
    )
}
