// ABOUTME: SSH public key codec for keyward.
// ABOUTME: Decodes stored keys and computes ssh-keygen compatible SHA256 fingerprints.

pub mod error;
pub mod fingerprint;
pub mod key;

pub use error::{DecodeError, Result};
pub use fingerprint::{fingerprint, fingerprint_wire, SHA256_PREFIX};
pub use key::{decode, decode_blob, DecodedKey};
