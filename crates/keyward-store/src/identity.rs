// ABOUTME: Identity and public key record types as kept in the identity store
// ABOUTME: Records are read-only to keyward; stored fingerprints are lookup hints only

use serde::{Deserialize, Serialize};

/// A public key as stored on an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Human-readable key name
    #[serde(default)]
    pub name: String,
    /// Stored key text: an authorized_keys line or a bare base64 blob
    #[serde(rename = "key")]
    pub encoded_key: String,
    /// Fingerprint recorded when the key was uploaded. Only an index hint,
    /// never used to authorize anything.
    #[serde(default)]
    pub fingerprint: String,
}

/// The owner of a set of public keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub keys: Vec<PublicKeyRecord>,
}

impl Identity {
    /// Whether any stored fingerprint hint equals `fingerprint`
    pub fn claims_fingerprint(&self, fingerprint: &str) -> bool {
        self.keys.iter().any(|k| k.fingerprint == fingerprint)
    }
}
