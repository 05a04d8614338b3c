// ABOUTME: Matches a target fingerprint against an identity's stored keys
// ABOUTME: Fingerprints are recomputed from key material; undecodable keys are skipped

use keyward_ssh::DecodedKey;
use keyward_store::{Identity, PublicKeyRecord};
use tracing::{debug, warn};

/// A stored key whose recomputed fingerprint matched the target
#[derive(Debug, Clone)]
pub struct ResolvedKey<'a> {
    pub identity: &'a Identity,
    pub record: &'a PublicKeyRecord,
    pub key: DecodedKey,
    /// Fingerprint computed from `key`, not the stored hint
    pub fingerprint: String,
}

/// Return every key of `identity` whose fingerprint equals `target`.
///
/// Results keep the identity's key order. A key that fails to decode is
/// logged and skipped; it never hides the identity's other keys.
pub fn match_keys<'a>(target: &str, identity: &'a Identity) -> Vec<ResolvedKey<'a>> {
    identity
        .keys
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let key = match keyward_ssh::decode(&record.encoded_key) {
                Ok(key) => key,
                Err(e) => {
                    warn!(
                        identity = %identity.id,
                        index,
                        name = %record.name,
                        error = %e,
                        "skipping undecodable key"
                    );
                    return None;
                }
            };

            let fingerprint = keyward_ssh::fingerprint(&key);
            debug!(identity = %identity.id, index, %fingerprint, "checking key");

            if !record.fingerprint.is_empty() && record.fingerprint != fingerprint {
                debug!(
                    identity = %identity.id,
                    index,
                    stored = %record.fingerprint,
                    computed = %fingerprint,
                    "stored fingerprint does not match key material"
                );
            }

            (fingerprint == target).then_some(ResolvedKey {
                identity,
                record,
                key,
                fingerprint,
            })
        })
        .collect()
}
