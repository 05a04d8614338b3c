// ABOUTME: In-memory identity store with the same lookup semantics as SQLite
// ABOUTME: Identities are searched in insertion order; the first claimant wins

use crate::error::Result;
use crate::identity::Identity;
use crate::IdentityStore;
use async_trait::async_trait;

/// Identity store backed by an ordered `Vec`
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    identities: Vec<Identity>,
}

impl MemoryIdentityStore {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    pub fn insert(&mut self, identity: Identity) {
        self.identities.push(identity);
    }
}

impl FromIterator<Identity> for MemoryIdentityStore {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_identity_by_key_fingerprint(&self, fingerprint: &str) -> Result<Option<Identity>> {
        Ok(self
            .identities
            .iter()
            .find(|identity| identity.claims_fingerprint(fingerprint))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PublicKeyRecord;

    fn identity(id: &str, fingerprint: &str) -> Identity {
        Identity {
            id: id.to_string(),
            keys: vec![PublicKeyRecord {
                name: "key".to_string(),
                encoded_key: "ssh-ed25519 AAAA".to_string(),
                fingerprint: fingerprint.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_finds_by_stored_fingerprint() {
        let store: MemoryIdentityStore =
            [identity("u1", "SHA256:one"), identity("u2", "SHA256:two")]
                .into_iter()
                .collect();

        let found = store
            .find_identity_by_key_fingerprint("SHA256:two")
            .await
            .expect("lookup should succeed");
        assert_eq!(found.map(|i| i.id), Some("u2".to_string()));
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let store = MemoryIdentityStore::new(vec![identity("u1", "SHA256:one")]);

        let found = store
            .find_identity_by_key_fingerprint("SHA256:missing")
            .await
            .expect("lookup should succeed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_first_claimant_wins() {
        let mut store = MemoryIdentityStore::default();
        store.insert(identity("first", "SHA256:dup"));
        store.insert(identity("second", "SHA256:dup"));

        let found = store
            .find_identity_by_key_fingerprint("SHA256:dup")
            .await
            .expect("lookup should succeed")
            .expect("should find an identity");
        assert_eq!(found.id, "first");
    }
}
