// ABOUTME: Identity store for keyward - data model, lookup trait, backends
// ABOUTME: The resolver only reads identities; nothing here writes to the store

use async_trait::async_trait;

pub mod error;
pub mod identity;
pub mod memory;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use identity::{Identity, PublicKeyRecord};
pub use memory::MemoryIdentityStore;
pub use sqlite::{is_valid_collection_name, SqliteIdentityStore, DEFAULT_COLLECTION};

/// Lookup of identities by the fingerprint hints stored on their keys.
///
/// Implementations return `Ok(None)` when no identity claims the
/// fingerprint. The returned identity is a candidate only: callers must
/// recompute fingerprints from the key material before trusting it.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_key_fingerprint(&self, fingerprint: &str) -> Result<Option<Identity>>;
}
