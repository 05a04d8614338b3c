// ABOUTME: SQLite-backed identity store, opened read-only
// ABOUTME: Each identity row holds its keys as a JSON array of {name, key, fingerprint}

use crate::error::{Result, StoreError};
use crate::identity::{Identity, PublicKeyRecord};
use crate::IdentityStore;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "users";

/// Whether `name` is safe to splice into SQL as a table name
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Read-only identity store over a SQLite database.
///
/// The collection is a table shaped like:
///
/// ```sql
/// CREATE TABLE users (id TEXT PRIMARY KEY, keys TEXT NOT NULL DEFAULT '[]');
/// ```
pub struct SqliteIdentityStore {
    pool: SqlitePool,
    find_sql: String,
}

impl SqliteIdentityStore {
    /// Open the database at `url` read-only.
    ///
    /// Connecting is bounded by `timeout`. A missing database file is a
    /// connection error; it is never created.
    pub async fn open(url: &str, collection: &str, timeout: Duration) -> Result<Self> {
        if !is_valid_collection_name(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::Connect)?
            .read_only(true)
            .create_if_missing(false);

        let connect = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_with(options);

        let pool = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| StoreError::Timeout(timeout))?
            .map_err(StoreError::Connect)?;

        debug!(collection, "identity store connected");
        Self::from_pool(pool, collection)
    }

    /// Use an existing pool
    pub fn from_pool(pool: SqlitePool, collection: &str) -> Result<Self> {
        if !is_valid_collection_name(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }

        // Rows whose keys column is not a JSON array never match.
        let find_sql = format!(
            r#"SELECT CAST(id AS TEXT) AS id, keys FROM "{collection}"
               WHERE CASE WHEN NOT json_valid(keys) THEN 0
                          WHEN json_type(keys) <> 'array' THEN 0
                          ELSE EXISTS (
                              SELECT 1 FROM json_each("{collection}".keys) AS k
                              WHERE json_extract(k.value, '$.fingerprint') = ?
                          )
                     END
               ORDER BY rowid
               LIMIT 2"#
        );

        Ok(Self { pool, find_sql })
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_identity_by_key_fingerprint(&self, fingerprint: &str) -> Result<Option<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(&self.find_sql)
            .bind(fingerprint)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        if rows.len() > 1 {
            warn!(
                fingerprint,
                "more than one identity claims this fingerprint, using the first"
            );
        }

        rows.into_iter().next().map(Identity::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: String,
    keys: String,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = StoreError;

    fn try_from(row: IdentityRow) -> Result<Self> {
        let documents: Vec<serde_json::Value> =
            serde_json::from_str(&row.keys).map_err(|source| StoreError::CorruptIdentity {
                id: row.id.clone(),
                source,
            })?;

        let keys = documents
            .into_iter()
            .enumerate()
            .filter_map(|(index, doc)| match serde_json::from_value::<PublicKeyRecord>(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(identity = %row.id, index, error = %e, "skipping malformed key document");
                    None
                }
            })
            .collect();

        Ok(Identity { id: row.id, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn seed(path: &Path, table: &str, rows: &[(&str, &str)]) {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .expect("should create database");

        sqlx::query(&format!(
            "CREATE TABLE {table} (id TEXT PRIMARY KEY, keys TEXT NOT NULL DEFAULT '[]')"
        ))
        .execute(&pool)
        .await
        .expect("should create table");

        for (id, keys) in rows {
            sqlx::query(&format!("INSERT INTO {table} (id, keys) VALUES (?, ?)"))
                .bind(id)
                .bind(keys)
                .execute(&pool)
                .await
                .expect("should insert row");
        }

        pool.close().await;
    }

    fn url(path: &Path) -> String {
        format!("sqlite:{}", path.display())
    }

    #[test]
    fn test_collection_names() {
        assert!(is_valid_collection_name("users"));
        assert!(is_valid_collection_name("_git_users2"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("2users"));
        assert!(!is_valid_collection_name("users\"; DROP TABLE users; --"));
        assert!(!is_valid_collection_name("git-users"));
    }

    #[tokio::test]
    async fn test_finds_identity_with_ordered_keys() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "users",
            &[
                ("u0", r#"[{"name":"other","key":"k0","fingerprint":"SHA256:zzz"}]"#),
                (
                    "u1",
                    r#"[{"name":"a","key":"k1","fingerprint":"SHA256:aaa"},
                        {"name":"b","key":"k2","fingerprint":"SHA256:bbb"}]"#,
                ),
            ],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), DEFAULT_COLLECTION, TIMEOUT)
            .await
            .expect("should open store");
        let identity = store
            .find_identity_by_key_fingerprint("SHA256:bbb")
            .await
            .expect("lookup should succeed")
            .expect("identity should be found");

        assert_eq!(identity.id, "u1");
        let names: Vec<_> = identity.keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(identity.keys[0].encoded_key, "k1");
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "users",
            &[("u1", r#"[{"name":"a","key":"k1","fingerprint":"SHA256:aaa"}]"#)],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), "users", TIMEOUT)
            .await
            .expect("should open store");
        let found = store
            .find_identity_by_key_fingerprint("SHA256:nope")
            .await
            .expect("lookup should succeed");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_skips_malformed_key_documents() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "users",
            &[(
                "u1",
                r#"[{"name":"broken"}, 42, {"name":"ok","key":"k1","fingerprint":"SHA256:aaa"}]"#,
            )],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), "users", TIMEOUT)
            .await
            .expect("should open store");
        let identity = store
            .find_identity_by_key_fingerprint("SHA256:aaa")
            .await
            .expect("lookup should succeed")
            .expect("identity should be found");

        assert_eq!(identity.keys.len(), 1);
        assert_eq!(identity.keys[0].name, "ok");
    }

    #[tokio::test]
    async fn test_corrupt_row_does_not_break_other_lookups() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "users",
            &[
                ("bad", "this is not json"),
                ("obj", r#"{"fingerprint":"SHA256:aaa"}"#),
                ("u1", r#"[{"name":"a","key":"k1","fingerprint":"SHA256:aaa"}]"#),
            ],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), "users", TIMEOUT)
            .await
            .expect("should open store");
        let identity = store
            .find_identity_by_key_fingerprint("SHA256:aaa")
            .await
            .expect("lookup should succeed")
            .expect("identity should be found");

        assert_eq!(identity.id, "u1");
    }

    #[tokio::test]
    async fn test_first_identity_wins_on_duplicate_claims() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "users",
            &[
                ("first", r#"[{"name":"a","key":"k1","fingerprint":"SHA256:dup"}]"#),
                ("second", r#"[{"name":"b","key":"k2","fingerprint":"SHA256:dup"}]"#),
            ],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), "users", TIMEOUT)
            .await
            .expect("should open store");
        let identity = store
            .find_identity_by_key_fingerprint("SHA256:dup")
            .await
            .expect("lookup should succeed")
            .expect("identity should be found");

        assert_eq!(identity.id, "first");
    }

    #[tokio::test]
    async fn test_custom_collection() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(
            &db,
            "git_accounts",
            &[("acct", r#"[{"name":"a","key":"k1","fingerprint":"SHA256:aaa"}]"#)],
        )
        .await;

        let store = SqliteIdentityStore::open(&url(&db), "git_accounts", TIMEOUT)
            .await
            .expect("should open store");
        let identity = store
            .find_identity_by_key_fingerprint("SHA256:aaa")
            .await
            .expect("lookup should succeed");

        assert_eq!(identity.map(|i| i.id), Some("acct".to_string()));
    }

    #[tokio::test]
    async fn test_missing_table_is_query_error() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("identities.db");
        seed(&db, "users", &[]).await;

        let store = SqliteIdentityStore::open(&url(&db), "accounts", TIMEOUT)
            .await
            .expect("should open store");
        let result = store.find_identity_by_key_fingerprint("SHA256:aaa").await;

        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_collection() {
        let result = SqliteIdentityStore::open("sqlite::memory:", "users; --", TIMEOUT).await;
        assert!(matches!(result, Err(StoreError::InvalidCollection(_))));
    }

    #[tokio::test]
    async fn test_open_missing_database_fails() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let db = temp_dir.path().join("absent.db");

        let result = SqliteIdentityStore::open(&url(&db), "users", TIMEOUT).await;

        assert!(matches!(result, Err(StoreError::Connect(_))));
        assert!(!db.exists(), "read-only open must not create the database");
    }
}
