//! Persisted admin and granted-user lists
//!
//! Two files live side by side in the data directory:
//!
//! ```text
//! admins.json  {"admins": [1, 2]}
//! users.json   {"users": [42, 7],
//!               "details": {"42": {"granted_at": "...", "granted_by": 1, "note": "alice"}}}
//! ```
//!
//! `users` keeps the grant order; `details` is optional per user so files
//! written by older deployments (ids only) still load.

use super::{read_json, write_json, StorageError};
use crate::access::AccessRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// File name of the admin list inside the data directory
pub const ADMINS_FILE: &str = "admins.json";
/// File name of the granted-user list inside the data directory
pub const USERS_FILE: &str = "users.json";

/// Everything the access store persists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSnapshot {
    /// Admin ids, sorted
    pub admins: Vec<i64>,
    /// Grants in insertion order
    pub grants: Vec<AccessRecord>,
}

/// Interface for access-list persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessBackend: Send + Sync {
    /// Load the last saved snapshot (empty when nothing was saved yet)
    async fn load(&self) -> Result<AccessSnapshot, StorageError>;
    /// Replace the saved snapshot
    async fn save(&self, snapshot: &AccessSnapshot) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AdminsFile {
    #[serde(default)]
    admins: Vec<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<i64>,
    #[serde(default)]
    details: BTreeMap<String, GrantDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GrantDetails {
    granted_at: DateTime<Utc>,
    granted_by: i64,
    #[serde(default)]
    note: String,
}

/// JSON-file backed access lists
pub struct JsonFileAccessBackend {
    admins_path: PathBuf,
    users_path: PathBuf,
}

impl JsonFileAccessBackend {
    /// Use `admins.json` and `users.json` inside `data_dir`
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            admins_path: dir.join(ADMINS_FILE),
            users_path: dir.join(USERS_FILE),
        }
    }

    /// Path of the admin list
    #[must_use]
    pub fn admins_path(&self) -> &Path {
        &self.admins_path
    }

    /// Path of the granted-user list
    #[must_use]
    pub fn users_path(&self) -> &Path {
        &self.users_path
    }
}

#[async_trait]
impl AccessBackend for JsonFileAccessBackend {
    async fn load(&self) -> Result<AccessSnapshot, StorageError> {
        let admins: AdminsFile = read_json(&self.admins_path).await?.unwrap_or_default();
        let users: UsersFile = read_json(&self.users_path).await?.unwrap_or_default();

        let loaded_at = Utc::now();
        let mut grants: Vec<AccessRecord> = Vec::with_capacity(users.users.len());
        for user_id in users.users {
            if grants.iter().any(|g| g.user_id == user_id) {
                debug!("Skipping duplicate grant entry for user {user_id}");
                continue;
            }
            let record = match users.details.get(&user_id.to_string()) {
                Some(d) => AccessRecord {
                    user_id,
                    granted_at: d.granted_at,
                    granted_by: d.granted_by,
                    note: d.note.clone(),
                },
                None => AccessRecord {
                    user_id,
                    granted_at: loaded_at,
                    granted_by: 0,
                    note: String::new(),
                },
            };
            grants.push(record);
        }

        let mut admins = admins.admins;
        admins.sort_unstable();
        admins.dedup();

        Ok(AccessSnapshot { admins, grants })
    }

    async fn save(&self, snapshot: &AccessSnapshot) -> Result<(), StorageError> {
        let admins = AdminsFile {
            admins: snapshot.admins.clone(),
        };
        let users = UsersFile {
            users: snapshot.grants.iter().map(|g| g.user_id).collect(),
            details: snapshot
                .grants
                .iter()
                .map(|g| {
                    (
                        g.user_id.to_string(),
                        GrantDetails {
                            granted_at: g.granted_at,
                            granted_by: g.granted_by,
                            note: g.note.clone(),
                        },
                    )
                })
                .collect(),
        };

        write_json(&self.admins_path, &admins).await?;
        write_json(&self.users_path, &users).await
    }
}

/// Keeps the snapshot in memory only. Used when no data directory is wanted.
#[derive(Default)]
pub struct MemoryAccessBackend {
    snapshot: Mutex<AccessSnapshot>,
}

impl MemoryAccessBackend {
    /// Start from a given snapshot
    #[must_use]
    pub fn with_snapshot(snapshot: AccessSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }
}

#[async_trait]
impl AccessBackend for MemoryAccessBackend {
    async fn load(&self) -> Result<AccessSnapshot, StorageError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &AccessSnapshot) -> Result<(), StorageError> {
        *self.snapshot.lock().await = snapshot.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::scratch_dir;

    fn record(user_id: i64, note: &str) -> AccessRecord {
        AccessRecord {
            user_id,
            granted_at: Utc::now(),
            granted_by: 1,
            note: note.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_dir_loads_empty_snapshot() -> Result<(), StorageError> {
        let backend = JsonFileAccessBackend::new(scratch_dir("access-empty"));
        assert_eq!(backend.load().await?, AccessSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_order_and_details() -> Result<(), StorageError> {
        let dir = scratch_dir("access-roundtrip");
        let backend = JsonFileAccessBackend::new(&dir);
        let snapshot = AccessSnapshot {
            admins: vec![1, 5],
            grants: vec![record(42, "alice"), record(7, "bob"), record(100, "")],
        };

        backend.save(&snapshot).await?;
        let loaded = JsonFileAccessBackend::new(&dir).load().await?;

        assert_eq!(loaded, snapshot);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_ids_only_users_file_still_loads() -> Result<(), StorageError> {
        let dir = scratch_dir("access-legacy");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(USERS_FILE), br#"{"users": [3, 4, 3]}"#).await?;

        let loaded = JsonFileAccessBackend::new(&dir).load().await?;

        let ids: Vec<i64> = loaded.grants.iter().map(|g| g.user_id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(loaded.admins.is_empty());
        assert_eq!(loaded.grants[0].granted_by, 0);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_written_layout_matches_documented_shape() -> Result<(), Box<dyn std::error::Error>> {
        let dir = scratch_dir("access-layout");
        let backend = JsonFileAccessBackend::new(&dir);
        backend
            .save(&AccessSnapshot {
                admins: vec![1],
                grants: vec![record(42, "alice")],
            })
            .await?;

        let admins: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(backend.admins_path()).await?)?;
        let users: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(backend.users_path()).await?)?;

        assert_eq!(admins["admins"], serde_json::json!([1]));
        assert_eq!(users["users"], serde_json::json!([42]));
        assert_eq!(users["details"]["42"]["granted_by"], serde_json::json!(1));
        assert_eq!(users["details"]["42"]["note"], serde_json::json!("alice"));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
