//! Learner progress storage
//!
//! `ProgressStore` is a plain get/upsert interface. The in-memory store keeps
//! the process-lifetime behaviour; the JSON store additionally rewrites
//! `progress.json` after every upsert so a restart does not wipe learners.

use super::{read_json, write_json, StorageError};
use crate::course::UserProgress;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// File name of the progress document inside the data directory
pub const PROGRESS_FILE: &str = "progress.json";

/// Interface for progress storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Get the record of a user, if one exists
    async fn get(&self, user_id: i64) -> Result<Option<UserProgress>, StorageError>;
    /// Insert or replace the record of `progress.user_id`
    async fn upsert(&self, progress: UserProgress) -> Result<(), StorageError>;
    /// Number of tracked learners
    async fn count(&self) -> Result<usize, StorageError>;
}

/// Process-lifetime progress map
#[derive(Default)]
pub struct InMemoryProgressStore {
    users: RwLock<HashMap<i64, UserProgress>>,
}

impl InMemoryProgressStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get(&self, user_id: i64) -> Result<Option<UserProgress>, StorageError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, progress: UserProgress) -> Result<(), StorageError> {
        self.users.write().await.insert(progress.user_id, progress);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.users.read().await.len())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
    #[serde(default)]
    users: BTreeMap<i64, UserProgress>,
}

/// Progress map mirrored to a JSON file
pub struct JsonFileProgressStore {
    path: PathBuf,
    users: RwLock<BTreeMap<i64, UserProgress>>,
}

impl JsonFileProgressStore {
    /// Open `progress.json` inside `data_dir`.
    ///
    /// An unreadable or corrupt file is logged and treated as empty.
    pub async fn open(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(PROGRESS_FILE);
        let users = match read_json::<ProgressFile>(&path).await {
            Ok(Some(file)) => {
                info!("Loaded progress for {} learners from {}", file.users.len(), path.display());
                file.users
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read {}: {e}. Starting with empty progress.", path.display());
                BTreeMap::new()
            }
        };

        Self {
            path,
            users: RwLock::new(users),
        }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProgressStore for JsonFileProgressStore {
    async fn get(&self, user_id: i64) -> Result<Option<UserProgress>, StorageError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, progress: UserProgress) -> Result<(), StorageError> {
        // Hold the lock through the write so concurrent upserts hit the disk in order
        let mut users = self.users.write().await;
        users.insert(progress.user_id, progress);
        let file = ProgressFile {
            users: users.clone(),
        };
        write_json(&self.path, &file).await
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.users.read().await.len())
    }
}
