//! Allow-list of learners and the set of administrators
//!
//! The admin set is the union of ids from configuration and ids persisted
//! through [`AccessBackend`]. Every mutation rewrites the backend while the
//! write lock is held, so persisted state never interleaves.

use crate::course::CourseError;
use crate::storage::{AccessBackend, AccessSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// A granted learner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Telegram user id
    pub user_id: i64,
    /// When access was granted
    pub granted_at: DateTime<Utc>,
    /// Admin who granted it, `0` when unknown
    pub granted_by: i64,
    /// Free-form note, usually the learner's name
    pub note: String,
}

#[derive(Debug, Default)]
struct AccessState {
    admins: BTreeSet<i64>,
    grants: Vec<AccessRecord>,
}

impl AccessState {
    fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            admins: self.admins.iter().copied().collect(),
            grants: self.grants.clone(),
        }
    }

    fn is_granted(&self, user_id: i64) -> bool {
        self.grants.iter().any(|g| g.user_id == user_id)
    }
}

/// Persistent allow-list and admin set
pub struct AccessStore {
    state: RwLock<AccessState>,
    backend: Arc<dyn AccessBackend>,
    enforce: bool,
}

impl AccessStore {
    /// Load the persisted lists and merge `configured_admins` into the admin set.
    ///
    /// An unreadable backend yields an empty store; the failure is logged.
    /// With `enforce == false` every user passes [`has_access`](Self::has_access).
    pub async fn open(
        backend: Arc<dyn AccessBackend>,
        configured_admins: &[i64],
        enforce: bool,
    ) -> Self {
        let snapshot = match backend.load().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to load access lists, starting empty: {e}");
                AccessSnapshot::default()
            }
        };

        let mut admins: BTreeSet<i64> = snapshot.admins.into_iter().collect();
        admins.extend(configured_admins.iter().copied());

        info!(
            "Access store ready: {} admins, {} granted users, access control {}",
            admins.len(),
            snapshot.grants.len(),
            if enforce { "enabled" } else { "disabled" }
        );

        Self {
            state: RwLock::new(AccessState {
                admins,
                grants: snapshot.grants,
            }),
            backend,
            enforce,
        }
    }

    async fn persist(&self, state: &AccessState) {
        if let Err(e) = self.backend.save(&state.snapshot()).await {
            error!("Failed to persist access lists: {e}");
        }
    }

    /// Whether the allow-list is enforced
    #[must_use]
    pub const fn is_enforced(&self) -> bool {
        self.enforce
    }

    /// Whether `user_id` is an administrator
    pub async fn is_admin(&self, user_id: i64) -> bool {
        self.state.read().await.admins.contains(&user_id)
    }

    /// Whether `user_id` may use the course
    pub async fn has_access(&self, user_id: i64) -> bool {
        if !self.enforce {
            return true;
        }
        let state = self.state.read().await;
        state.admins.contains(&user_id) || state.is_granted(user_id)
    }

    /// Grant access. Returns `false` when the user already had it.
    pub async fn grant(&self, user_id: i64, granted_by: i64, note: &str) -> bool {
        let mut state = self.state.write().await;
        if state.is_granted(user_id) {
            return false;
        }
        state.grants.push(AccessRecord {
            user_id,
            granted_at: Utc::now(),
            granted_by,
            note: note.to_string(),
        });
        info!("Admin {granted_by} granted access to user {user_id}");
        self.persist(&state).await;
        true
    }

    /// Revoke access. Returns `false` when the user was not granted.
    pub async fn revoke(&self, user_id: i64) -> bool {
        let mut state = self.state.write().await;
        let before = state.grants.len();
        state.grants.retain(|g| g.user_id != user_id);
        if state.grants.len() == before {
            return false;
        }
        info!("Revoked access of user {user_id}");
        self.persist(&state).await;
        true
    }

    /// Promote to administrator. Returns `false` when already an admin.
    pub async fn add_admin(&self, user_id: i64) -> bool {
        let mut state = self.state.write().await;
        if !state.admins.insert(user_id) {
            return false;
        }
        info!("User {user_id} is now an administrator");
        self.persist(&state).await;
        true
    }

    /// Demote an administrator. Returns `Ok(false)` when `user_id` is not one.
    ///
    /// # Errors
    ///
    /// `LastAdmin` when `user_id` is the only administrator left.
    pub async fn remove_admin(&self, user_id: i64) -> Result<bool, CourseError> {
        let mut state = self.state.write().await;
        if !state.admins.contains(&user_id) {
            return Ok(false);
        }
        if state.admins.len() == 1 {
            return Err(CourseError::LastAdmin);
        }
        state.admins.remove(&user_id);
        info!("User {user_id} is no longer an administrator");
        self.persist(&state).await;
        Ok(true)
    }

    /// Grants in the order they were made
    pub async fn list_granted(&self) -> Vec<AccessRecord> {
        self.state.read().await.grants.clone()
    }

    /// Ids of every granted user, in grant order
    pub async fn granted_ids(&self) -> Vec<i64> {
        self.state
            .read()
            .await
            .grants
            .iter()
            .map(|g| g.user_id)
            .collect()
    }

    /// Admin ids, sorted
    pub async fn list_admins(&self) -> Vec<i64> {
        self.state.read().await.admins.iter().copied().collect()
    }

    /// `(granted, admins)`
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.grants.len(), state.admins.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::access::MockAccessBackend;
    use crate::storage::{JsonFileAccessBackend, MemoryAccessBackend, StorageError};

    async fn store(admins: &[i64]) -> AccessStore {
        AccessStore::open(Arc::new(MemoryAccessBackend::default()), admins, true).await
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let access = store(&[1]).await;

        assert!(access.grant(42, 1, "alice").await);
        assert!(access.has_access(42).await);
        assert!(!access.is_admin(42).await);

        assert!(access.revoke(42).await);
        assert!(!access.has_access(42).await);
        assert!(!access.revoke(42).await);
    }

    #[tokio::test]
    async fn test_duplicate_grant_keeps_first_record() {
        let access = store(&[1]).await;
        assert!(access.grant(42, 1, "alice").await);
        assert!(!access.grant(42, 1, "bob").await);

        let granted = access.list_granted().await;
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].note, "alice");
    }

    #[tokio::test]
    async fn test_admins_always_have_access() {
        let access = store(&[1]).await;
        assert!(access.has_access(1).await);
        assert!(!access.has_access(2).await);
    }

    #[tokio::test]
    async fn test_disabled_enforcement_lets_everyone_in() {
        let access = AccessStore::open(Arc::new(MemoryAccessBackend::default()), &[1], false).await;
        assert!(access.has_access(999).await);
        assert!(!access.is_admin(999).await);
    }

    #[tokio::test]
    async fn test_list_granted_keeps_grant_order() {
        let access = store(&[1]).await;
        for id in [30, 10, 20] {
            access.grant(id, 1, "").await;
        }
        assert_eq!(access.granted_ids().await, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_admin_set_merges_configured_and_persisted() {
        let backend = MemoryAccessBackend::with_snapshot(AccessSnapshot {
            admins: vec![5],
            grants: Vec::new(),
        });
        let access = AccessStore::open(Arc::new(backend), &[1, 5], true).await;
        assert_eq!(access.list_admins().await, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_removed() -> Result<(), CourseError> {
        let access = store(&[1]).await;
        assert!(matches!(
            access.remove_admin(1).await,
            Err(CourseError::LastAdmin)
        ));

        assert!(access.add_admin(2).await);
        assert!(!access.add_admin(2).await);
        assert!(access.remove_admin(1).await?);
        assert!(!access.remove_admin(1).await?);
        assert_eq!(access.list_admins().await, vec![2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_failure_starts_empty() {
        let mut backend = MockAccessBackend::new();
        backend
            .expect_load()
            .returning(|| Err(StorageError::Io(std::io::Error::other("permission denied"))));

        let access = AccessStore::open(Arc::new(backend), &[1], true).await;
        assert_eq!(access.counts().await, (0, 1));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_in_memory_grant() {
        let mut backend = MockAccessBackend::new();
        backend.expect_load().returning(|| Ok(AccessSnapshot::default()));
        backend
            .expect_save()
            .times(1)
            .returning(|_| Err(StorageError::Io(std::io::Error::other("read-only fs"))));

        let access = AccessStore::open(Arc::new(backend), &[1], true).await;
        assert!(access.grant(42, 1, "alice").await);
        assert!(access.has_access(42).await);
    }

    #[tokio::test]
    async fn test_corrupt_users_file_loads_empty() -> Result<(), StorageError> {
        let dir = crate::storage::test_support::scratch_dir("access-corrupt");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(crate::storage::access::USERS_FILE), b"not json").await?;

        let access = AccessStore::open(Arc::new(JsonFileAccessBackend::new(&dir)), &[1], true).await;
        assert_eq!(access.counts().await, (0, 1));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_grants_survive_reopen() -> Result<(), StorageError> {
        let dir = crate::storage::test_support::scratch_dir("access-reopen");
        {
            let access =
                AccessStore::open(Arc::new(JsonFileAccessBackend::new(&dir)), &[1], true).await;
            access.grant(42, 1, "alice").await;
            access.add_admin(9).await;
        }

        let reopened =
            AccessStore::open(Arc::new(JsonFileAccessBackend::new(&dir)), &[1], true).await;
        assert!(reopened.has_access(42).await);
        assert!(reopened.is_admin(9).await);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
