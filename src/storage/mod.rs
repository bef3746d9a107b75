//! Storage layer for the access lists and learner progress
//!
//! Everything is kept as small JSON documents on local disk. Each write
//! replaces the whole file: the document is written to a sibling temp file
//! first and then renamed over the target.

/// Admin and granted-user files
pub mod access;
/// Per-user progress records
pub mod progress;

pub use access::{AccessBackend, AccessSnapshot, JsonFileAccessBackend, MemoryAccessBackend};
pub use progress::{InMemoryProgressStore, JsonFileProgressStore, ProgressStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Error parsing a YAML course file
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Course catalog failed validation
    #[error("Invalid course: {0}")]
    InvalidCourse(String),
}

/// Reads and parses a JSON document.
///
/// A missing file is not an error and yields `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} does not exist yet", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Serializes `data` as pretty JSON and replaces `path` with it.
///
/// # Errors
///
/// Returns an error if serialization, the temp-file write or the rename fails.
pub async fn write_json<T: Serialize + Sync>(path: &Path, data: &T) -> Result<(), StorageError> {
    let body = serde_json::to_vec_pretty(data)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "state".into(), |n| n.to_string_lossy().into_owned());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().as_simple()));

    tokio::fs::write(&tmp, body).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
