//! Object storage for uploaded transcripts.
//!
//! Objects are keyed `{user}/{meetingId}/{timestamp}-{filename}`, where the
//! timestamp is unix milliseconds at upload time. [`LocalObjectStore`] keeps
//! them under a directory on disk.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`. Existing objects are never overwritten.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Build the storage key for an upload.
pub fn object_key(user_id: &str, meeting_id: &str, timestamp_millis: i64, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        sanitize_segment(user_id),
        sanitize_segment(meeting_id),
        timestamp_millis,
        sanitize_segment(file_name)
    )
}

/// Reduce a user-supplied name to its final path component.
fn sanitize_segment(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("unnamed");
    last.trim().to_string()
}

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(Error::Storage(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", key, e)))?;
        tokio::io::AsyncWriteExt::write_all(&mut file, bytes).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
