//! Persistent Disk Cache
//!
//! One JSON file per video under the cache directory, indexed by file name.
//! Entries expire after the retention window: an expired record is deleted
//! on read and reported as a miss. Writes are atomic (temp file + rename)
//! and tolerated to fail - a lost write only costs future hit latency.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CacheEntry, CacheStore};
use crate::core::{now_ms, CoreError, CoreResult};

/// File-backed cache store keyed by video id.
#[derive(Debug)]
pub struct DiskCacheStore {
    dir: PathBuf,
    retention: Duration,
}

impl DiskCacheStore {
    /// Creates a store rooted at `dir` with the given retention window.
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    fn entry_path(&self, video_id: &str) -> CoreResult<PathBuf> {
        // Video ids are URL-safe; refuse anything that could escape the dir.
        if video_id.is_empty()
            || !video_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::Cache(format!(
                "invalid video id for cache key: {video_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{video_id}.json")))
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.age_ms(now_ms()) >= self.retention.as_millis() as i64
    }

    async fn remove_file(path: &Path) {
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %err, "disk cache delete failed");
            }
        }
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn get(&self, video_id: &str) -> CoreResult<Option<CacheEntry>> {
        let path = self.entry_path(video_id)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CoreError::Cache(format!("read {video_id}: {err}"))),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                // Corrupted record: drop it rather than failing the lookup
                warn!(video_id, %err, "disk cache entry corrupted, removing");
                Self::remove_file(&path).await;
                return Ok(None);
            }
        };

        if self.is_expired(&entry) {
            debug!(video_id, "disk cache entry expired");
            Self::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, entry: CacheEntry) -> CoreResult<()> {
        let path = self.entry_path(&entry.video_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| CoreError::Cache(format!("create cache dir: {err}")))?;

        let json = serde_json::to_vec(&entry)
            .map_err(|err| CoreError::Cache(format!("serialize {}: {err}", entry.video_id)))?;

        // Atomic write: temp file in the same directory, then rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|err| CoreError::Cache(format!("write {}: {err}", entry.video_id)))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|err| CoreError::Cache(format!("rename {}: {err}", entry.video_id)))?;

        debug!(video_id = %entry.video_id, "disk cache entry saved");
        Ok(())
    }

    async fn delete(&self, video_id: &str) -> CoreResult<()> {
        let path = self.entry_path(video_id)?;
        Self::remove_file(&path).await;
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CoreError::Cache(format!("read cache dir: {err}"))),
        };

        while let Ok(Some(item)) = dir.next_entry().await.map_err(|err| {
            warn!(%err, "disk cache clear: directory walk failed");
            err
        }) {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                Self::remove_file(&path).await;
            }
        }

        Ok(())
    }
}
