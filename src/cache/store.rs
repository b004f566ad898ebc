//! Key to blob cache store
//!
//! The reconciliation engine only needs `restore` and `save`; listing and
//! removal back the `cache` subcommands.

use crate::error::{DockstashError, DockstashResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Metadata for one stored blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key the blob was saved under
    pub key: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Blob size in bytes
    pub size_bytes: u64,
}

impl CacheEntry {
    /// Check if this entry is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }
}

/// Abstract key to blob store
///
/// Implementations must tolerate concurrent calls with different keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore the blob stored under `key` to `path`.
    ///
    /// Returns `true` on a hit; `path` is populated iff the result is `true`.
    async fn restore(&self, key: &str, path: &Path) -> DockstashResult<bool>;

    /// Store the file at `path` under `key`. An existing entry is not an error.
    async fn save(&self, key: &str, path: &Path) -> DockstashResult<()>;

    /// Whether an entry exists for `key`
    async fn contains(&self, key: &str) -> DockstashResult<bool>;

    /// All entries, newest first
    async fn list(&self) -> DockstashResult<Vec<CacheEntry>>;

    /// Delete the entry stored under `key`
    async fn remove(&self, key: &str) -> DockstashResult<()>;

    /// Human-readable store name for display
    fn store_name(&self) -> &'static str;
}

const ENTRIES_DIR: &str = "entries";
const BLOB_FILE: &str = "image.tar";
const META_FILE: &str = "entry.json";
const STAGING_PREFIX: &str = ".staging-";

/// Cache store on the local filesystem
///
/// Layout: `<root>/entries/<sha256(key)[..32]>/{image.tar,entry.json}`.
/// Entries are staged in a temporary directory and renamed into place, so
/// an entry directory is either complete or absent.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Create a store rooted at `root` (created lazily on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join(ENTRIES_DIR)
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.entries_dir().join(hex::encode(&digest[..16]))
    }

    /// Read entry metadata; a missing or unreadable entry counts as absent
    async fn read_entry(dir: &Path) -> Option<CacheEntry> {
        let content = match fs::read_to_string(dir.join(META_FILE)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Unreadable cache entry {}: {}", dir.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Corrupt cache entry {}: {}", dir.display(), e);
                None
            }
        }
    }

    /// Entry metadata for `key` if the entry is complete
    async fn complete_entry(&self, key: &str) -> Option<(PathBuf, CacheEntry)> {
        let dir = self.entry_dir(key);
        let entry = Self::read_entry(&dir).await?;
        if entry.key != key {
            return None;
        }
        if !fs::try_exists(dir.join(BLOB_FILE)).await.unwrap_or(false) {
            return None;
        }
        Some((dir, entry))
    }

    async fn stage_entry(&self, staging: &Path, key: &str, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(staging).await?;
        let size_bytes = fs::copy(path, staging.join(BLOB_FILE)).await?;

        let entry = CacheEntry {
            key: key.to_string(),
            created_at: Utc::now(),
            size_bytes,
        };
        let json = serde_json::to_vec_pretty(&entry)?;
        fs::write(staging.join(META_FILE), json).await
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(&self, key: &str, path: &Path) -> DockstashResult<bool> {
        let Some((dir, _)) = self.complete_entry(key).await else {
            debug!("Cache miss: {}", key);
            return Ok(false);
        };

        let restore_err = |e: std::io::Error| DockstashError::CacheRestore {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(restore_err)?;
        }
        if let Err(e) = fs::copy(dir.join(BLOB_FILE), path).await {
            // A partial archive must not look like a hit
            let _ = fs::remove_file(path).await;
            return Err(restore_err(e));
        }

        debug!("Cache hit: {} -> {}", key, path.display());
        Ok(true)
    }

    async fn save(&self, key: &str, path: &Path) -> DockstashResult<()> {
        if self.complete_entry(key).await.is_some() {
            debug!("Cache entry already exists: {}", key);
            return Ok(());
        }

        let save_err = |reason: String| DockstashError::CacheSave {
            key: key.to_string(),
            reason,
        };

        let dir = self.entry_dir(key);
        let staging = self
            .entries_dir()
            .join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()));

        if let Err(e) = self.stage_entry(&staging, key, path).await {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(save_err(e.to_string()));
        }

        // Leftover from an interrupted writer or a corrupt entry
        if fs::try_exists(&dir).await.unwrap_or(false) {
            let _ = fs::remove_dir_all(&dir).await;
        }

        if let Err(e) = fs::rename(&staging, &dir).await {
            let _ = fs::remove_dir_all(&staging).await;
            // Another writer finished the same key first
            if self.complete_entry(key).await.is_some() {
                debug!("Cache entry saved concurrently: {}", key);
                return Ok(());
            }
            return Err(save_err(e.to_string()));
        }

        debug!("Saved cache entry: {}", key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> DockstashResult<bool> {
        Ok(self.complete_entry(key).await.is_some())
    }

    async fn list(&self) -> DockstashResult<Vec<CacheEntry>> {
        let entries_dir = self.entries_dir();
        let mut dir = match fs::read_dir(&entries_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DockstashError::io(
                    format!("listing {}", entries_dir.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DockstashError::io("reading cache entries", e))?
        {
            if item.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            if let Some(entry) = Self::read_entry(&item.path()).await {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn remove(&self, key: &str) -> DockstashResult<()> {
        let dir = self.entry_dir(key);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(DockstashError::CacheEntryNotFound(key.to_string()));
        }

        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| DockstashError::io(format!("removing cache entry {}", key), e))?;
        debug!("Removed cache entry: {}", key);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn blob(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).await.unwrap();
        path
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.0 GB");
    }

    #[tokio::test]
    async fn restore_missing_key_is_miss() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let target = dir.path().join("out.tar");

        assert!(!store.restore("nope", &target).await.unwrap());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn save_then_restore() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let source = blob(&dir, "image.tar", b"layers").await;

        store.save("key-1", &source).await.unwrap();
        assert!(store.contains("key-1").await.unwrap());

        let target = dir.path().join("scratch").join("restored.tar");
        assert!(store.restore("key-1", &target).await.unwrap());
        assert_eq!(fs::read(&target).await.unwrap(), b"layers");
    }

    #[tokio::test]
    async fn save_existing_key_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let first = blob(&dir, "a.tar", b"first").await;
        let second = blob(&dir, "b.tar", b"second").await;

        store.save("key", &first).await.unwrap();
        store.save("key", &second).await.unwrap();

        let target = dir.path().join("out.tar");
        store.restore("key", &target).await.unwrap();
        assert_eq!(fs::read(&target).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn save_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));

        let err = store
            .save("key", &dir.path().join("missing.tar"))
            .await
            .unwrap_err();
        assert!(matches!(err, DockstashError::CacheSave { .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_without_blob_is_miss() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let source = blob(&dir, "image.tar", b"x").await;
        store.save("key", &source).await.unwrap();

        // Metadata present, blob upload never completed
        fs::remove_file(store.entry_dir("key").join(BLOB_FILE))
            .await
            .unwrap();

        let target = dir.path().join("out.tar");
        assert!(!store.restore("key", &target).await.unwrap());
        assert!(!target.exists());

        // A later save repairs the entry
        store.save("key", &source).await.unwrap();
        assert!(store.restore("key", &target).await.unwrap());
    }

    #[tokio::test]
    async fn failed_restore_leaves_no_archive() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let source = blob(&dir, "image.tar", b"x").await;
        store.save("key", &source).await.unwrap();

        // Unreadable blob: a directory where the archive should be
        let blob_path = store.entry_dir("key").join(BLOB_FILE);
        fs::remove_file(&blob_path).await.unwrap();
        fs::create_dir(&blob_path).await.unwrap();

        let target = blob(&dir, "out.tar", b"leftover").await;
        let err = store.restore("key", &target).await.unwrap_err();

        assert!(matches!(err, DockstashError::CacheRestore { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn list_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let source = blob(&dir, "image.tar", b"12345").await;

        store.save("a", &source).await.unwrap();
        store.save("b", &source).await.unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.size_bytes == 5));
        assert!(entries[0].created_at >= entries[1].created_at);

        store.remove("a").await.unwrap();
        let keys: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["b".to_string()]);

        assert!(matches!(
            store.remove("a").await,
            Err(DockstashError::CacheEntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_saves_of_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let source = blob(&dir, "image.tar", b"data").await;

        let saves = (0..8).map(|i| {
            let store = store.clone();
            let source = source.clone();
            async move { store.save(&format!("key-{}", i), &source).await }
        });
        for result in futures_util::future::join_all(saves).await {
            result.unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 8);
    }

    #[test]
    fn entry_age() {
        let old = CacheEntry {
            key: "k".to_string(),
            created_at: Utc::now() - chrono::Duration::days(40),
            size_bytes: 0,
        };
        assert!(old.is_older_than_days(30));
        assert!(!old.is_older_than_days(60));
    }
}
