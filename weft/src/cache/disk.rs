//! L2 disk cache: JSON-file storage under `<cache_root>/<cache_type>/<key[:2]>/<key>.json`.
//! A corrupted or expired file is deleted rather than surfaced as an error — disk I/O
//! failures are logged and treated as a miss, never fatal.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Cache, CacheError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    value: Value,
    created_at: f64,
    expire_at: f64,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Disk-backed cache tier. One instance per cache type (`url`, `llm`, `prompt`, `translate`).
pub struct DiskCache {
    cache_dir: PathBuf,
    cache_type: String,
    default_ttl: Duration,
    max_size_mb: u64,
}

impl DiskCache {
    pub fn new(cache_root: impl AsRef<Path>, cache_type: impl Into<String>, default_ttl: Duration, max_size_mb: u64) -> Self {
        let cache_type = cache_type.into();
        Self {
            cache_dir: cache_root.as_ref().join(&cache_type),
            cache_type,
            default_ttl,
            max_size_mb,
        }
    }

    pub fn cache_type(&self) -> &str {
        &self.cache_type
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let prefix: String = key.chars().take(2).collect();
        self.cache_dir.join(prefix).join(format!("{key}.json"))
    }

    async fn read_entry(&self, path: &Path) -> Option<DiskEntry> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<DiskEntry>(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(cache_type = %self.cache_type, path = %path.display(), error = %e, "disk cache: corrupted entry, deleting");
                let _ = tokio::fs::remove_file(path).await;
                None
            }
        }
    }

    /// Removes all expired entries; returns the count removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = now_secs();
        let mut removed = 0;
        for path in self.all_entry_paths().await {
            if let Some(entry) = self.read_entry(&path).await {
                if now > entry.expire_at {
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        removed += 1;
                    }
                }
            }
        }
        removed
    }

    /// Removes the oldest (by file mtime) entries until under `target_percent` of `max_size_mb`.
    pub async fn cleanup_lru(&self, target_percent: f64) -> usize {
        let mut entries: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        for path in self.all_entry_paths().await {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                entries.push((path, mtime, meta.len()));
            }
        }
        entries.sort_by_key(|(_, mtime, _)| *mtime);

        let mut current_mb = entries.iter().map(|(_, _, len)| *len).sum::<u64>() as f64 / (1024.0 * 1024.0);
        let target_mb = self.max_size_mb as f64 * target_percent;

        let mut removed = 0;
        for (path, _, len) in entries {
            if current_mb <= target_mb {
                break;
            }
            if tokio::fs::remove_file(&path).await.is_ok() {
                current_mb -= len as f64 / (1024.0 * 1024.0);
                removed += 1;
            }
        }
        removed
    }

    pub async fn size_mb(&self) -> f64 {
        let mut total = 0u64;
        for path in self.all_entry_paths().await {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                total += meta.len();
            }
        }
        total as f64 / (1024.0 * 1024.0)
    }

    async fn all_entry_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let Ok(mut subdirs) = tokio::fs::read_dir(&self.cache_dir).await else {
            return out;
        };
        while let Ok(Some(subdir)) = subdirs.next_entry().await {
            if !subdir.path().is_dir() {
                continue;
            }
            let Ok(mut files) = tokio::fs::read_dir(subdir.path()).await else {
                continue;
            };
            while let Ok(Some(file)) = files.next_entry().await {
                if file.path().extension().map(|e| e == "json").unwrap_or(false) {
                    out.push(file.path());
                }
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl Cache<String, Value> for DiskCache {
    async fn get(&self, key: &String) -> Option<Value> {
        let path = self.file_path(key);
        let entry = self.read_entry(&path).await?;
        if now_secs() > entry.expire_at {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        // Touch for LRU purposes; best-effort.
        let _ = tokio::fs::File::open(&path).await;
        Some(entry.value)
    }

    async fn set(&self, key: String, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let created_at = now_secs();
        let entry = DiskEntry {
            key: key.clone(),
            value,
            created_at,
            expire_at: created_at + ttl.as_secs_f64(),
        };

        let path = self.file_path(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::Other(format!("disk cache: mkdir {e}")))?;
        }
        let bytes = serde_json::to_vec_pretty(&entry)
            .map_err(|e| CacheError::Other(format!("disk cache: serialize {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CacheError::Other(format!("disk cache: write {e}")))?;

        if self.size_mb().await > self.max_size_mb as f64 {
            self.cleanup_lru(0.8).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &String) -> Result<(), CacheError> {
        let path = self.file_path(key);
        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        if tokio::fs::metadata(&self.cache_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&self.cache_dir)
                .await
                .map_err(|e| CacheError::Other(format!("disk cache: clear {e}")))?;
        }
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| CacheError::Other(format!("disk cache: recreate {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "url", Duration::from_secs(3600), 5120);
        cache
            .set("abc123".to_string(), serde_json::json!("hello"), None)
            .await
            .unwrap();
        assert_eq!(cache.get(&"abc123".to_string()).await, Some(serde_json::json!("hello")));
    }

    #[tokio::test]
    async fn expired_entry_is_deleted_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "url", Duration::from_millis(10), 5120);
        cache
            .set("key".to_string(), serde_json::json!(1), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "url", Duration::from_secs(3600), 5120);
        cache.set("a".to_string(), serde_json::json!(1), None).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }
}
