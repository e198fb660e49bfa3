//! Two-tier cache for fetched URL bodies, keyed by `keys::url_key`.

use std::path::Path;
use std::time::Duration;

use super::{keys, CacheError, TwoTierCache};

pub struct UrlCache {
    inner: TwoTierCache,
    enabled: bool,
}

impl UrlCache {
    pub fn new(cache_root: impl AsRef<Path>, ttl: Duration, max_size_mb: u64, enabled: bool) -> Self {
        Self {
            inner: TwoTierCache::new(cache_root, "url", ttl, max_size_mb),
            enabled,
        }
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let key = keys::url_key(url);
        self.inner.get(&key).await.and_then(|v| v.as_str().map(str::to_string))
    }

    pub async fn set(&self, url: &str, body: &str) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let key = keys::url_key(url);
        self.inner.set(key, serde_json::json!(body), None).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_set_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = UrlCache::new(dir.path(), Duration::from_secs(3600), 5120, true);
        assert_eq!(cache.get("https://example.com").await, None);
        cache.set("https://example.com", "<html></html>").await.unwrap();
        assert_eq!(cache.get("https://example.com").await, Some("<html></html>".to_string()));
    }

    #[tokio::test]
    async fn disabled_cache_never_stores() {
        let dir = tempfile::tempdir().unwrap();
        let cache = UrlCache::new(dir.path(), Duration::from_secs(3600), 5120, false);
        cache.set("https://example.com", "body").await.unwrap();
        assert_eq!(cache.get("https://example.com").await, None);
    }
}
