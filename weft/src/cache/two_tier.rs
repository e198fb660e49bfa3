//! The common two-tier contract every specialised facade is built on: an in-memory
//! LRU-ish L1 in front of a JSON-on-disk L2. A miss in L1 that hits in L2 promotes
//! the value back into L1.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use super::{Cache, CacheError, DiskCache, InMemoryCache};

pub struct TwoTierCache {
    l1: InMemoryCache<String, Value>,
    l2: DiskCache,
}

impl TwoTierCache {
    pub fn new(cache_root: impl AsRef<Path>, cache_type: impl Into<String>, default_ttl: Duration, max_size_mb: u64) -> Self {
        Self {
            l1: InMemoryCache::new(),
            l2: DiskCache::new(cache_root, cache_type, default_ttl, max_size_mb),
        }
    }

    pub fn cache_type(&self) -> &str {
        self.l2.cache_type()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let key = key.to_string();
        if let Some(v) = self.l1.get(&key).await {
            return Some(v);
        }
        if let Some(v) = self.l2.get(&key).await {
            let _ = self.l1.set(key, v.clone(), None).await;
            return Some(v);
        }
        None
    }

    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let key = key.into();
        self.l1.set(key.clone(), value.clone(), ttl).await?;
        self.l2.set(key, value, ttl).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.l1.clear().await?;
        self.l2.clear().await
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.l2.cleanup_expired().await
    }

    pub async fn cleanup_lru(&self) -> usize {
        self.l2.cleanup_lru(0.8).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_in_l1_promotes_from_l2() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(dir.path(), "url", Duration::from_secs(3600), 5120);
        cache.set("k", serde_json::json!("v"), None).await.unwrap();

        // A fresh instance shares the same L2 directory but starts with an empty L1.
        let cache2 = TwoTierCache::new(dir.path(), "url", Duration::from_secs(3600), 5120);
        assert_eq!(cache2.get("k").await, Some(serde_json::json!("v")));
    }

    #[tokio::test]
    async fn clear_empties_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(dir.path(), "url", Duration::from_secs(3600), 5120);
        cache.set("k", serde_json::json!("v"), None).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get("k").await, None);
    }
}
