//! Two-tier cache for translation results, keyed by content + target language.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use super::{keys, CacheError, TwoTierCache};

pub struct TranslateCache {
    inner: TwoTierCache,
    enabled: bool,
}

impl TranslateCache {
    pub fn new(cache_root: impl AsRef<Path>, ttl: Duration, max_size_mb: u64, enabled: bool) -> Self {
        Self {
            inner: TwoTierCache::new(cache_root, "translate", ttl, max_size_mb),
            enabled,
        }
    }

    pub async fn get(&self, content: &str, target_language: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let key = keys::translate_key(content, target_language);
        self.inner.get(&key).await
    }

    pub async fn set(&self, content: &str, target_language: &str, result: Value) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let key = keys::translate_key(content, target_language);
        self.inner.set(key, result, None).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_by_content_and_language() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslateCache::new(dir.path(), Duration::from_secs(3600), 5120, true);
        cache.set("hello", "fr", serde_json::json!({"text": "bonjour"})).await.unwrap();
        assert_eq!(cache.get("hello", "fr").await, Some(serde_json::json!({"text": "bonjour"})));
        assert_eq!(cache.get("hello", "de").await, None);
    }
}
