//! Two-tier cache for the assembled system prompt, keyed by the modification times of
//! the workspace files that feed it — edits to any of them self-invalidate the cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use super::{keys, CacheError, TwoTierCache};

const WORKSPACE_FILES: &[&str] = &["SOUL.md", "IDENTITY.md", "USER.md", "AGENTS.md"];

pub struct PromptCache {
    inner: TwoTierCache,
    enabled: bool,
    workspace_dir: PathBuf,
    memory_dir: PathBuf,
}

impl PromptCache {
    pub fn new(
        cache_root: impl AsRef<Path>,
        workspace_dir: impl Into<PathBuf>,
        memory_dir: impl Into<PathBuf>,
        ttl: Duration,
        max_size_mb: u64,
        enabled: bool,
    ) -> Self {
        Self {
            inner: TwoTierCache::new(cache_root, "prompt", ttl, max_size_mb),
            enabled,
            workspace_dir: workspace_dir.into(),
            memory_dir: memory_dir.into(),
        }
    }

    async fn workspace_files_version(&self) -> Value {
        let mut versions = serde_json::Map::new();
        let mut candidates: Vec<PathBuf> = WORKSPACE_FILES
            .iter()
            .map(|f| self.workspace_dir.join(f))
            .collect();
        candidates.push(self.memory_dir.join("MEMORY.md"));

        for path in candidates {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if let Ok(modified) = meta.modified() {
                    if let Ok(secs) = modified.duration_since(std::time::UNIX_EPOCH) {
                        versions.insert(path.display().to_string(), serde_json::json!(secs.as_secs_f64()));
                    }
                }
            }
        }
        Value::Object(versions)
    }

    async fn cache_key(&self) -> String {
        let versions = self.workspace_files_version().await;
        keys::prompt_key(&versions)
    }

    pub async fn get(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let key = self.cache_key().await;
        self.inner.get(&key).await.and_then(|v| v.as_str().map(str::to_string))
    }

    pub async fn set(&self, prompt: &str) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let key = self.cache_key().await;
        self.inner.set(key, serde_json::json!(prompt), None).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }
}
