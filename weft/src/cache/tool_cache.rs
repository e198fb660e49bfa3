//! Tool-result cache decorator: wraps any [`Tool`] with a two-tier cache keyed by
//! its name and arguments, so identical calls skip re-execution. A cache hit is
//! prefixed with `[CACHE_HIT]` so the agent transcript can tell the two apart.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{keys, TwoTierCache};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};
use crate::tools::Tool;

pub struct CachedTool {
    inner: Arc<dyn Tool>,
    cache: TwoTierCache,
    enabled: bool,
    add_marker: bool,
}

impl CachedTool {
    pub fn new(
        inner: Arc<dyn Tool>,
        cache_root: impl AsRef<Path>,
        ttl: Duration,
        max_size_mb: u64,
        enabled: bool,
    ) -> Self {
        let cache_type = format!("tool_{}", inner.name());
        Self {
            cache: TwoTierCache::new(cache_root, cache_type, ttl, max_size_mb),
            inner,
            enabled,
            add_marker: true,
        }
    }

    pub fn without_marker(mut self) -> Self {
        self.add_marker = false;
        self
    }
}

#[async_trait]
impl Tool for CachedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    fn spec(&self) -> ToolSpec {
        self.inner.spec()
    }

    async fn invoke(&self, args: Value, ctx: &ToolCallContext) -> ToolCallContent {
        if !self.enabled {
            return self.inner.invoke(args, ctx).await;
        }

        let key = keys::tool_cache_key(self.inner.name(), &args);
        if let Some(cached) = self.cache.get(&key).await {
            if let Some(text) = cached.as_str() {
                let body = text.to_string();
                return ToolCallContent::new(if self.add_marker {
                    format!("[CACHE_HIT]{body}")
                } else {
                    body
                });
            }
        }

        let result = self.inner.invoke(args, ctx).await;
        if !result.as_str().starts_with("[ERROR]") {
            let _ = self.cache.set(key, serde_json::json!(result.as_str()), None).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counter"
        }
        fn description(&self) -> &str {
            "increments a counter per call"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, _args: Value, _ctx: &ToolCallContext) -> ToolCallContent {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            ToolCallContent::new(format!("call-{n}"))
        }
    }

    #[tokio::test]
    async fn repeated_calls_hit_cache_and_skip_inner() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(CountingTool { calls: AtomicUsize::new(0) });
        let cached = CachedTool::new(inner, dir.path(), Duration::from_secs(3600), 5120, true);
        let ctx = ToolCallContext::default();

        let first = cached.invoke(serde_json::json!({"x": 1}), &ctx).await;
        assert_eq!(first.as_str(), "call-0");

        let second = cached.invoke(serde_json::json!({"x": 1}), &ctx).await;
        assert_eq!(second.as_str(), "[CACHE_HIT]call-0");
    }

    #[tokio::test]
    async fn different_args_are_separate_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(CountingTool { calls: AtomicUsize::new(0) });
        let cached = CachedTool::new(inner, dir.path(), Duration::from_secs(3600), 5120, true);
        let ctx = ToolCallContext::default();

        cached.invoke(serde_json::json!({"x": 1}), &ctx).await;
        let second = cached.invoke(serde_json::json!({"x": 2}), &ctx).await;
        assert_eq!(second.as_str(), "call-1");
    }
}
