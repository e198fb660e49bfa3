//! LLM reply cache: caches a whole LLM response (as its event list) keyed by
//! system prompt, recent history, current message, model params, and the memory
//! fingerprint. Replayed with small per-event delays to approximate streaming.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use super::keys::{self, LlmReplyKeyParams};
use super::TwoTierCache;
use crate::error::AgentError;

const TOKEN_DELAY: Duration = Duration::from_millis(10);
const TOOL_DELAY: Duration = Duration::from_millis(50);

pub struct LlmReplyCache {
    inner: TwoTierCache,
    enabled: bool,
}

impl LlmReplyCache {
    pub fn new(cache_root: impl AsRef<Path>, ttl: Duration, max_size_mb: u64, enabled: bool) -> Self {
        Self {
            inner: TwoTierCache::new(cache_root, "llm", ttl, max_size_mb),
            enabled,
        }
    }

    pub fn key_for(&self, params: &LlmReplyKeyParams<'_>) -> String {
        keys::llm_reply_key(params)
    }

    /// `get_or_generate`: on a cache hit, replays the stored event list to `out_tx`
    /// (with simulated streaming delays when `stream` is true); on a miss, runs
    /// `generate` with a collecting channel, forwards every event live, and stores
    /// the collected list on successful completion.
    pub async fn get_or_generate<F, Fut>(
        &self,
        params: &LlmReplyKeyParams<'_>,
        stream: bool,
        out_tx: mpsc::Sender<Value>,
        generate: F,
    ) -> Result<(), AgentError>
    where
        F: FnOnce(mpsc::Sender<Value>) -> Fut + Send,
        Fut: Future<Output = Result<(), AgentError>> + Send,
    {
        if !self.enabled {
            return generate(out_tx).await;
        }

        let key = self.key_for(params);
        if let Some(cached) = self.inner.get(&key).await {
            if let Ok(events) = serde_json::from_value::<Vec<Value>>(cached) {
                self.replay(events, stream, &out_tx).await;
                return Ok(());
            }
        }

        let (collect_tx, mut collect_rx) = mpsc::channel::<Value>(256);
        let forward = tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(event) = collect_rx.recv().await {
                let _ = out_tx.send(event.clone()).await;
                collected.push(event);
            }
            collected
        });

        generate(collect_tx).await?;
        let collected = forward
            .await
            .map_err(|e| AgentError::Other(format!("llm cache: forwarder panicked: {e}")))?;

        if !collected.is_empty() {
            let _ = self.inner.set(key, serde_json::json!(collected), None).await;
        }
        Ok(())
    }

    async fn replay(&self, events: Vec<Value>, stream: bool, tx: &mpsc::Sender<Value>) {
        for mut event in events {
            if stream {
                let delay = match event.get("type").and_then(|v| v.as_str()) {
                    Some("token") => TOKEN_DELAY,
                    Some("tool_start") | Some("tool_end") => TOOL_DELAY,
                    _ => TOKEN_DELAY,
                };
                tokio::time::sleep(delay).await;
            }
            if let Some(obj) = event.as_object_mut() {
                obj.insert("cached".to_string(), serde_json::json!(true));
            }
            let _ = tx.send(event).await;
        }
    }

    pub async fn clear(&self) -> Result<(), crate::cache::CacheError> {
        self.inner.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(message: &'a str) -> LlmReplyKeyParams<'a> {
        LlmReplyKeyParams {
            system_prompt_hash: "h",
            recent_history: &[],
            current_message: message,
            model: "gpt-4",
            temperature: 0.7,
            memory_fingerprint: "fp",
        }
    }

    #[tokio::test]
    async fn cache_miss_runs_generator_and_forwards_events() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LlmReplyCache::new(dir.path(), Duration::from_secs(3600), 5120, true);
        let (tx, mut rx) = mpsc::channel(8);

        cache
            .get_or_generate(&params("hi"), false, tx, |inner_tx| async move {
                inner_tx.send(serde_json::json!({"type": "token", "content": "hi"})).await.ok();
                Ok(())
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event["content"], "hi");
    }

    #[tokio::test]
    async fn cache_hit_replays_with_cached_marker() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LlmReplyCache::new(dir.path(), Duration::from_secs(3600), 5120, true);
        let (tx, mut rx) = mpsc::channel(8);

        cache
            .get_or_generate(&params("hi"), false, tx, |inner_tx| async move {
                inner_tx.send(serde_json::json!({"type": "token", "content": "hi"})).await.ok();
                Ok(())
            })
            .await
            .unwrap();
        rx.recv().await.unwrap();

        let (tx2, mut rx2) = mpsc::channel(8);
        cache
            .get_or_generate(&params("hi"), false, tx2, |_| async { panic!("should not regenerate") })
            .await
            .unwrap();
        let replayed = rx2.recv().await.unwrap();
        assert_eq!(replayed["cached"], true);
    }

    #[tokio::test]
    async fn disabled_cache_always_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LlmReplyCache::new(dir.path(), Duration::from_secs(3600), 5120, false);
        let (tx, mut rx) = mpsc::channel(8);

        cache
            .get_or_generate(&params("hi"), false, tx, |inner_tx| async move {
                inner_tx.send(serde_json::json!({"type": "token"})).await.ok();
                Ok(())
            })
            .await
            .unwrap();
        assert!(rx.recv().await.is_some());
    }
}
