//! `RunMiddleware`: the duck-typed hook chain a run pipes every emitted event
//! through, grounded on the debug middleware's `on_run_start`/`on_event`/`on_run_end`
//! protocol -- generalised here so the debug middleware is one implementation among
//! others (an audit logger, a metrics collector) rather than a special case.

use async_trait::async_trait;
use serde_json::Value;

use super::context::RunnerContext;

/// A stage in the event pipe a run pushes every emitted event through.
///
/// `on_event` may mutate the event (truncate a field, redact something) or drop it
/// entirely by returning `None`; a dropped event never reaches later middleware or
/// the transport. Middleware failures are never allowed to abort a run: implementors
/// that can fail internally should log and fall back to a safe default rather than
/// panicking, and the Runner itself never propagates anything out of these calls.
#[async_trait]
pub trait RunMiddleware: Send + Sync {
    async fn on_run_start(&self, _ctx: &RunnerContext) {}

    async fn on_event(&self, event: Value, _ctx: &RunnerContext) -> Option<Value> {
        Some(event)
    }

    async fn on_run_end(&self, _ctx: &RunnerContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMiddleware {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    #[async_trait]
    impl RunMiddleware for CountingMiddleware {
        async fn on_run_start(&self, _ctx: &RunnerContext) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_run_end(&self, _ctx: &RunnerContext) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct DroppingMiddleware;

    #[async_trait]
    impl RunMiddleware for DroppingMiddleware {
        async fn on_event(&self, event: Value, _ctx: &RunnerContext) -> Option<Value> {
            if event["type"] == "token" {
                None
            } else {
                Some(event)
            }
        }
    }

    #[tokio::test]
    async fn default_on_event_passes_through_unchanged() {
        let mw = CountingMiddleware {
            starts: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        };
        let ctx = RunnerContext::new("s1", "/tmp");
        let event = serde_json::json!({"type": "token", "content": "hi"});
        let out = mw.on_event(event.clone(), &ctx).await;
        assert_eq!(out, Some(event));
    }

    #[tokio::test]
    async fn dropping_middleware_filters_matching_events() {
        let mw = DroppingMiddleware;
        let ctx = RunnerContext::new("s1", "/tmp");
        assert!(mw.on_event(serde_json::json!({"type": "token"}), &ctx).await.is_none());
        assert!(mw
            .on_event(serde_json::json!({"type": "tool_start"}), &ctx)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn start_and_end_hooks_fire() {
        let mw = CountingMiddleware {
            starts: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        };
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.on_run_start(&ctx).await;
        mw.on_run_end(&ctx).await;
        assert_eq!(mw.starts.load(Ordering::SeqCst), 1);
        assert_eq!(mw.ends.load(Ordering::SeqCst), 1);
    }
}
