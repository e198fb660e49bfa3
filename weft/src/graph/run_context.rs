//! Per-run context threaded through `Node::run_with_context`.
//!
//! Bundles the run's [`RunnableConfig`] with an optional stream sink so nodes can
//! emit [`StreamEvent`]s (tool progress, token chunks) without each node owning a
//! channel handle directly.

use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::memory::RunnableConfig;
use crate::stream::StreamEvent;

/// Context available to a node via [`Node::run_with_context`](super::Node::run_with_context).
pub struct RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub config: RunnableConfig,
    pub stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
}

impl<S> RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(config: RunnableConfig) -> Self {
        Self {
            config,
            stream_tx: None,
        }
    }

    pub fn with_stream_tx(mut self, tx: mpsc::Sender<StreamEvent<S>>) -> Self {
        self.stream_tx = Some(tx);
        self
    }

    /// Best-effort emit; a full or closed channel is silently dropped (streaming is
    /// observability, never load-bearing for the run itself).
    pub fn emit(&self, event: StreamEvent<S>) {
        if let Some(tx) = &self.stream_tx {
            let _ = tx.try_send(event);
        }
    }
}

impl<S> Clone for RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            stream_tx: self.stream_tx.clone(),
        }
    }
}

impl<S> Debug for RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("streaming", &self.stream_tx.is_some())
            .finish()
    }
}

/// Shared ownership wrapper used when several nodes within one run need the same context.
pub type SharedRunContext<S> = Arc<RunContext<S>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_stream_sink() {
        let ctx: RunContext<String> = RunContext::new(RunnableConfig::new("t1"));
        assert!(ctx.stream_tx.is_none());
        assert_eq!(ctx.config.thread_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn emit_without_sink_does_not_panic() {
        let ctx: RunContext<String> = RunContext::new(RunnableConfig::default());
        ctx.emit(StreamEvent::Values("s".to_string()));
    }
}
