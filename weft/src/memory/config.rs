//! Run-time addressing for [`crate::memory::checkpointer::Checkpointer`].

use serde::{Deserialize, Serialize};

/// Identifies which resumable run a checkpoint read/write targets.
///
/// `thread_id` is required — a single process-wide checkpointer gives each
/// `thread_id` its own resumable state; `checkpoint_id` pins a specific past checkpoint
/// instead of the latest one, used when resuming after a human-approval interrupt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnableConfig {
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
    pub checkpoint_ns: Option<String>,
}

impl RunnableConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            checkpoint_id: None,
            checkpoint_ns: None,
        }
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_thread_id_only() {
        let config = RunnableConfig::new("session-1");
        assert_eq!(config.thread_id.as_deref(), Some("session-1"));
        assert!(config.checkpoint_id.is_none());
    }

    #[test]
    fn with_checkpoint_id_overrides_latest_lookup() {
        let config = RunnableConfig::new("session-1").with_checkpoint_id("ckpt-7");
        assert_eq!(config.checkpoint_id.as_deref(), Some("ckpt-7"));
    }
}
