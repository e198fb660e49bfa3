//! In-memory [`Checkpointer`] keyed by `thread_id`.
//!
//! Backs the process-wide checkpointer that gives each session a resumable state across
//! a human-approval interrupt. Checkpoints never outlive the process; there is no disk
//! persistence, since long-term durability is an external collaborator's concern.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::memory::checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata};
use crate::memory::checkpointer::{CheckpointError, Checkpointer};
use crate::memory::config::RunnableConfig;
use crate::memory::ids::short_hex_id;

struct ThreadHistory<S> {
    checkpoints: Vec<(Checkpoint<S>, CheckpointMetadata)>,
}

impl<S> Default for ThreadHistory<S> {
    fn default() -> Self {
        Self {
            checkpoints: Vec::new(),
        }
    }
}

/// Thread-safe in-memory [`Checkpointer`] implementation.
pub struct MemorySaver<S> {
    threads: Mutex<HashMap<String, ThreadHistory<S>>>,
}

impl<S> Default for MemorySaver<S> {
    fn default() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> MemorySaver<S> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<S> Checkpointer<S> for MemorySaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError> {
        let thread_id = config
            .thread_id
            .clone()
            .ok_or(CheckpointError::ThreadIdRequired)?;

        let mut threads = self
            .threads
            .lock()
            .map_err(|_| CheckpointError::Storage("checkpoint lock poisoned".to_string()))?;
        let history = threads.entry(thread_id.clone()).or_default();
        let metadata = CheckpointMetadata {
            thread_id,
            step: history.checkpoints.len() as u64,
            reason: crate::memory::checkpoint::CheckpointReason::Step,
        };
        let checkpoint_id = checkpoint.checkpoint_id.clone();
        history.checkpoints.push((checkpoint.clone(), metadata));
        Ok(checkpoint_id)
    }

    async fn get_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<(Checkpoint<S>, CheckpointMetadata)>, CheckpointError> {
        let thread_id = config
            .thread_id
            .clone()
            .ok_or(CheckpointError::ThreadIdRequired)?;

        let threads = self
            .threads
            .lock()
            .map_err(|_| CheckpointError::Storage("checkpoint lock poisoned".to_string()))?;
        let Some(history) = threads.get(&thread_id) else {
            return Ok(None);
        };

        if let Some(checkpoint_id) = &config.checkpoint_id {
            Ok(history
                .checkpoints
                .iter()
                .find(|(c, _)| &c.checkpoint_id == checkpoint_id)
                .cloned())
        } else {
            Ok(history.checkpoints.last().cloned())
        }
    }

    async fn list(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
        before: Option<&str>,
        after: Option<&str>,
    ) -> Result<Vec<CheckpointListItem>, CheckpointError> {
        let thread_id = config
            .thread_id
            .clone()
            .ok_or(CheckpointError::ThreadIdRequired)?;

        let threads = self
            .threads
            .lock()
            .map_err(|_| CheckpointError::Storage("checkpoint lock poisoned".to_string()))?;
        let Some(history) = threads.get(&thread_id) else {
            return Ok(Vec::new());
        };

        let mut items: Vec<CheckpointListItem> = history
            .checkpoints
            .iter()
            .filter(|(c, _)| before.is_none_or(|b| c.checkpoint_id.as_str() < b))
            .filter(|(c, _)| after.is_none_or(|a| c.checkpoint_id.as_str() > a))
            .map(|(c, m)| CheckpointListItem {
                checkpoint_id: c.checkpoint_id.clone(),
                created_at: c.created_at,
                metadata: m.clone(),
            })
            .collect();

        items.reverse();
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}

/// Builds a fresh [`Checkpoint`] for `state` with a new random id and the current time.
pub fn new_checkpoint<S>(state: S) -> Checkpoint<S> {
    Checkpoint::new(short_hex_id(), state, Utc::now())
}
