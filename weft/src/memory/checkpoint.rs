//! Minimal checkpoint record types backing [`crate::memory::checkpointer::Checkpointer`].
//!
//! Deliberately narrower than a full LangGraph-parity checkpoint model: one
//! snapshot of `AgentState` per `(thread_id, checkpoint_id)`, no channel versioning or
//! pending-writes ledger, since resumable state across an interrupt is all that's needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single persisted snapshot of graph state for one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    pub checkpoint_id: String,
    pub state: S,
    pub created_at: DateTime<Utc>,
}

impl<S> Checkpoint<S> {
    pub fn new(checkpoint_id: impl Into<String>, state: S, created_at: DateTime<Utc>) -> Self {
        Self {
            checkpoint_id: checkpoint_id.into(),
            state,
            created_at,
        }
    }
}

/// Metadata describing why a checkpoint was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub thread_id: String,
    pub step: u64,
    pub reason: CheckpointReason,
}

/// Why this checkpoint exists: ordinary step progress, or an interrupt suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Step,
    Interrupt,
}

/// Summary row returned by [`crate::memory::checkpointer::Checkpointer::list`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointListItem {
    pub checkpoint_id: String,
    pub created_at: DateTime<Utc>,
    pub metadata: CheckpointMetadata,
}
