//! Human-in-the-loop suspension: a node raises
//! [`GraphInterrupt`] to pause a run; the caller resumes later with a fresh invoke
//! against the same thread_id, pinned to the checkpoint written at suspension.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

/// Raised by a node to suspend the run and hand a payload back to the caller
/// (e.g. a pending tool call awaiting approval).
#[derive(Debug, Clone)]
pub struct GraphInterrupt {
    pub node_id: String,
    pub payload: Value,
}

impl GraphInterrupt {
    pub fn new(node_id: impl Into<String>, payload: Value) -> Self {
        Self {
            node_id: node_id.into(),
            payload,
        }
    }
}

/// What happens when a node raises [`GraphInterrupt`] mid-run.
///
/// `DefaultInterruptHandler` simply returns the interrupt to the caller of
/// `invoke`; a caller can register a different handler (e.g. one that blocks on
/// an external approval queue) via `StateGraph::with_interrupt_handler`.
#[async_trait]
pub trait InterruptHandler: Send + Sync {
    /// Called when a node raises an interrupt. Returning `Ok(None)` resumes the run
    /// immediately with no injected value; `Ok(Some(value))` resumes with a resolved
    /// value available to the node on its next invocation; `Err` propagates as a graph error.
    async fn on_interrupt(&self, interrupt: &GraphInterrupt) -> Result<Option<Value>, String>;
}

/// Interrupt handler that performs no side effects; the interrupt simply surfaces
/// to the caller of `invoke` as `Interrupt`.
#[derive(Debug, Default)]
pub struct DefaultInterruptHandler;

#[async_trait]
impl InterruptHandler for DefaultInterruptHandler {
    async fn on_interrupt(&self, _interrupt: &GraphInterrupt) -> Result<Option<Value>, String> {
        Ok(None)
    }
}

/// Outcome of `CompiledStateGraph::invoke` when a node suspended the run.
#[derive(Debug, Clone)]
pub struct Interrupt<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub interrupt: GraphInterrupt,
    pub state: S,
}
