//! Per-request context and the process-wide plan-approval registry.
//!
//! Distinct from [`crate::graph::RunContext`], which is the graph-internal handle
//! a [`Node`](crate::graph::Node) uses to emit [`StreamEvent`](crate::stream::StreamEvent)s
//! mid-node. `RunnerContext` is the caller-facing request context passed into
//! [`Runner::run`](super::Runner::run): who's asking, whether this is a debug/replay
//! run, and where the session's working directory lives.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// One external caller's request to run a turn.
#[derive(Clone, Debug)]
pub struct RunnerContext {
    pub session_id: String,
    pub working_dir: String,
    /// Debug-middleware level gate; the Runner itself doesn't interpret this beyond
    /// passing it through to middleware.
    pub debug: bool,
    /// Whether the caller wants token-by-token streaming (drives cache replay pacing)
    /// or is happy to receive events as fast as they're produced.
    pub stream: bool,
}

impl RunnerContext {
    pub fn new(session_id: impl Into<String>, working_dir: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            working_dir: working_dir.into(),
            debug: false,
            stream: true,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// The decision delivered to a suspended run awaiting plan sign-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub approved: bool,
}

/// Process-wide table of in-flight plan approvals, keyed by `plan_id`.
///
/// A run that suspends on `approval` registers a receiver here before emitting
/// `plan_approval_request`; an external endpoint resolving the decision (a POST
/// handler, a CLI prompt, a test) calls [`resolve`](Self::resolve) with the same
/// `plan_id`. Mirrors the `Mutex<HashMap<...>>` shape of
/// [`CompiledGraphCache`](crate::graph_config::CompiledGraphCache) rather than a
/// literal port of an `asyncio.Queue`-per-key table: a one-shot channel is the
/// idiomatic fit for "exactly one decision, ever, per registration".
#[derive(Default)]
pub struct PlanApprovalRegistry {
    pending: Mutex<HashMap<String, oneshot::Sender<ApprovalDecision>>>,
}

impl PlanApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `plan_id`, returning the receiving half the run will await.
    /// Replaces any prior unresolved registration for the same id (the run only
    /// ever has one outstanding approval wait per plan at a time).
    pub fn register(&self, plan_id: impl Into<String>) -> oneshot::Receiver<ApprovalDecision> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(plan_id.into(), tx);
        rx
    }

    /// Delivers a decision to the run waiting on `plan_id`. Returns `false` if
    /// nothing is registered under that id (already resolved, timed out, or never
    /// requested) -- the caller (an HTTP handler) should surface that as 404/409.
    pub fn resolve(&self, plan_id: &str, decision: ApprovalDecision) -> bool {
        match self.lock().remove(plan_id) {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self, plan_id: &str) -> bool {
        self.lock().contains_key(plan_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<ApprovalDecision>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_decision_to_registered_receiver() {
        let registry = PlanApprovalRegistry::new();
        let rx = registry.register("plan-1");

        assert!(registry.resolve("plan-1", ApprovalDecision { approved: true }));
        let decision = rx.await.unwrap();
        assert!(decision.approved);
    }

    #[test]
    fn resolve_unknown_plan_id_returns_false() {
        let registry = PlanApprovalRegistry::new();
        assert!(!registry.resolve("nope", ApprovalDecision { approved: false }));
    }

    #[test]
    fn is_pending_reflects_registration_and_resolution() {
        let registry = PlanApprovalRegistry::new();
        assert!(!registry.is_pending("p"));
        let _rx = registry.register("p");
        assert!(registry.is_pending("p"));
        registry.resolve("p", ApprovalDecision::default());
        assert!(!registry.is_pending("p"));
    }
}
