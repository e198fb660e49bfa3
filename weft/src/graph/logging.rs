//! Structured tracing helpers for graph/node lifecycle events.
//!
//! Kept as free functions rather than embedded in `CompiledStateGraph::invoke` so
//! [`LoggingNodeMiddleware`](super::LoggingNodeMiddleware) and the runner can emit
//! the same shape of event from different call sites.

use std::fmt::Debug;

pub fn log_graph_start(thread_id: Option<&str>) {
    tracing::info!(thread_id, "graph run starting");
}

pub fn log_graph_complete(thread_id: Option<&str>, steps: usize) {
    tracing::info!(thread_id, steps, "graph run complete");
}

pub fn log_graph_error(thread_id: Option<&str>, error: &str) {
    tracing::error!(thread_id, error, "graph run failed");
}

pub fn log_node_start(node_id: &str) {
    tracing::debug!(node_id, "node starting");
}

pub fn log_node_complete(node_id: &str, next: &str) {
    tracing::debug!(node_id, next, "node complete");
}

pub fn log_state_update<S: Debug>(node_id: &str, state: &S) {
    tracing::trace!(node_id, state = ?state, "state updated");
}
