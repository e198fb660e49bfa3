//! Top-level error type for agent, node, and tool execution.

use thiserror::Error;

/// Error surfaced by a [`Node`](crate::graph::Node), [`Agent`](crate::traits::Agent), or
/// the [`Runner`](crate::runner::Runner).
///
/// Tool failures, classifier denials, and timeouts are deliberately **not** represented
/// here: those are folded into a string tool result (`[ERROR] ...`,
/// `⛔ Operation denied: ...`) so a ReAct loop can keep going. `AgentError` is reserved for
/// failures that should stop the current node/run outright (LLM transport failure after
/// retries, a broken graph, storage corruption that could not be downgraded to empty state).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm error: {0}")]
    Llm(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("node {node} failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error("graph runtime error: {0}")]
    Graph(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("other: {0}")]
    Other(String),
}

impl AgentError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
