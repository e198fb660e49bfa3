//! Tool specs and the per-call context passed to a tool invocation.
//!
//! A tool is described by a [`ToolSpec`] (name, description, JSON-schema args) and
//! invoked with a [`ToolCallContext`] carrying the run's recent history, stream
//! writer, and identity. `ToolSource` is the seam for a dynamic tool provider (the
//! `mcp` resolve token) to contribute named tools alongside the built-ins.

use async_trait::async_trait;

use crate::message::Message;
use crate::stream::ToolStreamWriter;

/// Declared shape of a tool: name, human description, and JSON-schema args.
///
/// Immutable after registration. Sent to the LLM as a function/tool definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// A tool's result, returned to the graph as a tool message's content.
///
/// Kept as a newtype (rather than a bare `String`) so the permission gate and
/// cache decorator can prefix/annotate it (`[ERROR] ...`, `[CACHE_HIT]...`)
/// without losing the fact that it is tool output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallContent(pub String);

impl ToolCallContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ToolCallContent {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ToolCallContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call context threaded into a tool invocation.
///
/// Gives a tool (e.g. `memory_search`, a shell runner streaming stdout) access to
/// the conversation so far, a way to emit intermediate output, and the run's
/// identity for scoping (session-local file roots, per-user memory).
#[derive(Clone, Debug, Default)]
pub struct ToolCallContext {
    pub recent_messages: Vec<Message>,
    pub stream_writer: Option<ToolStreamWriter>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
}

impl ToolCallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recent_messages(mut self, messages: Vec<Message>) -> Self {
        self.recent_messages = messages;
        self
    }

    pub fn with_stream_writer(mut self, writer: ToolStreamWriter) -> Self {
        self.stream_writer = Some(writer);
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Errors from listing or resolving tools. Distinct from tool *execution* failures,
/// which are folded into a `ToolCallContent` string (see [`crate::error::AgentError`]).
#[derive(Debug, thiserror::Error)]
pub enum ToolSourceError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool source unavailable: {0}")]
    Unavailable(String),
}

/// A provider of named, invocable tools.
///
/// Implemented by the built-in registry and by any dynamic tool provider (e.g. an
/// external MCP-style transport) so both can
/// be merged by [`crate::tools::ToolRegistry::resolve`].
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Lists every tool this source can provide, for advertising to the LLM.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    /// Invokes one named tool with the given arguments and call context.
    async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolCallContext,
    ) -> Result<ToolCallContent, ToolSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_content_displays_inner_string() {
        let c = ToolCallContent::new("hello");
        assert_eq!(c.to_string(), "hello");
        assert_eq!(c.as_str(), "hello");
    }

    #[test]
    fn tool_call_context_builder_sets_fields() {
        let ctx = ToolCallContext::new()
            .with_thread_id("t-1")
            .with_user_id("u-1");
        assert_eq!(ctx.thread_id.as_deref(), Some("t-1"));
        assert_eq!(ctx.user_id.as_deref(), Some("u-1"));
        assert!(ctx.recent_messages.is_empty());
    }
}
