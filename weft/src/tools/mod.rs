//! Built-in tools and the registry that resolves a requested tool set.
//!
//! Each built-in implements [`Tool`]; [`ToolRegistry::resolve`] merges built-ins
//! with tools advertised by a dynamic [`ToolSource`](crate::tool_source::ToolSource)
//! (the `mcp` spec token) and de-duplicates by name, preserving first-appearance order.

mod dynamic;
mod fetch_url;
mod file_ops;
mod memory_tools;
mod plan_create;
mod python_repl;
mod rag_search;
mod registry;
mod terminal;

pub use fetch_url::FetchUrlTool;
pub use file_ops::{FileReadTool, FileWriteTool, GlobTool, ListDirTool};
pub use memory_tools::{MemoryBackend, MemorySearchTool, MemoryStoreHandle, MemoryWriteTool};
pub use plan_create::PlanCreateTool;
pub use python_repl::PythonReplTool;
pub use rag_search::{RagBackend, RagBackendHandle, RagSearchTool};
pub use registry::ToolRegistry;
pub use terminal::TerminalTool;

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

/// A named, invocable tool with a declared JSON-schema argument shape.
///
/// Implementations never return `Err` for ordinary failures (a missing file, a
/// failed command): per [`crate::error::AgentError`]'s doc comment, those are
/// folded into the returned [`ToolCallContent`] as a `[ERROR] ...` string so the
/// ReAct loop can keep going.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn invoke(&self, args: serde_json::Value, ctx: &ToolCallContext) -> ToolCallContent;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

/// Formats a missing/invalid argument as the conventional tool-error string.
pub(crate) fn arg_error(tool: &str, msg: impl std::fmt::Display) -> ToolCallContent {
    ToolCallContent::new(format!("[ERROR] {tool}: {msg}"))
}
