//! `memory_search` / `memory_write` built-ins.
//!
//! Decoupled from the long-term memory implementation via [`MemoryBackend`] so the
//! tool registry can be built before that subsystem exists; the runner wires a
//! concrete backend in at startup.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

/// Seam the long-term memory store implements to back the memory tools.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Returns up to `top_k` memory contents relevant to `query`.
    async fn search(&self, query: &str, top_k: usize) -> Vec<String>;

    /// Records a new memory entry; returns its assigned id.
    async fn write(&self, category: &str, content: &str) -> Result<String, String>;
}

pub type MemoryStoreHandle = Arc<dyn MemoryBackend>;

pub struct MemorySearchTool {
    backend: MemoryStoreHandle,
}

impl MemorySearchTool {
    pub fn new(backend: MemoryStoreHandle) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Searches long-term memory for entries relevant to a query."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "top_k": {"type": "integer", "default": 5}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return arg_error("memory_search", "missing required string arg `query`");
        };
        let top_k = args.get("top_k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let hits = self.backend.search(query, top_k).await;
        if hits.is_empty() {
            ToolCallContent::new("no matching memories")
        } else {
            ToolCallContent::new(hits.join("\n---\n"))
        }
    }
}

pub struct MemoryWriteTool {
    backend: MemoryStoreHandle,
}

impl MemoryWriteTool {
    pub fn new(backend: MemoryStoreHandle) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "memory_write"
    }

    fn description(&self) -> &str {
        "Records a new long-term memory entry under a category (preferences, facts, tasks, reflections, procedural, general)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["category", "content"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(category) = args.get("category").and_then(|v| v.as_str()) else {
            return arg_error("memory_write", "missing required string arg `category`");
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return arg_error("memory_write", "missing required string arg `content`");
        };

        match self.backend.write(category, content).await {
            Ok(id) => ToolCallContent::new(format!("stored memory {id}")),
            Err(e) => ToolCallContent::new(format!("[ERROR] memory_write: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend;

    #[async_trait]
    impl MemoryBackend for FakeBackend {
        async fn search(&self, query: &str, _top_k: usize) -> Vec<String> {
            vec![format!("matched: {query}")]
        }

        async fn write(&self, _category: &str, _content: &str) -> Result<String, String> {
            Ok("mem-1".to_string())
        }
    }

    #[tokio::test]
    async fn search_returns_backend_hits() {
        let tool = MemorySearchTool::new(Arc::new(FakeBackend));
        let result = tool
            .invoke(serde_json::json!({"query": "coffee"}), &ToolCallContext::new())
            .await;
        assert_eq!(result.as_str(), "matched: coffee");
    }

    #[tokio::test]
    async fn write_returns_assigned_id() {
        let tool = MemoryWriteTool::new(Arc::new(FakeBackend));
        let result = tool
            .invoke(
                serde_json::json!({"category": "facts", "content": "likes coffee"}),
                &ToolCallContext::new(),
            )
            .await;
        assert_eq!(result.as_str(), "stored memory mem-1");
    }
}
