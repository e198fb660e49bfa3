//! `rag_search` built-in: retrieves relevant passages from the `knowledge/` corpus.
//!
//! Decoupled from the indexing/embedding implementation via [`RagBackend`], the
//! same shape [`crate::tools::MemoryBackend`] uses for memory tools: the tool
//! registry can be built before a concrete index exists, and the runner wires
//! one in at startup.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

/// Seam the knowledge index implements to back `rag_search`.
#[async_trait]
pub trait RagBackend: Send + Sync {
    /// Returns up to `top_k` passages from the knowledge corpus relevant to `query`.
    async fn search(&self, query: &str, top_k: usize) -> Vec<String>;
}

pub type RagBackendHandle = Arc<dyn RagBackend>;

pub struct RagSearchTool {
    backend: RagBackendHandle,
}

impl RagSearchTool {
    pub fn new(backend: RagBackendHandle) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Searches the knowledge corpus for passages relevant to a query."
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
            return arg_error("rag_search", "missing required string arg `query`");
        };
        let top_k = args.get("top_k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let hits = self.backend.search(query, top_k).await;
        if hits.is_empty() {
            ToolCallContent::new("no matching passages")
        } else {
            ToolCallContent::new(hits.join("\n---\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend;

    #[async_trait]
    impl RagBackend for FakeBackend {
        async fn search(&self, query: &str, _top_k: usize) -> Vec<String> {
            vec![format!("matched: {query}")]
        }
    }

    #[tokio::test]
    async fn search_returns_backend_hits() {
        let tool = RagSearchTool::new(Arc::new(FakeBackend));
        let result = tool
            .invoke(serde_json::json!({"query": "onboarding"}), &ToolCallContext::new())
            .await;
        assert_eq!(result.as_str(), "matched: onboarding");
    }

    #[tokio::test]
    async fn missing_query_arg_is_an_error() {
        let tool = RagSearchTool::new(Arc::new(FakeBackend));
        let result = tool.invoke(serde_json::json!({}), &ToolCallContext::new()).await;
        assert!(result.as_str().starts_with("[ERROR]"));
    }
}
