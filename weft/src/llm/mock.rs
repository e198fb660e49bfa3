//! Mock LLM for tests and examples.
//!
//! Returns fixed assistant message and optional fixed tool call; configurable
//! "no tool_calls" to test END path. Optional stateful mode for multi-round.
//!
//! # Streaming Support
//!
//! `MockLlm` implements `invoke_stream()` with configurable streaming behavior:
//! - Default: sends content as a single chunk (efficient for most tests)
//! - Character-by-character: splits content into individual character chunks (for stream testing)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::llm::{LlmClient, LlmResponse};
use crate::message::{Message, ToolCallRequest};
use crate::stream::MessageChunk;

/// Mock LLM: fixed assistant text and optional tool_calls.
///
/// Configurable to return one fixed tool call or none, so the graph can run
/// one full round (agent -> tool -> agent) or end immediately. Used by the
/// `agent` node in tests. Optional stateful mode: first call returns
/// tool_calls, second returns none (multi-round).
///
/// **Interaction**: Implements `LlmClient`; used by the `agent` node.
pub struct MockLlm {
    content: String,
    tool_calls: Vec<ToolCallRequest>,
    call_count: Option<AtomicUsize>,
    second_content: Option<String>,
    stream_by_char: AtomicBool,
}

impl MockLlm {
    /// Creates a mock that returns one assistant message and one tool call.
    pub fn with_tool_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            content: "calling a tool".to_string(),
            tool_calls: vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: name.into(),
                args,
            }],
            call_count: None,
            second_content: None,
            stream_by_char: AtomicBool::new(false),
        }
    }

    /// Creates a mock that returns assistant text and no tool_calls (END path).
    pub fn with_no_tool_calls(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            call_count: None,
            second_content: None,
            stream_by_char: AtomicBool::new(false),
        }
    }

    /// Creates a mock with custom content and tool_calls.
    pub fn new(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            call_count: None,
            second_content: None,
            stream_by_char: AtomicBool::new(false),
        }
    }

    /// Creates a stateful mock: first invoke() returns a tool call, second returns none.
    pub fn first_tool_then_end(
        name: impl Into<String>,
        args: serde_json::Value,
        final_content: impl Into<String>,
    ) -> Self {
        Self {
            content: "calling a tool".to_string(),
            tool_calls: vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: name.into(),
                args,
            }],
            call_count: Some(AtomicUsize::new(0)),
            second_content: Some(final_content.into()),
            stream_by_char: AtomicBool::new(false),
        }
    }

    /// Enable character-by-character streaming for `invoke_stream()`.
    pub fn with_stream_by_char(self) -> Self {
        self.stream_by_char.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, AgentError> {
        let (content, tool_calls) = match &self.call_count {
            Some(c) => {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    (self.content.clone(), self.tool_calls.clone())
                } else {
                    (
                        self.second_content
                            .as_deref()
                            .unwrap_or(&self.content)
                            .to_string(),
                        vec![],
                    )
                }
            }
            None => (self.content.clone(), self.tool_calls.clone()),
        };
        Ok(LlmResponse {
            content,
            tool_calls,
            usage: None,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, AgentError> {
        let response = self.invoke(messages).await?;

        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                if self.stream_by_char.load(Ordering::SeqCst) {
                    for c in response.content.chars() {
                        let _ = tx
                            .send(MessageChunk {
                                content: c.to_string(),
                            })
                            .await;
                    }
                } else {
                    let _ = tx
                        .send(MessageChunk {
                            content: response.content.clone(),
                        })
                        .await;
                }
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_no_tool_calls_returns_empty_tool_calls() {
        let llm = MockLlm::with_no_tool_calls("hi there");
        let resp = llm.invoke(&[]).await.unwrap();
        assert_eq!(resp.content, "hi there");
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn with_tool_call_returns_one_tool_call() {
        let llm = MockLlm::with_tool_call("get_time", serde_json::json!({}));
        let resp = llm.invoke(&[]).await.unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "get_time");
    }

    #[tokio::test]
    async fn first_tool_then_end_alternates_responses() {
        let llm = MockLlm::first_tool_then_end("get_time", serde_json::json!({}), "done");
        let first = llm.invoke(&[]).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        let second = llm.invoke(&[]).await.unwrap();
        assert!(second.tool_calls.is_empty());
        assert_eq!(second.content, "done");
    }

    #[tokio::test]
    async fn stream_by_char_sends_one_chunk_per_character() {
        let llm = MockLlm::with_no_tool_calls("hi").with_stream_by_char();
        let (tx, mut rx) = mpsc::channel(8);
        llm.invoke_stream(&[], Some(tx)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().content, "h");
        assert_eq!(rx.recv().await.unwrap().content, "i");
    }
}
