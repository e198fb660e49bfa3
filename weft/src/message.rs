//! Conversation messages.
//!
//! A message carries a stable `id` so the graph's message reducer (see
//! [`state::agent_state`](crate::state)) can replace an in-flight message (e.g. a
//! streaming assistant reply) in place instead of appending a duplicate.

use serde::{Deserialize, Serialize};

/// A single tool call requested by the assistant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// One conversation turn.
///
/// `id` is assigned at construction (see [`Message::new_id`]) and is stable across
/// replacement: a node may emit a message carrying the same `id` as one already present
/// in `AgentState::messages` to replace it (streaming token accumulation, a corrected
/// tool result) rather than appending a new turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Message {
    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Builds a stable system-prompt message id ("msg-system-prompt"), so re-assembled
    /// prompts replace `messages[0]` in place.
    pub fn system_with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_messages_get_distinct_ids() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn tool_message_carries_call_id() {
        let m = Message::tool("call-1", "result");
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(m.role, Role::Tool);
    }
}
