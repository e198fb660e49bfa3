//! Protocol-level event types: the wire shape of one run's transport stream
//! (type + payload). Envelope (session_id, node_id, event_id) is applied
//! separately by [`crate::envelope`].
//!
//! Variants and field sets mirror `weft`'s external transport catalogue
//! (`token`, `tool_start`, ..., `done`). `weft` builds these either directly
//! (the typed LLM/tool events) or by deserializing a node's side-channel
//! `serde_json::Value` (`plan_created`, `plan_revised`, ...) back into the
//! matching variant here, since both already agree on the `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol event: wire shape for one stream event (type + payload).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Token {
        content: String,
    },
    ToolStart {
        tool: String,
        input: String,
        motivation: String,
    },
    ToolEnd {
        tool: String,
        output: String,
        cached: bool,
        duration_ms: Option<u64>,
    },
    LlmStart {
        call_id: String,
        node: String,
        model: String,
        input: String,
        motivation: String,
    },
    LlmEnd {
        call_id: String,
        node: String,
        model: String,
        duration_ms: u64,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        total_tokens: Option<u32>,
        tokens_estimated: bool,
        input: String,
        output: String,
        cost: Option<f64>,
        model_info: Option<String>,
    },
    /// Full plan object, emitted once the plan gate hands off to the executor loop.
    PlanCreated {
        plan: Value,
    },
    PlanUpdated {
        plan_id: String,
        #[serde(default)]
        step_id: Option<u32>,
        status: String,
    },
    PlanRevised {
        plan_id: String,
        #[serde(default)]
        revised_steps: Vec<String>,
        #[serde(default)]
        keep_completed: bool,
        #[serde(default)]
        reason: Option<String>,
    },
    PlanApprovalRequest {
        plan_id: String,
        title: String,
        steps: Vec<String>,
    },
    /// Tool-level approval request (distinct from `PlanApprovalRequest`).
    ApprovalRequest {
        request_id: String,
        tool: String,
        input: Value,
        risk_level: String,
    },
    /// Terminal: run finished, no further events follow.
    Done,
    Error {
        content: String,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Attempts to read a node-built side-channel value (`{"type": "...", ...}`)
    /// as one of the typed variants above. Returns `None` for anything that
    /// doesn't match a known `type` tag or field set (e.g. the
    /// memory-compression stream's own `progress`/`result`/`error` shapes,
    /// which are a separate, untyped stream).
    pub fn from_side_channel(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_round_trips_through_value() {
        let event = ProtocolEvent::Token {
            content: "hi".into(),
        };
        let value = event.to_value().unwrap();
        assert_eq!(value, json!({"type": "token", "content": "hi"}));
    }

    #[test]
    fn plan_created_carries_full_plan_object() {
        let plan = json!({"plan_id": "abc123", "title": "t", "steps": []});
        let event = ProtocolEvent::PlanCreated { plan: plan.clone() };
        let value = event.to_value().unwrap();
        assert_eq!(value["plan"], plan);
    }

    #[test]
    fn from_side_channel_parses_plan_updated_without_step_id() {
        let raw = json!({"type": "plan_updated", "plan_id": "p1", "status": "completed"});
        let event = ProtocolEvent::from_side_channel(&raw).unwrap();
        assert_eq!(
            event,
            ProtocolEvent::PlanUpdated {
                plan_id: "p1".into(),
                step_id: None,
                status: "completed".into(),
            }
        );
    }

    #[test]
    fn from_side_channel_parses_plan_updated_with_step_id() {
        let raw = json!({"type": "plan_updated", "plan_id": "p1", "step_id": 2, "status": "running"});
        let event = ProtocolEvent::from_side_channel(&raw).unwrap();
        assert_eq!(
            event,
            ProtocolEvent::PlanUpdated {
                plan_id: "p1".into(),
                step_id: Some(2),
                status: "running".into(),
            }
        );
    }

    #[test]
    fn from_side_channel_rejects_unknown_shape() {
        let raw = json!({"type": "progress", "category": "fact", "entries": 3});
        assert!(ProtocolEvent::from_side_channel(&raw).is_none());
    }

    #[test]
    fn done_and_error_have_no_extra_fields_beyond_spec() {
        assert_eq!(ProtocolEvent::Done.to_value().unwrap(), json!({"type": "done"}));
        let err = ProtocolEvent::Error {
            content: "boom".into(),
        };
        assert_eq!(err.to_value().unwrap(), json!({"type": "error", "content": "boom"}));
    }
}
