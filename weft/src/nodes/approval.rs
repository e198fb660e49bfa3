//! `approval` node: gates a created plan behind human sign-off.
//!
//! On first visit (no matching resolution yet in `pending_events`) it records an
//! `approval_requested` event and suspends the run via `Next::End`; the caller
//! resolves the request out-of-band and re-invokes
//! the graph at this node with an `approval_resolved` event appended to state.
//! Denial clears the plan and appends a message declining to execute it.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{GraphInterrupt, Next, Node};
use crate::message::Message;
use crate::state::AgentState;

pub struct ApprovalNode {
    id: String,
}

impl ApprovalNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for ApprovalNode {
    fn default() -> Self {
        Self::new("approval")
    }
}

fn find_resolution(events: &[serde_json::Value], plan_id: &str) -> Option<bool> {
    events.iter().rev().find_map(|event| {
        if event.get("type").and_then(|v| v.as_str()) != Some("approval_resolved") {
            return None;
        }
        if event.get("plan_id").and_then(|v| v.as_str()) != Some(plan_id) {
            return None;
        }
        event.get("approved").and_then(|v| v.as_bool())
    })
}

#[async_trait]
impl Node<AgentState> for ApprovalNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: AgentState) -> Result<(AgentState, Next), AgentError> {
        let plan_id = state
            .plan_data
            .as_ref()
            .map(|p| p.plan_id.clone())
            .unwrap_or_default();

        match find_resolution(&state.pending_events, &plan_id) {
            None => {
                let mut update = state;
                update.messages = Vec::new();
                let interrupt = GraphInterrupt::new(
                    self.id.clone(),
                    serde_json::json!({"type": "approval_requested", "plan_id": plan_id}),
                );
                update.push_event(serde_json::json!({
                    "type": "approval_requested",
                    "plan_id": interrupt.payload["plan_id"],
                }));
                Ok((update, Next::End))
            }
            Some(true) => {
                let mut update = state;
                update.messages = Vec::new();
                Ok((update, Next::Continue))
            }
            Some(false) => {
                let mut update = state;
                update.clear_plan();
                update.messages = vec![Message::assistant("用户已拒绝执行该计划。")];
                Ok((update, Next::End))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Plan;

    fn state_with_plan() -> AgentState {
        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(Plan::new("t", vec!["a".into()]));
        state
    }

    #[tokio::test]
    async fn no_resolution_suspends_with_request_event() {
        let node = ApprovalNode::default();
        let (update, next) = node.run(state_with_plan()).await.unwrap();
        assert_eq!(next, Next::End);
        assert!(update
            .pending_events
            .iter()
            .any(|e| e["type"] == "approval_requested"));
    }

    #[tokio::test]
    async fn approved_resolution_continues() {
        let mut state = state_with_plan();
        let plan_id = state.plan_data.as_ref().unwrap().plan_id.clone();
        state.push_event(serde_json::json!({
            "type": "approval_resolved",
            "approved": true,
            "plan_id": plan_id,
        }));

        let node = ApprovalNode::default();
        let (update, next) = node.run(state).await.unwrap();
        assert_eq!(next, Next::Continue);
        assert!(update.plan_data.is_some());
    }

    #[tokio::test]
    async fn denied_resolution_clears_plan_and_ends() {
        let mut state = state_with_plan();
        let plan_id = state.plan_data.as_ref().unwrap().plan_id.clone();
        state.push_event(serde_json::json!({
            "type": "approval_resolved",
            "approved": false,
            "plan_id": plan_id,
        }));

        let node = ApprovalNode::default();
        let (update, next) = node.run(state).await.unwrap();
        assert_eq!(next, Next::End);
        assert!(update.plan_data.is_none());
        assert_eq!(update.messages.len(), 1);
    }
}
