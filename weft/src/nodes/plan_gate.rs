//! `plan_gate` node: pure transition between `agent` and the executor loop.
//!
//! Resets `current_step_index`, builds `plan_context` by walking the accumulated
//! transcript for user requests, tool results (truncated to 500 chars), and agent
//! analysis (truncated to 300 chars), and emits a `plan_created` side-channel event.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::message::Role;
use crate::state::AgentState;

pub struct PlanGateNode {
    id: String,
}

impl PlanGateNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for PlanGateNode {
    fn default() -> Self {
        Self::new("plan_gate")
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn build_plan_context(state: &AgentState) -> String {
    let mut lines = Vec::new();
    for message in &state.messages {
        match message.role {
            Role::User => lines.push(format!("User request: {}", truncate_chars(&message.content, 500))),
            Role::Tool => lines.push(format!("Tool result: {}", truncate_chars(&message.content, 500))),
            Role::Assistant if !message.content.is_empty() => {
                lines.push(format!("Agent analysis: {}", truncate_chars(&message.content, 300)))
            }
            _ => {}
        }
    }
    lines.join("\n")
}

#[async_trait]
impl Node<AgentState> for PlanGateNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: AgentState) -> Result<(AgentState, Next), AgentError> {
        let plan = state.plan_data.clone();

        let mut update = state;
        update.messages = Vec::new();
        update.current_step_index = 0;
        update.plan_context = build_plan_context(&update);
        update.push_event(serde_json::json!({
            "type": "plan_created",
            "plan": plan,
        }));

        Ok((update, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::state::Plan;

    #[tokio::test]
    async fn resets_step_index_and_builds_context() {
        let mut state = AgentState::new("s1", "sys");
        state.current_step_index = 3;
        state.plan_data = Some(Plan::new("t", vec!["a".into()]));
        state.messages.push(Message::user("do the thing"));
        state.messages.push(Message::assistant("I'll plan this out"));

        let node = PlanGateNode::default();
        let (update, _) = node.run(state).await.unwrap();

        assert_eq!(update.current_step_index, 0);
        assert!(update.plan_context.contains("User request: do the thing"));
        assert!(update.plan_context.contains("Agent analysis: I'll plan this out"));
        assert_eq!(update.pending_events.len(), 1);
    }
}
