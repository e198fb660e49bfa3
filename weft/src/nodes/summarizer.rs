//! `summarizer` node: produces the final user-facing response once a plan
//! finishes, then clears the plan from state.
//!
//! Assembles a digest of `past_steps` (`## 步骤 i [title]: result`), asks the LLM
//! for a final summary grounded in that digest, appends the summary as an
//! assistant message, marks any still-pending steps completed (`plan_updated`),
//! and clears the plan via [`AgentState::clear_plan`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::state::{AgentState, StepStatus};

pub struct SummarizerNode {
    id: String,
    llm: Arc<dyn LlmClient>,
}

impl SummarizerNode {
    pub fn new(id: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self { id: id.into(), llm }
    }

    fn build_digest(state: &AgentState) -> String {
        let mut digest = String::new();
        for (i, (title, result)) in state.past_steps.iter().enumerate() {
            digest.push_str(&format!("## 步骤 {} [{}]: {}\n", i + 1, title, result));
        }
        digest
    }
}

#[async_trait]
impl Node<AgentState> for SummarizerNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: AgentState) -> Result<(AgentState, Next), AgentError> {
        let digest = Self::build_digest(&state);
        let plan_title = state.plan_data.as_ref().map(|p| p.title.as_str()).unwrap_or("");
        let prompt = format!(
            "Plan \"{plan_title}\" has finished. Step results:\n\n{digest}\n\
             Write a concise final summary for the user covering what was done and the outcome."
        );

        let response = self
            .llm
            .invoke(&[Message::system(prompt)])
            .await
            .map_err(|e| AgentError::Node {
                node: self.id.clone(),
                source: Box::new(e),
            })?;

        let mut update = state;
        let plan_id = update.plan_data.as_ref().map(|p| p.plan_id.clone());
        if let Some(plan) = update.plan_data.as_mut() {
            for step in plan.steps.iter_mut().filter(|s| s.status != StepStatus::Completed) {
                step.status = StepStatus::Completed;
            }
        }
        if let Some(plan_id) = plan_id {
            update.push_event(serde_json::json!({
                "type": "plan_updated",
                "plan_id": plan_id,
                "status": "completed",
            }));
        }

        update.messages = vec![Message::assistant(response.content)];
        update.clear_plan();

        Ok((update, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::state::Plan;

    #[tokio::test]
    async fn summarizes_and_clears_plan() {
        let llm = Arc::new(MockLlm::with_no_tool_calls("All steps completed successfully."));
        let node = SummarizerNode::new("summarizer", llm);

        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(Plan::new("Ship it", vec!["build".into(), "test".into()]));
        state.record_step_result("build".into(), "built ok".into());
        state.record_step_result("test".into(), "tests passed".into());

        let (update, next) = node.run(state).await.unwrap();
        assert_eq!(next, Next::Continue);
        assert!(update.plan_data.is_none());
        assert_eq!(update.current_step_index, 0);
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].content, "All steps completed successfully.");
        assert!(update.pending_events.iter().any(|e| e["status"] == "completed"));
    }
}
