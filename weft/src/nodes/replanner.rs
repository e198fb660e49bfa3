//! `replanner` node: decides `continue | revise | finish` after each step.
//!
//! A cheap heuristic pre-check short-circuits the common cases before falling back
//! to an LLM structured-output call:
//! - no steps remain → `finish`
//! - the last step response looks like an error → ask the LLM to evaluate
//! - exactly one step remains → `continue`
//! - otherwise ask the LLM for `{action, response, revised_steps, reason}`
//!
//! `finish` marks any still-pending steps completed and appends the final response
//! (if the LLM supplied one) to graph state. `revise` replaces the remaining steps
//! (continuing the id sequence from `current_step_index + 1`) and emits
//! `plan_revised`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::state::{AgentState, ReplanAction, Step, StepStatus};

const ERROR_INDICATORS: &[&str] = &["[error]", "failed", "exception", "traceback"];

#[derive(Debug, Deserialize)]
struct ReplanDecision {
    action: ReplanActionWire,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    revised_steps: Vec<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReplanActionWire {
    Continue,
    Revise,
    Finish,
}

pub struct ReplannerNode {
    id: String,
    llm: Arc<dyn LlmClient>,
    skip_on_success: bool,
}

impl ReplannerNode {
    pub fn new(id: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            id: id.into(),
            llm,
            skip_on_success: false,
        }
    }

    /// When set, a successful step with more than one remaining step always
    /// continues without consulting the LLM at all.
    pub fn with_skip_on_success(mut self, skip: bool) -> Self {
        self.skip_on_success = skip;
        self
    }

    fn remaining(state: &AgentState) -> usize {
        state
            .plan_data
            .as_ref()
            .map(|p| p.steps.len().saturating_sub(state.current_step_index))
            .unwrap_or(0)
    }

    fn last_step_looks_like_error(state: &AgentState) -> bool {
        let Some((_, result)) = state.past_steps.last() else {
            return false;
        };
        let lower = result.to_lowercase();
        ERROR_INDICATORS.iter().any(|needle| lower.contains(needle))
    }

    async fn ask_llm(&self, state: &AgentState) -> Result<ReplanDecision, AgentError> {
        let plan_title = state.plan_data.as_ref().map(|p| p.title.as_str()).unwrap_or("");
        let history: String = state
            .past_steps
            .iter()
            .map(|(title, result)| format!("- {title}: {result}\n"))
            .collect();
        let remaining_titles: String = state
            .plan_data
            .as_ref()
            .map(|p| {
                p.steps[state.current_step_index..]
                    .iter()
                    .map(|s| s.title.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        let prompt = format!(
            "Plan: {plan_title}\nCompleted steps so far:\n{history}\nRemaining steps: {remaining_titles}\n\n\
             Decide whether to continue the plan as-is, revise the remaining steps, or finish now. \
             Respond with JSON: {{\"action\": \"continue\"|\"revise\"|\"finish\", \"response\": string|null, \
             \"revised_steps\": string[], \"reason\": string}}."
        );
        let messages = vec![Message::system(prompt)];
        let response = self
            .llm
            .invoke(&messages)
            .await
            .map_err(|e| AgentError::Node {
                node: self.id.clone(),
                source: Box::new(e),
            })?;

        serde_json::from_str(&response.content).or_else(|_| {
            // Fall back to treating an unparsable reply as "continue" rather than
            // failing the run outright.
            Ok(ReplanDecision {
                action: ReplanActionWire::Continue,
                response: Some(response.content),
                revised_steps: vec![],
                reason: None,
            })
        })
    }
}

#[async_trait]
impl Node<AgentState> for ReplannerNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: AgentState) -> Result<(AgentState, Next), AgentError> {
        let remaining = Self::remaining(&state);
        let mut update = state;
        update.messages = Vec::new();

        if remaining == 0 {
            update.replan_action = Some(ReplanAction::Finish);
            return Ok((update, Next::Continue));
        }

        if !Self::last_step_looks_like_error(&update) {
            if self.skip_on_success && remaining > 1 {
                update.replan_action = Some(ReplanAction::Continue);
                return Ok((update, Next::Continue));
            }
            if remaining == 1 {
                update.replan_action = Some(ReplanAction::Continue);
                return Ok((update, Next::Continue));
            }
        }

        let decision = self.ask_llm(&update).await?;

        match decision.action {
            ReplanActionWire::Continue => {
                update.replan_action = Some(ReplanAction::Continue);
            }
            ReplanActionWire::Finish => {
                if let Some(plan) = update.plan_data.as_mut() {
                    for step in plan.steps.iter_mut().filter(|s| s.status == StepStatus::Pending) {
                        step.status = StepStatus::Completed;
                    }
                }
                if let Some(response) = decision.response {
                    update.messages = vec![Message::assistant(response.clone())];
                    update.step_response = Some(response);
                }
                update.replan_action = Some(ReplanAction::Finish);
            }
            ReplanActionWire::Revise => {
                if let Some(plan) = update.plan_data.as_mut() {
                    let start_id = update.current_step_index as u32 + 1;
                    let next_id = plan.steps.iter().map(|s| s.id).max().unwrap_or(0) + 1;
                    // Steps before start_id (already completed or running) are kept as-is.
                    plan.steps.retain(|s| s.id < start_id);
                    let mut id = next_id.max(start_id);
                    for title in &decision.revised_steps {
                        plan.steps.push(Step::pending(id, title.clone()));
                        id += 1;
                    }
                    update.push_event(serde_json::json!({
                        "type": "plan_revised",
                        "plan_id": plan.plan_id,
                        "revised_steps": decision.revised_steps,
                        "keep_completed": true,
                        "reason": decision.reason,
                    }));
                }
                update.replan_action = Some(ReplanAction::Revise);
            }
        }

        Ok((update, Next::Continue))
    }
}
