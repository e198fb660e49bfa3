//! `AgentState`: the graph state shared by every node.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::channels::StateUpdater;
use crate::message::Message;
use crate::state::plan::Plan;

/// What the `agent` node decided at the end of its ReAct loop.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    #[default]
    None,
    Respond,
    PlanCreate,
}

/// What the `replanner` node decided after a step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplanAction {
    Continue,
    Revise,
    Finish,
}

/// A side-channel event appended by any node; consumed by the
/// [`EventStreamAdapter`](crate::stream::EventStreamAdapter).
pub type PendingEvent = JsonValue;

/// Shared graph state. `messages[0]` is always the system prompt, with the stable
/// id `"msg-system-prompt"` (see [`Message::system_with_id`]) so prompt rebuilds replace
/// it in place instead of growing the transcript.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub session_id: String,
    pub system_prompt: String,

    pub agent_outcome: AgentOutcome,
    pub agent_iterations: u32,

    pub plan_data: Option<Plan>,
    pub current_step_index: usize,
    pub past_steps: Vec<(String, String)>,

    pub step_response: Option<String>,
    pub replan_action: Option<ReplanAction>,

    pub pending_events: Vec<PendingEvent>,
    pub plan_context: String,
}

impl AgentState {
    pub fn new(session_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system_with_id(
                "msg-system-prompt",
                system_prompt.clone(),
            )],
            session_id: session_id.into(),
            system_prompt,
            ..Default::default()
        }
    }

    /// Append-with-id-replacement. A message whose id matches one
    /// already present replaces it in place; otherwise it is appended.
    pub fn append_messages(&mut self, new_messages: Vec<Message>) {
        for m in new_messages {
            if let Some(existing) = self.messages.iter_mut().find(|e| e.id == m.id) {
                *existing = m;
            } else {
                self.messages.push(m);
            }
        }
    }

    /// Invariant: `len(past_steps) == current_step_index`.
    pub fn record_step_result(&mut self, step_title: String, result: String) {
        let truncated: String = result.chars().take(1000).collect();
        self.past_steps.push((step_title, truncated));
        self.current_step_index += 1;
    }

    /// Clearing the plan resets step counters atomically.
    pub fn clear_plan(&mut self) {
        self.plan_data = None;
        self.current_step_index = 0;
        self.past_steps.clear();
    }

    pub fn push_event(&mut self, event: JsonValue) {
        self.pending_events.push(event);
    }
}

/// Field-by-field merge of a node's partial `AgentState` into the running state.
///
/// Nodes return only the fields they touched (typically just `messages` plus whatever
/// is specific to that node); this updater is the `AgentState` analogue of
/// [`channels::FieldBasedUpdater`](crate::channels::FieldBasedUpdater), replacing the
/// graph's default whole-state replace so `messages` accumulates (via
/// [`AgentState::append_messages`]) instead of being clobbered.
#[derive(Debug, Default)]
pub struct AgentStateUpdater;

impl StateUpdater<AgentState> for AgentStateUpdater {
    fn apply_update(&self, current: &mut AgentState, update: &AgentState) {
        current.append_messages(update.messages.clone());
        current.session_id = update.session_id.clone();
        if !update.system_prompt.is_empty() {
            current.system_prompt = update.system_prompt.clone();
        }
        current.agent_outcome = update.agent_outcome;
        current.agent_iterations = update.agent_iterations;
        current.plan_data = update.plan_data.clone();
        current.current_step_index = update.current_step_index;
        current.past_steps = update.past_steps.clone();
        current.step_response = update.step_response.clone();
        current.replan_action = update.replan_action;
        current.pending_events.extend(update.pending_events.clone());
        if !update.plan_context.is_empty() {
            current.plan_context = update.plan_context.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Append-with-id-replacement, matching `append_messages`.
    #[test]
    fn append_messages_replaces_same_id_in_place() {
        let mut state = AgentState::new("s1", "sys");
        let assistant = Message::assistant("partial");
        state.append_messages(vec![assistant.clone()]);
        let len_before = state.messages.len();

        let mut replaced = assistant.clone();
        replaced.content = "complete".to_string();
        state.append_messages(vec![replaced]);

        assert_eq!(state.messages.len(), len_before);
        assert_eq!(state.messages.last().unwrap().content, "complete");
    }

    #[test]
    fn clear_plan_resets_index_and_past_steps_together() {
        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(Plan::new("t", vec!["a".into()]));
        state.record_step_result("a".into(), "ok".into());
        assert_eq!(state.current_step_index, 1);

        state.clear_plan();
        assert!(state.plan_data.is_none());
        assert_eq!(state.current_step_index, 0);
        assert!(state.past_steps.is_empty());
    }

    #[test]
    fn updater_accumulates_messages_across_partial_updates() {
        let updater = AgentStateUpdater;
        let mut current = AgentState::new("s1", "sys");
        let mut update = AgentState::default();
        update.messages.push(Message::user("hello"));
        updater.apply_update(&mut current, &update);
        assert_eq!(current.messages.len(), 2);
    }
}
