//! `agent` node: hand-written ReAct loop.
//!
//! Binds the configured tool set to the LLM, then loops: call the LLM (under an
//! overall timeout); if it returns no tool calls, the outcome is `respond` and the
//! node exits. Otherwise each tool call is located by name and invoked (under a
//! per-tool timeout, yielding `[ERROR] tool timed out (Ns)` on expiry). A
//! `plan_create` call is special-cased: its arguments become a [`Plan`] and the
//! node exits immediately with `agent_outcome = plan_create`. `max_iterations`
//! bounds the loop; hitting the cap forces a `respond` exit with a warn-log.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use crate::error::AgentError;
use crate::graph::{Next, Node, RunContext};
use crate::llm::{LlmClient, LlmResponse};
use crate::memory::RunnableConfig;
use crate::message::Message;
use crate::state::{AgentOutcome, AgentState, Plan};
use crate::stream::{ChunkToStreamSender, StreamEvent};
use crate::tool_source::ToolCallContext;
use crate::tools::Tool;

const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AgentNode {
    id: String,
    llm: Arc<dyn LlmClient>,
    tools: HashMap<String, Arc<dyn Tool>>,
    max_iterations: u32,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl AgentNode {
    pub fn new(id: impl Into<String>, llm: Arc<dyn LlmClient>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            id: id.into(),
            llm,
            tools: tools.into_iter().map(|t| (t.name().to_string(), t)).collect(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            llm_timeout: DEFAULT_OVERALL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    async fn invoke_tool(&self, name: &str, args: serde_json::Value, ctx: &ToolCallContext) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("[ERROR] tool not found: {name}");
        };
        match tokio::time::timeout(self.tool_timeout, tool.invoke(args, ctx)).await {
            Ok(content) => content.0,
            Err(_) => format!("[ERROR] tool timed out ({}s)", self.tool_timeout.as_secs()),
        }
    }

    /// Calls the LLM once, streaming tokens through `ctx` when it has a sink attached
    /// and surfacing `chat_model_start`/`chat_model_end` as [`StreamEvent::Custom`]
    /// around it so a live run's transport sees the same calls `on_chain_end` alone
    /// never would.
    async fn call_llm(
        &self,
        transcript: &[Message],
        ctx: &RunContext<AgentState>,
    ) -> Result<LlmResponse, AgentError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let system_prompt = transcript
            .iter()
            .find(|m| matches!(m.role, crate::message::Role::System))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        ctx.emit(StreamEvent::Custom(json!({
            "type": "chat_model_start",
            "call_id": call_id,
            "node": self.id,
            "model": self.llm.model_name(),
            "system_prompt": system_prompt,
            "messages": format!("{transcript:?}"),
        })));

        let result = match &ctx.stream_tx {
            Some(tx) => {
                let sender = ChunkToStreamSender::new(tx.clone(), self.id.clone());
                let (chunk_tx, chunk_rx) = sender.channel();
                let (response, ()) = tokio::join!(
                    self.llm.invoke_stream_with_tool_delta(transcript, Some(chunk_tx), None),
                    sender.forward(chunk_rx),
                );
                response
            }
            None => self.llm.invoke(transcript).await,
        };

        if let Ok(response) = &result {
            ctx.emit(StreamEvent::Custom(json!({
                "type": "chat_model_end",
                "call_id": call_id,
                "output": response.content,
                "usage": response.usage.as_ref().map(|u| json!({
                    "prompt_tokens": u.prompt_tokens,
                    "completion_tokens": u.completion_tokens,
                    "total_tokens": u.total_tokens,
                })),
            })));
        }

        result
    }

    async fn run_impl(&self, state: AgentState, ctx: &RunContext<AgentState>) -> Result<(AgentState, Next), AgentError> {
        let mut transcript = state.messages.clone();
        let mut new_messages = Vec::new();
        let mut outcome = AgentOutcome::Respond;
        let mut plan: Option<Plan> = None;
        let tool_ctx = ToolCallContext::new()
            .with_recent_messages(state.messages.clone())
            .with_thread_id(state.session_id.clone());

        let mut iterations = 0u32;
        while iterations < self.max_iterations {
            iterations += 1;

            let response = match tokio::time::timeout(self.llm_timeout, self.call_llm(&transcript, ctx)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    let error_message = Message::assistant(format!("[ERROR] LLM call failed: {e}"));
                    transcript.push(error_message.clone());
                    new_messages.push(error_message);
                    outcome = AgentOutcome::Respond;
                    break;
                }
                Err(_) => {
                    let error_message =
                        Message::assistant(format!("[ERROR] LLM call timed out ({}s)", self.llm_timeout.as_secs()));
                    transcript.push(error_message.clone());
                    new_messages.push(error_message);
                    outcome = AgentOutcome::Respond;
                    break;
                }
            };

            let assistant = if response.tool_calls.is_empty() {
                Message::assistant(response.content)
            } else {
                Message::assistant_with_tool_calls(response.content, response.tool_calls.clone())
            };
            transcript.push(assistant.clone());
            new_messages.push(assistant);

            if response.tool_calls.is_empty() {
                outcome = AgentOutcome::Respond;
                break;
            }

            let mut saw_plan_create = false;
            for call in &response.tool_calls {
                if call.name == "plan_create" {
                    let title = call
                        .args
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("untitled plan")
                        .to_string();
                    let steps = call
                        .args
                        .get("steps")
                        .and_then(|v| v.as_array())
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|s| s.as_str().map(|s| s.to_string()))
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    plan = Some(Plan::new(title, steps));
                    outcome = AgentOutcome::PlanCreate;
                    saw_plan_create = true;
                    continue;
                }

                ctx.emit(StreamEvent::Custom(json!({
                    "type": "tool_start",
                    "tool": call.name,
                    "input": call.args,
                })));
                let started = Instant::now();
                let result = self.invoke_tool(&call.name, call.args.clone(), &tool_ctx).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                ctx.emit(StreamEvent::Custom(json!({
                    "type": "tool_end",
                    "tool": call.name,
                    "output": result,
                    "duration_ms": duration_ms,
                })));

                let tool_message = Message::tool(call.id.clone(), result);
                transcript.push(tool_message.clone());
                new_messages.push(tool_message);
            }

            if saw_plan_create {
                break;
            }
        }

        if iterations >= self.max_iterations && outcome != AgentOutcome::PlanCreate {
            tracing::warn!(node = %self.id, max_iterations = self.max_iterations, "agent node hit iteration cap");
            outcome = AgentOutcome::Respond;
        }

        let mut update = state;
        update.messages = new_messages;
        update.agent_outcome = outcome;
        update.agent_iterations += iterations;
        if plan.is_some() {
            update.plan_data = plan;
        }

        Ok((update, Next::Continue))
    }
}

#[async_trait]
impl Node<AgentState> for AgentNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: AgentState) -> Result<(AgentState, Next), AgentError> {
        let ctx = RunContext::new(RunnableConfig::new(state.session_id.clone()));
        self.run_impl(state, &ctx).await
    }

    async fn run_with_context(
        &self,
        state: AgentState,
        ctx: &RunContext<AgentState>,
    ) -> Result<(AgentState, Next), AgentError> {
        self.run_impl(state, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn invoke(&self, _messages: &[Message]) -> Result<crate::llm::LlmResponse, AgentError> {
            Err(AgentError::Llm("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn respond_path_sets_outcome_respond() {
        let llm = Arc::new(MockLlm::with_no_tool_calls("hello there"));
        let node = AgentNode::new("agent", llm, vec![]);
        let state = AgentState::new("s1", "sys");

        let (update, next) = node.run(state).await.unwrap();
        assert_eq!(update.agent_outcome, AgentOutcome::Respond);
        assert_eq!(update.messages.len(), 1);
        assert_eq!(next, Next::Continue);
    }

    #[tokio::test]
    async fn plan_create_tool_call_builds_plan_and_sets_outcome() {
        let llm = Arc::new(MockLlm::with_tool_call(
            "plan_create",
            serde_json::json!({"title": "Ship it", "steps": ["build", "test"]}),
        ));
        let node = AgentNode::new("agent", llm, vec![]);
        let state = AgentState::new("s1", "sys");

        let (update, _) = node.run(state).await.unwrap();
        assert_eq!(update.agent_outcome, AgentOutcome::PlanCreate);
        let plan = update.plan_data.expect("plan should be set");
        assert_eq!(plan.title, "Ship it");
        assert_eq!(plan.steps.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_name_yields_error_message() {
        let llm = Arc::new(MockLlm::first_tool_then_end(
            "nonexistent_tool",
            serde_json::json!({}),
            "done",
        ));
        let node = AgentNode::new("agent", llm, vec![]);
        let state = AgentState::new("s1", "sys");

        let (update, _) = node.run(state).await.unwrap();
        let tool_msg = update
            .messages
            .iter()
            .find(|m| m.tool_call_id.is_some())
            .expect("should have a tool result message");
        assert!(tool_msg.content.starts_with("[ERROR] tool not found"));
    }

    #[tokio::test]
    async fn iteration_cap_forces_respond_outcome() {
        let llm = Arc::new(MockLlm::with_tool_call("fake", serde_json::json!({})));
        let node = AgentNode::new("agent", llm, vec![]).with_max_iterations(2);
        let state = AgentState::new("s1", "sys");

        let (update, _) = node.run(state).await.unwrap();
        assert_eq!(update.agent_outcome, AgentOutcome::Respond);
        assert_eq!(update.agent_iterations, 2);
    }

    #[tokio::test]
    async fn llm_failure_yields_error_message_and_respond_outcome_without_propagating() {
        let node = AgentNode::new("agent", Arc::new(FailingLlm), vec![]);
        let state = AgentState::new("s1", "sys");

        let (update, next) = node.run(state).await.unwrap();
        assert_eq!(update.agent_outcome, AgentOutcome::Respond);
        assert_eq!(next, Next::Continue);
        assert!(update.messages.last().unwrap().content.starts_with("[ERROR] LLM call failed"));
    }

    #[tokio::test]
    async fn run_with_context_emits_chat_model_start_and_end() {
        let llm = Arc::new(MockLlm::with_no_tool_calls("hello there"));
        let node = AgentNode::new("agent", llm, vec![]);
        let state = AgentState::new("s1", "sys");

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let ctx = RunContext::new(RunnableConfig::new("s1")).with_stream_tx(tx);

        let (update, _) = node.run_with_context(state, &ctx).await.unwrap();
        assert_eq!(update.agent_outcome, AgentOutcome::Respond);

        let mut saw_start = false;
        let mut saw_end = false;
        while let Ok(event) = rx.try_recv() {
            if let StreamEvent::Custom(value) = event {
                match value["type"].as_str() {
                    Some("chat_model_start") => saw_start = true,
                    Some("chat_model_end") => {
                        saw_end = true;
                        assert_eq!(value["output"], "hello there");
                    }
                    _ => {}
                }
            }
        }
        assert!(saw_start, "expected a chat_model_start event");
        assert!(saw_end, "expected a chat_model_end event");
    }
}
