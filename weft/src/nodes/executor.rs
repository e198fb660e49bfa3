//! `executor` node: runs one plan step through a scoped-down ReAct loop.
//!
//! The inner loop mirrors [`AgentNode`](super::agent::AgentNode) but operates over a
//! private transcript that is never persisted to graph state; only a single
//! summary message (`[步骤 i/N - title] ...`, ≤500 chars) reaches `AgentState`.
//! Emits `plan_updated` side-events on entry (`running`) and exit
//! (`completed`/`failed`), and records `(title, response[:1000])` into `past_steps`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use crate::error::AgentError;
use crate::graph::{Next, Node, RunContext};
use crate::llm::{LlmClient, LlmResponse};
use crate::memory::RunnableConfig;
use crate::message::Message;
use crate::state::AgentState;
use crate::stream::{ChunkToStreamSender, StreamEvent};
use crate::tool_source::ToolCallContext;
use crate::tools::Tool;

const DEFAULT_MAX_ITERATIONS: u32 = 6;
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const PRIOR_STEP_TRUNCATE: usize = 300;
const SUMMARY_TRUNCATE: usize = 500;

pub struct ExecutorNode {
    id: String,
    llm: Arc<dyn LlmClient>,
    tools: HashMap<String, Arc<dyn Tool>>,
    max_iterations: u32,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl ExecutorNode {
    pub fn new(id: impl Into<String>, llm: Arc<dyn LlmClient>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            id: id.into(),
            llm,
            tools: tools.into_iter().map(|t| (t.name().to_string(), t)).collect(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn build_prompt(&self, state: &AgentState, step_title: &str) -> String {
        let mut prompt = format!("{}\n\nPlan: {}\nCurrent step: {}\n", state.system_prompt, plan_title(state), step_title);
        if !state.past_steps.is_empty() {
            prompt.push_str("\nPrior steps:\n");
            for (title, result) in &state.past_steps {
                let truncated: String = result.chars().take(PRIOR_STEP_TRUNCATE).collect();
                prompt.push_str(&format!("- {title}: {truncated}\n"));
            }
        }
        prompt
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

    /// Calls the LLM once for one plan step, streaming tokens through `ctx` when it
    /// has a sink attached and surfacing `chat_model_start`/`chat_model_end` as
    /// [`StreamEvent::Custom`] around it.
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

    async fn run_step(
        &self,
        state: &AgentState,
        step_title: &str,
        ctx: &RunContext<AgentState>,
    ) -> Result<(String, bool), AgentError> {
        let system = self.build_prompt(state, step_title);
        let mut transcript = vec![Message::system(system)];
        let tool_ctx = ToolCallContext::new()
            .with_recent_messages(state.messages.clone())
            .with_thread_id(state.session_id.clone());

        let mut last_content = String::new();
        let mut failed = false;

        let mut iterations = 0u32;
        while iterations < self.max_iterations {
            iterations += 1;
            let response = match tokio::time::timeout(self.llm_timeout, self.call_llm(&transcript, ctx)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    last_content = format!("[ERROR] LLM call failed: {e}");
                    failed = true;
                    break;
                }
                Err(_) => {
                    last_content = format!("[ERROR] LLM call timed out ({}s)", self.llm_timeout.as_secs());
                    failed = true;
                    break;
                }
            };

            last_content = response.content.clone();
            let assistant = if response.tool_calls.is_empty() {
                Message::assistant(response.content)
            } else {
                Message::assistant_with_tool_calls(response.content, response.tool_calls.clone())
            };
            transcript.push(assistant);

            if response.tool_calls.is_empty() {
                break;
            }

            for call in &response.tool_calls {
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

                if result.starts_with("[ERROR]") {
                    failed = true;
                }
                transcript.push(Message::tool(call.id.clone(), result));
            }
        }

        if iterations >= self.max_iterations {
            tracing::warn!(node = %self.id, step = step_title, "executor hit iteration cap");
        }

        Ok((last_content, failed))
    }

    async fn run_impl(
        &self,
        state: AgentState,
        ctx: &RunContext<AgentState>,
    ) -> Result<(AgentState, Next), AgentError> {
        let Some(plan) = state.plan_data.clone() else {
            return Err(AgentError::Graph(format!("{}: no plan in state", self.id)));
        };
        let total = plan.steps.len();
        let step_idx = state.current_step_index;
        let Some(step) = plan.steps.get(step_idx) else {
            return Err(AgentError::Graph(format!(
                "{}: step index {step_idx} out of range (plan has {total} steps)",
                self.id
            )));
        };
        let step_id = step.id;
        let step_title = step.title.clone();

        let mut update = state;
        update.messages = Vec::new();
        update.push_event(serde_json::json!({
            "type": "plan_updated",
            "plan_id": plan.plan_id,
            "step_id": step_id,
            "status": "running",
        }));

        let (response, failed) = self.run_step(&update, &step_title, ctx).await?;

        if let Some(plan) = update.plan_data.as_mut() {
            if let Some(s) = plan.step_mut(step_id) {
                s.status = if failed {
                    crate::state::StepStatus::Failed
                } else {
                    crate::state::StepStatus::Completed
                };
            }
        }
        update.push_event(serde_json::json!({
            "type": "plan_updated",
            "plan_id": plan.plan_id,
            "step_id": step_id,
            "status": if failed { "failed" } else { "completed" },
        }));

        let summary = {
            let text = format!("[步骤 {}/{} - {}] {}", step_idx + 1, total, step_title, response);
            let truncated: String = text.chars().take(SUMMARY_TRUNCATE).collect();
            truncated
        };
        update.messages = vec![Message::assistant(summary)];
        update.step_response = Some(response.clone());
        update.record_step_result(step_title, response);

        Ok((update, Next::Continue))
    }
}

fn plan_title(state: &AgentState) -> &str {
    state.plan_data.as_ref().map(|p| p.title.as_str()).unwrap_or("")
}

#[async_trait]
impl Node<AgentState> for ExecutorNode {
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
