//! The top-level run procedure: wires the compiled graph, prompt builder, event
//! adapter, approval registry, and middleware chain into one turn of conversation.
//!
//! Grounded on the original `run_agent`/`_run_uncached` pair: one async entry point
//! that streams normalised events to a sink, suspends for plan approval when the
//! graph asks for it, and always tears down (middleware `on_run_end`, terminal
//! `done`) regardless of how the run finished.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::cache::{truncate_recent_history, LlmReplyKeyParams};
use crate::error::AgentError;
use crate::graph::InvokeOutcome;
use crate::llm::LlmUsage;
use crate::memory::{execute_reflect_results, reflect_on_session, RunnableConfig, ToolCallSummary};
use crate::message::{Message, Role};
use crate::prompt::{build_implicit_recall_context, build_system_prompt, substitute_placeholders};
use crate::state::AgentState;
use crate::stream::{EmittedEvent, EventStreamAdapter, StreamEvent};

use super::context::{ApprovalDecision, RunnerContext};
use super::deps::RunnerDeps;
use super::middleware::RunMiddleware;

const APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);
const IMPLICIT_RECALL_TOP_K: usize = 5;
const CACHE_KEY_TEMPERATURE: f32 = 0.0;

/// Orchestrates one conversational turn over a shared set of long-lived
/// collaborators, piping every emitted event through an ordered middleware chain.
pub struct Runner {
    deps: Arc<RunnerDeps>,
    middlewares: Vec<Arc<dyn RunMiddleware>>,
}

impl Runner {
    pub fn new(deps: Arc<RunnerDeps>) -> Self {
        Self {
            deps,
            middlewares: Vec::new(),
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn RunMiddleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Runs one turn: `message` is the new user utterance, `session_history` is the
    /// prior conversation's messages (the caller's durable record, not necessarily
    /// what the graph checkpointer holds -- the checkpointer here is only consulted
    /// mid-run, to resume past a plan-approval suspension). Emitted events land on
    /// `out_tx` in production order; `reflect` kicks off end-of-session memory
    /// reflection in the background once the run completes.
    pub async fn run(
        &self,
        message: &str,
        session_history: &[Message],
        ctx: &RunnerContext,
        out_tx: mpsc::Sender<Value>,
        reflect: bool,
    ) -> Result<(), AgentError> {
        for mw in &self.middlewares {
            mw.on_run_start(ctx).await;
        }

        let result = self.run_cached(message, session_history, ctx, out_tx.clone()).await;

        if let Err(e) = &result {
            self.emit_piped(&out_tx, json!({"type": "error", "content": e.to_string()}), ctx).await;
        }
        self.emit_piped(&out_tx, json!({"type": "done"}), ctx).await;

        for mw in self.middlewares.iter().rev() {
            mw.on_run_end(ctx).await;
        }

        if reflect {
            self.spawn_reflection(ctx.session_id.clone(), session_history, message);
        }

        Ok(())
    }

    /// Pipes `event` through every middleware's `on_event` in order, dropping it the
    /// moment one returns `None`, then sends whatever survives to `out_tx`. A full or
    /// closed channel is not an error: the caller has stopped listening.
    async fn emit_piped(&self, out_tx: &mpsc::Sender<Value>, mut event: Value, ctx: &RunnerContext) {
        for mw in &self.middlewares {
            match mw.on_event(event, ctx).await {
                Some(e) => event = e,
                None => return,
            }
        }
        let _ = out_tx.send(event).await;
    }

    async fn run_cached(
        &self,
        message: &str,
        session_history: &[Message],
        ctx: &RunnerContext,
        out_tx: mpsc::Sender<Value>,
    ) -> Result<(), AgentError> {
        let system_prompt = self.build_prompt(message, ctx).await;

        let Some(cache) = &self.deps.llm_reply_cache else {
            return self.run_uncached(&system_prompt, message, session_history, ctx, out_tx).await;
        };

        let history_strings: Vec<String> = session_history.iter().map(render_message).collect();
        let recent_history = truncate_recent_history(&history_strings);
        let memory_fingerprint = memory_fingerprint(&self.deps.memory).await;
        let system_prompt_hash = sha256_hex(&system_prompt);
        let params = LlmReplyKeyParams {
            system_prompt_hash: &system_prompt_hash,
            recent_history: &recent_history,
            current_message: message,
            model: "default",
            temperature: CACHE_KEY_TEMPERATURE,
            memory_fingerprint: &memory_fingerprint,
        };

        cache
            .get_or_generate(&params, ctx.stream, out_tx, |tx| {
                self.run_uncached(&system_prompt, message, session_history, ctx, tx)
            })
            .await
    }

    /// Assembles the system prompt (cached skills/workspace/memory sections, with
    /// dynamic placeholders substituted and an optional implicit-recall block
    /// appended) for the given turn.
    async fn build_prompt(&self, message: &str, ctx: &RunnerContext) -> String {
        let mut system_prompt =
            build_system_prompt(&self.deps.prompt_config, &self.deps.memory, self.deps.prompt_cache.as_deref()).await;
        system_prompt = substitute_placeholders(&system_prompt, &ctx.session_id, &ctx.working_dir);

        let recall = build_implicit_recall_context(&self.deps.memory, message, IMPLICIT_RECALL_TOP_K).await;
        if !recall.is_empty() {
            system_prompt.push('\n');
            system_prompt.push('\n');
            system_prompt.push_str(&recall);
        }
        system_prompt
    }

    /// Seeds the initial state from an already-assembled system prompt and drives
    /// the graph to completion -- suspending and resuming across `approval` as many
    /// times as a plan demands sign-off.
    async fn run_uncached(
        &self,
        system_prompt: &str,
        message: &str,
        session_history: &[Message],
        ctx: &RunnerContext,
        tx: mpsc::Sender<Value>,
    ) -> Result<(), AgentError> {
        let graph = self
            .deps
            .graph_cache
            .get_or_build(
                &self.deps.graph_config,
                self.deps.llm.clone(),
                &self.deps.registry,
                Some(self.deps.checkpointer.clone()),
            )
            .await?;

        let mut state = AgentState::new(ctx.session_id.clone(), system_prompt);
        state.append_messages(session_history.to_vec());
        state.append_messages(vec![Message::user(message)]);

        let config = RunnableConfig::new(ctx.session_id.clone());
        let mut adapter = EventStreamAdapter::new();
        if let Some(pricing) = &self.deps.pricing {
            adapter = adapter.with_pricing(pricing.clone());
        }

        let mut current_state = state;
        let mut start_node: Option<String> = None;

        loop {
            let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent<AgentState>>(256);
            let outcome = match &start_node {
                None => graph.invoke_with_context(current_state.clone(), config.clone(), Some(stream_tx)).await?,
                Some(node) => {
                    graph
                        .invoke_with_context_from(current_state.clone(), node, config.clone(), Some(stream_tx))
                        .await?
                }
            };

            while let Some(event) = stream_rx.recv().await {
                match event {
                    StreamEvent::Updates { state, .. } => {
                        for emitted in adapter.on_chain_end(&state.pending_events) {
                            self.emit_piped(&tx, emitted.into_json(), ctx).await;
                        }
                    }
                    StreamEvent::Messages { chunk, .. } => {
                        if let Some(emitted) = adapter.on_chat_model_stream(&chunk.content) {
                            self.emit_piped(&tx, emitted.into_json(), ctx).await;
                        }
                    }
                    StreamEvent::Custom(value) => {
                        for emitted in translate_custom_event(&mut adapter, &value) {
                            self.emit_piped(&tx, emitted.into_json(), ctx).await;
                        }
                    }
                    _ => {}
                }
            }

            let final_state = match outcome {
                InvokeOutcome::Done(s) => s,
                InvokeOutcome::Suspended(interrupt) => interrupt.state,
            };

            match plan_awaiting_approval(&final_state) {
                Some(plan_id) => {
                    let plan = final_state.plan_data.clone().unwrap_or_else(|| crate::state::Plan::new("", Vec::new()));
                    self.emit_piped(
                        &tx,
                        json!({
                            "type": "plan_approval_request",
                            "plan_id": plan_id,
                            "title": plan.title,
                            "steps": plan.steps.iter().map(|s| s.title.clone()).collect::<Vec<_>>(),
                        }),
                        ctx,
                    )
                    .await;

                    let decision_rx = self.deps.approvals.register(plan_id.clone());
                    let approved = match tokio::time::timeout(APPROVAL_TIMEOUT, decision_rx).await {
                        Ok(Ok(ApprovalDecision { approved })) => approved,
                        Ok(Err(_)) | Err(_) => {
                            tracing::warn!(plan_id, "plan approval timed out or sender dropped; denying");
                            false
                        }
                    };

                    let mut resumed = final_state;
                    resumed.push_event(json!({
                        "type": "approval_resolved",
                        "plan_id": plan_id,
                        "approved": approved,
                    }));
                    current_state = resumed;
                    start_node = Some("approval".to_string());
                }
                None => {
                    current_state = final_state;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Fire-and-forget session reflection: failures are logged, never surfaced --
    /// a run that otherwise completed successfully must not fail because memory
    /// consolidation did.
    fn spawn_reflection(&self, session_id: String, session_history: &[Message], last_message: &str) {
        let memory = self.deps.memory.clone();
        let llm = self.deps.llm.clone();
        let mut transcript = session_history.to_vec();
        transcript.push(Message::user(last_message));

        let mut names_by_call_id = std::collections::HashMap::new();
        for m in &transcript {
            for call in &m.tool_calls {
                names_by_call_id.insert(call.id.clone(), call.name.clone());
            }
        }
        let tool_calls: Vec<ToolCallSummary> = transcript
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| ToolCallSummary {
                tool: m
                    .tool_call_id
                    .as_ref()
                    .and_then(|id| names_by_call_id.get(id).cloned())
                    .unwrap_or_else(|| "unknown".to_string()),
                output: m.content.clone(),
            })
            .collect();

        tokio::spawn(async move {
            let decisions = reflect_on_session(&memory, llm.as_ref(), &transcript, &tool_calls).await;
            if decisions.is_empty() {
                return;
            }
            execute_reflect_results(&memory, &session_id, &decisions).await;
        });
    }
}

/// Mirrors `ApprovalNode::find_resolution`'s contract without reaching into the
/// node module: a plan is awaiting approval iff it has an `approval_requested`
/// event with no later `approval_resolved` for the same `plan_id`.
fn plan_awaiting_approval(state: &AgentState) -> Option<String> {
    let plan_id = state.plan_data.as_ref()?.plan_id.clone();
    let resolved = state.pending_events.iter().rev().find_map(|event| {
        if event.get("type").and_then(Value::as_str) != Some("approval_resolved") {
            return None;
        }
        if event.get("plan_id").and_then(Value::as_str) != Some(plan_id.as_str()) {
            return None;
        }
        Some(())
    });
    if resolved.is_some() {
        return None;
    }
    let requested = state.pending_events.iter().any(|event| {
        event.get("type").and_then(Value::as_str) == Some("approval_requested")
            && event.get("plan_id").and_then(Value::as_str) == Some(plan_id.as_str())
    });
    requested.then_some(plan_id)
}

/// Dispatches a node-emitted `StreamEvent::Custom` payload (`chat_model_start`,
/// `chat_model_end`, `tool_start`, `tool_end`) to the matching typed adapter
/// method. Unrecognised `type` tags are dropped.
fn translate_custom_event(adapter: &mut EventStreamAdapter, value: &Value) -> Vec<EmittedEvent> {
    match value.get("type").and_then(Value::as_str) {
        Some("chat_model_start") => {
            let call_id = value["call_id"].as_str().unwrap_or_default();
            let node = value["node"].as_str().unwrap_or_default();
            let model = value["model"].as_str().unwrap_or_default();
            let system_prompt = value["system_prompt"].as_str().unwrap_or_default();
            let messages = value["messages"].as_str().unwrap_or_default();
            vec![adapter.on_chat_model_start(call_id, node, model, system_prompt, messages)]
        }
        Some("chat_model_end") => {
            let call_id = value["call_id"].as_str().unwrap_or_default();
            let output = value["output"].as_str().unwrap_or_default();
            let usage = value.get("usage").filter(|u| !u.is_null()).map(|u| LlmUsage {
                prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as u32,
            });
            adapter.on_chat_model_end(call_id, output, usage.as_ref()).into_iter().collect()
        }
        Some("tool_start") => {
            let tool = value["tool"].as_str().unwrap_or_default();
            let input = value.get("input").cloned().unwrap_or(Value::Null);
            vec![adapter.on_tool_start(tool, &input)]
        }
        Some("tool_end") => {
            let tool = value["tool"].as_str().unwrap_or_default();
            let output = value["output"].as_str().unwrap_or_default();
            let duration = value.get("duration_ms").and_then(Value::as_u64).map(Duration::from_millis);
            vec![adapter.on_tool_end(tool, output, duration)]
        }
        _ => Vec::new(),
    }
}

fn render_message(message: &Message) -> String {
    format!("{:?}: {}", message.role, message.content)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

async fn memory_fingerprint(memory: &crate::memory::MemoryStore) -> String {
    match tokio::fs::metadata(memory.memory_file()).await {
        Ok(meta) => match meta.modified() {
            Ok(modified) => match modified.duration_since(std::time::UNIX_EPOCH) {
                Ok(secs) => secs.as_secs_f64().to_string(),
                Err(_) => "0".to_string(),
            },
            Err(_) => "0".to_string(),
        },
        Err(_) => "absent".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Plan, Step, StepStatus};

    fn plan_with_id(id: &str) -> Plan {
        Plan {
            plan_id: id.to_string(),
            title: "t".to_string(),
            steps: vec![Step {
                id: 1,
                title: "a".to_string(),
                status: StepStatus::Pending,
            }],
        }
    }

    #[test]
    fn no_plan_data_is_not_awaiting_approval() {
        let state = AgentState::new("s1", "sys");
        assert_eq!(plan_awaiting_approval(&state), None);
    }

    #[test]
    fn requested_without_resolution_is_awaiting_approval() {
        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(plan_with_id("p1"));
        state.push_event(json!({"type": "approval_requested", "plan_id": "p1"}));
        assert_eq!(plan_awaiting_approval(&state), Some("p1".to_string()));
    }

    #[test]
    fn resolved_after_request_is_not_awaiting_approval() {
        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(plan_with_id("p1"));
        state.push_event(json!({"type": "approval_requested", "plan_id": "p1"}));
        state.push_event(json!({"type": "approval_resolved", "plan_id": "p1", "approved": true}));
        assert_eq!(plan_awaiting_approval(&state), None);
    }

    #[test]
    fn resolution_for_a_different_plan_id_does_not_clear_this_ones_request() {
        let mut state = AgentState::new("s1", "sys");
        state.plan_data = Some(plan_with_id("p1"));
        state.push_event(json!({"type": "approval_requested", "plan_id": "p1"}));
        state.push_event(json!({"type": "approval_resolved", "plan_id": "p-other", "approved": true}));
        assert_eq!(plan_awaiting_approval(&state), Some("p1".to_string()));
    }

    #[test]
    fn translate_custom_event_round_trips_chat_model_start_and_end() {
        let mut adapter = EventStreamAdapter::new();

        let start = translate_custom_event(
            &mut adapter,
            &json!({
                "type": "chat_model_start",
                "call_id": "call-1",
                "node": "agent",
                "model": "gpt-4o-mini",
                "system_prompt": "sys",
                "messages": "msgs",
            }),
        );
        assert_eq!(start.len(), 1);
        assert!(matches!(start[0], EmittedEvent::LlmStart { .. }));

        let end = translate_custom_event(
            &mut adapter,
            &json!({
                "type": "chat_model_end",
                "call_id": "call-1",
                "output": "hello",
                "usage": Value::Null,
            }),
        );
        assert_eq!(end.len(), 1);
        assert!(matches!(end[0], EmittedEvent::LlmEnd { .. }));
    }

    #[test]
    fn translate_custom_event_round_trips_tool_start_and_end() {
        let mut adapter = EventStreamAdapter::new();

        let start = translate_custom_event(
            &mut adapter,
            &json!({"type": "tool_start", "tool": "fetch_url", "input": {"url": "https://x"}}),
        );
        assert_eq!(start.len(), 1);
        assert!(matches!(start[0], EmittedEvent::ToolStart { .. }));

        let end = translate_custom_event(
            &mut adapter,
            &json!({"type": "tool_end", "tool": "fetch_url", "output": "body", "duration_ms": 12}),
        );
        assert_eq!(end.len(), 1);
        assert!(matches!(end[0], EmittedEvent::ToolEnd { .. }));
    }

    #[test]
    fn translate_custom_event_drops_unknown_type() {
        let mut adapter = EventStreamAdapter::new();
        let out = translate_custom_event(&mut adapter, &json!({"type": "mystery"}));
        assert!(out.is_empty());
    }
}
