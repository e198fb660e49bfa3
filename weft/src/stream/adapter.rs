//! Translates the graph's raw per-node event stream into the normalised,
//! transport-agnostic events a caller forwards to a client.
//!
//! The graph itself only emits [`crate::stream::StreamEvent`] (task start/end,
//! state snapshots); it has no notion of "an LLM call started" or "a tool ran".
//! Those finer-grained raw events are produced by whatever invokes the LLM/tool
//! (a node, or the node's caller) and fed into this adapter one at a time. The
//! adapter's job is purely translation and bookkeeping — tracking in-flight LLM
//! calls by `call_id` so `on_chat_model_end` can pair back up with the input
//! captured at `on_chat_model_start`, and remembering how much of a state's
//! `pending_events` tail has already been surfaced.
//!
//! Serialising an [`EmittedEvent`] onto a wire format (SSE, NDJSON, a websocket
//! frame) is the caller's concern; this module only builds the typed value via
//! [`EmittedEvent::into_json`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::llm::LlmUsage;

const LLM_INPUT_TRUNCATE: usize = 5000;
const LLM_OUTPUT_TRUNCATE: usize = 3000;
const TOOL_OUTPUT_TRUNCATE: usize = 2000;
const CACHE_HIT_PREFIX: &str = "[CACHE_HIT]";

/// A normalised event ready to forward to a client.
#[derive(Clone, Debug, PartialEq)]
pub enum EmittedEvent {
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
    /// A side-channel event that a node already built as a complete JSON object
    /// (`plan_created`, `plan_updated`, `plan_revised`, `plan_approval_request`,
    /// ...) surfaced verbatim from `AgentState::pending_events`.
    Side(Value),
}

impl EmittedEvent {
    /// Converts to the typed wire enum from `stream_event`, when the event has
    /// a direct counterpart there. `Side` events round-trip through their
    /// `type` tag; side-channel shapes the crate doesn't model (e.g. the
    /// memory-compression stream's `progress`/`result`/`error`) return `None`.
    pub fn to_protocol_event(&self) -> Option<stream_event::ProtocolEvent> {
        use stream_event::ProtocolEvent;
        Some(match self {
            EmittedEvent::Token { content } => ProtocolEvent::Token {
                content: content.clone(),
            },
            EmittedEvent::ToolStart { tool, input, motivation } => ProtocolEvent::ToolStart {
                tool: tool.clone(),
                input: input.clone(),
                motivation: motivation.clone(),
            },
            EmittedEvent::ToolEnd { tool, output, cached, duration_ms } => ProtocolEvent::ToolEnd {
                tool: tool.clone(),
                output: output.clone(),
                cached: *cached,
                duration_ms: *duration_ms,
            },
            EmittedEvent::LlmStart { call_id, node, model, input, motivation } => ProtocolEvent::LlmStart {
                call_id: call_id.clone(),
                node: node.clone(),
                model: model.clone(),
                input: input.clone(),
                motivation: motivation.clone(),
            },
            EmittedEvent::LlmEnd {
                call_id,
                node,
                model,
                duration_ms,
                input_tokens,
                output_tokens,
                total_tokens,
                tokens_estimated,
                input,
                output,
                cost,
                model_info,
            } => ProtocolEvent::LlmEnd {
                call_id: call_id.clone(),
                node: node.clone(),
                model: model.clone(),
                duration_ms: *duration_ms,
                input_tokens: *input_tokens,
                output_tokens: *output_tokens,
                total_tokens: *total_tokens,
                tokens_estimated: *tokens_estimated,
                input: input.clone(),
                output: output.clone(),
                cost: *cost,
                model_info: model_info.clone(),
            },
            EmittedEvent::Side(value) => return ProtocolEvent::from_side_channel(value),
        })
    }

    /// Renders the event to the `{type, ...}` JSON shape the transport expects.
    /// `Side` events already carry their own `type` field and are passed through.
    pub fn into_json(self) -> Value {
        match self {
            EmittedEvent::Token { content } => json!({"type": "token", "content": content}),
            EmittedEvent::ToolStart {
                tool,
                input,
                motivation,
            } => json!({"type": "tool_start", "tool": tool, "input": input, "motivation": motivation}),
            EmittedEvent::ToolEnd {
                tool,
                output,
                cached,
                duration_ms,
            } => json!({
                "type": "tool_end",
                "tool": tool,
                "output": output,
                "cached": cached,
                "duration_ms": duration_ms,
            }),
            EmittedEvent::LlmStart {
                call_id,
                node,
                model,
                input,
                motivation,
            } => json!({
                "type": "llm_start",
                "call_id": call_id,
                "node": node,
                "model": model,
                "input": input,
                "motivation": motivation,
            }),
            EmittedEvent::LlmEnd {
                call_id,
                node,
                model,
                duration_ms,
                input_tokens,
                output_tokens,
                total_tokens,
                tokens_estimated,
                input,
                output,
                cost,
                model_info,
            } => json!({
                "type": "llm_end",
                "call_id": call_id,
                "node": node,
                "model": model,
                "duration_ms": duration_ms,
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
                "total_tokens": total_tokens,
                "tokens_estimated": tokens_estimated,
                "input": input,
                "output": output,
                "cost": cost,
                "model_info": model_info,
            }),
            EmittedEvent::Side(value) => value,
        }
    }
}

/// Per-1000-token prices for a model, used to estimate `llm_end.cost`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Optional model -> price lookup. Absent entries simply leave `cost: None`.
#[derive(Clone, Debug, Default)]
pub struct PricingTable {
    prices: HashMap<String, ModelPrice>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    fn cost_for(&self, model: &str, input_tokens: u32, output_tokens: u32) -> Option<f64> {
        let price = self.prices.get(model)?;
        Some(
            (input_tokens as f64 / 1000.0) * price.input_per_1k
                + (output_tokens as f64 / 1000.0) * price.output_per_1k,
        )
    }
}

struct LlmCallTracking {
    node: String,
    model: String,
    input: String,
    start: Instant,
}

/// Stateful translator from raw per-call events to [`EmittedEvent`]s.
///
/// One adapter instance is scoped to a single run: it tracks in-flight LLM
/// calls by `call_id` and the `pending_events` tail already surfaced, both of
/// which are meaningless across separate runs.
pub struct EventStreamAdapter {
    node_motivations: HashMap<String, String>,
    tool_motivations: HashMap<String, String>,
    pricing: Option<PricingTable>,
    in_flight_llm: HashMap<String, LlmCallTracking>,
    seen_pending: usize,
}

impl Default for EventStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamAdapter {
    pub fn new() -> Self {
        Self {
            node_motivations: default_node_motivations(),
            tool_motivations: default_tool_motivations(),
            pricing: None,
            in_flight_llm: HashMap::new(),
            seen_pending: 0,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// `chat-model-stream` chunk -> `token`. Returns `None` for empty chunks.
    pub fn on_chat_model_stream(&self, content: &str) -> Option<EmittedEvent> {
        if content.is_empty() {
            return None;
        }
        Some(EmittedEvent::Token {
            content: content.to_string(),
        })
    }

    /// `chat-model-start` -> `llm_start`. Remembers `node`/`model`/`input` under
    /// `call_id` so the matching `on_chat_model_end` can report duration and
    /// replay the same input text.
    pub fn on_chat_model_start(
        &mut self,
        call_id: impl Into<String>,
        node: impl Into<String>,
        model: impl Into<String>,
        system_prompt: &str,
        messages: &str,
    ) -> EmittedEvent {
        let call_id = call_id.into();
        let node = node.into();
        let model = model.into();
        let full_input = format_debug_input(system_prompt, messages);
        let motivation = self
            .node_motivations
            .get(&node)
            .cloned()
            .unwrap_or_else(|| "invoking the model".to_string());

        self.in_flight_llm.insert(
            call_id.clone(),
            LlmCallTracking {
                node: node.clone(),
                model: model.clone(),
                input: full_input.clone(),
                start: Instant::now(),
            },
        );

        EmittedEvent::LlmStart {
            call_id,
            node,
            model,
            input: truncate_chars(&full_input, LLM_INPUT_TRUNCATE),
            motivation,
        }
    }

    /// `chat-model-end` -> `llm_end`. Returns `None` if `call_id` was never
    /// tracked by a prior `on_chat_model_start` (mirrors the raw stream's own
    /// pairing contract: an end with no matching start is dropped).
    pub fn on_chat_model_end(
        &mut self,
        call_id: &str,
        output: &str,
        usage: Option<&LlmUsage>,
    ) -> Option<EmittedEvent> {
        let tracked = self.in_flight_llm.remove(call_id)?;
        let duration_ms = tracked.start.elapsed().as_millis() as u64;

        let (input_tokens, output_tokens, total_tokens, tokens_estimated) = match usage {
            Some(u) => (
                Some(u.prompt_tokens),
                Some(u.completion_tokens),
                Some(u.total_tokens),
                false,
            ),
            None => {
                let input_est = estimate_tokens(&tracked.input);
                let output_est = estimate_tokens(output);
                (
                    Some(input_est),
                    Some(output_est),
                    Some(input_est + output_est),
                    true,
                )
            }
        };

        let cost = match (input_tokens, output_tokens) {
            (Some(i), Some(o)) => self
                .pricing
                .as_ref()
                .and_then(|p| p.cost_for(&tracked.model, i, o)),
            _ => None,
        };

        Some(EmittedEvent::LlmEnd {
            call_id: call_id.to_string(),
            node: tracked.node,
            model: tracked.model.clone(),
            duration_ms,
            input_tokens,
            output_tokens,
            total_tokens,
            tokens_estimated,
            input: truncate_chars(&tracked.input, LLM_INPUT_TRUNCATE),
            output: truncate_chars(output, LLM_OUTPUT_TRUNCATE),
            cost,
            model_info: Some(tracked.model),
        })
    }

    /// `tool-start` -> `tool_start`. `input` is rendered with its `Display`/debug
    /// form the same way the tool itself would log it.
    pub fn on_tool_start(&self, tool: impl Into<String>, input: &Value) -> EmittedEvent {
        let tool = tool.into();
        let motivation = self
            .tool_motivations
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| format!("calling tool: {tool}"));
        EmittedEvent::ToolStart {
            input: input.to_string(),
            motivation,
            tool,
        }
    }

    /// `tool-end` -> `tool_end`. `cached` is true iff `output` begins with
    /// `[CACHE_HIT]`; `duration_ms` is supplied by the caller (who owns the
    /// timer started at the matching `on_tool_start`).
    pub fn on_tool_end(
        &self,
        tool: impl Into<String>,
        output: &str,
        duration: Option<Duration>,
    ) -> EmittedEvent {
        let cached = output.starts_with(CACHE_HIT_PREFIX);
        EmittedEvent::ToolEnd {
            tool: tool.into(),
            output: truncate_chars(output, TOOL_OUTPUT_TRUNCATE),
            cached,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        }
    }

    /// `chain-end` -> the unobserved tail of `pending_events`. Call once per
    /// node completion with that node's (possibly unchanged) full
    /// `pending_events` slice; returns only entries added since the last call.
    pub fn on_chain_end(&mut self, pending_events: &[Value]) -> Vec<EmittedEvent> {
        if pending_events.len() <= self.seen_pending {
            return Vec::new();
        }
        let fresh = pending_events[self.seen_pending..].to_vec();
        self.seen_pending = pending_events.len();
        fresh.into_iter().map(EmittedEvent::Side).collect()
    }
}

fn format_debug_input(system_prompt: &str, messages: &str) -> String {
    format!("[System Prompt]\n{system_prompt}\n\n[Messages]\n{messages}")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// `chinese_chars/1.5 + other_chars/4`, rounded up. Used only when the
/// provider didn't return real usage metadata.
fn estimate_tokens(text: &str) -> u32 {
    let mut chinese = 0usize;
    let mut other = 0usize;
    for ch in text.chars() {
        if is_cjk(ch) {
            chinese += 1;
        } else {
            other += 1;
        }
    }
    ((chinese as f64 / 1.5) + (other as f64 / 4.0)).ceil() as u32
}

fn is_cjk(ch: char) -> bool {
    let c = ch as u32;
    (0x4E00..=0x9FFF).contains(&c) || (0x3400..=0x4DBF).contains(&c) || (0xF900..=0xFAFF).contains(&c)
}

fn default_node_motivations() -> HashMap<String, String> {
    [
        ("agent", "reasoning about the next step"),
        ("executor", "executing a plan step"),
        ("replanner", "assessing whether the plan needs revising"),
        ("summarizer", "summarising the finished plan"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_tool_motivations() -> HashMap<String, String> {
    [
        ("file_read", "reading a file"),
        ("file_write", "writing a file"),
        ("terminal", "running a terminal command"),
        ("python_repl", "running Python code"),
        ("list_dir", "listing a directory"),
        ("memory_search", "searching memory"),
        ("memory_write", "writing to memory"),
        ("rag_search", "searching the knowledge base"),
        ("fetch_url", "fetching a web page"),
        ("plan_create", "creating a task plan"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chunk_yields_no_token() {
        let adapter = EventStreamAdapter::new();
        assert!(adapter.on_chat_model_stream("").is_none());
    }

    #[test]
    fn non_empty_chunk_yields_token() {
        let adapter = EventStreamAdapter::new();
        let event = adapter.on_chat_model_stream("hi").unwrap();
        assert_eq!(event, EmittedEvent::Token { content: "hi".into() });
    }

    #[test]
    fn llm_start_carries_known_node_motivation() {
        let mut adapter = EventStreamAdapter::new();
        let event = adapter.on_chat_model_start("call-1", "agent", "gpt-4o-mini", "sys", "msgs");
        match event {
            EmittedEvent::LlmStart {
                call_id,
                node,
                model,
                motivation,
                input,
            } => {
                assert_eq!(call_id, "call-1");
                assert_eq!(node, "agent");
                assert_eq!(model, "gpt-4o-mini");
                assert_eq!(motivation, "reasoning about the next step");
                assert!(input.contains("[System Prompt]"));
                assert!(input.contains("[Messages]"));
            }
            _ => panic!("expected LlmStart"),
        }
    }

    #[test]
    fn llm_end_without_usage_estimates_tokens() {
        let mut adapter = EventStreamAdapter::new();
        adapter.on_chat_model_start("call-1", "agent", "gpt-4o-mini", "sys", "msgs");
        let event = adapter.on_chat_model_end("call-1", "hello world", None).unwrap();
        match event {
            EmittedEvent::LlmEnd {
                tokens_estimated,
                input_tokens,
                output_tokens,
                total_tokens,
                cost,
                ..
            } => {
                assert!(tokens_estimated);
                assert!(input_tokens.unwrap() > 0);
                assert!(output_tokens.unwrap() > 0);
                assert_eq!(total_tokens, Some(input_tokens.unwrap() + output_tokens.unwrap()));
                assert!(cost.is_none(), "no pricing table configured");
            }
            _ => panic!("expected LlmEnd"),
        }
    }

    #[test]
    fn llm_end_with_usage_reports_exact_counts_and_cost() {
        let pricing = PricingTable::new().with_price(
            "gpt-4o-mini",
            ModelPrice {
                input_per_1k: 0.15,
                output_per_1k: 0.6,
            },
        );
        let mut adapter = EventStreamAdapter::new().with_pricing(pricing);
        adapter.on_chat_model_start("call-1", "agent", "gpt-4o-mini", "sys", "msgs");
        let usage = LlmUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        };
        let event = adapter
            .on_chat_model_end("call-1", "hello", Some(&usage))
            .unwrap();
        match event {
            EmittedEvent::LlmEnd {
                tokens_estimated,
                input_tokens,
                output_tokens,
                total_tokens,
                cost,
                ..
            } => {
                assert!(!tokens_estimated);
                assert_eq!(input_tokens, Some(1000));
                assert_eq!(output_tokens, Some(500));
                assert_eq!(total_tokens, Some(1500));
                assert_eq!(cost, Some(0.15 + 0.3));
            }
            _ => panic!("expected LlmEnd"),
        }
    }

    #[test]
    fn llm_end_with_unknown_call_id_is_dropped() {
        let mut adapter = EventStreamAdapter::new();
        assert!(adapter.on_chat_model_end("never-started", "x", None).is_none());
    }

    #[test]
    fn tool_start_uses_known_motivation_or_falls_back() {
        let adapter = EventStreamAdapter::new();
        let event = adapter.on_tool_start("file_read", &json!({"path": "a.txt"}));
        match event {
            EmittedEvent::ToolStart { motivation, tool, .. } => {
                assert_eq!(tool, "file_read");
                assert_eq!(motivation, "reading a file");
            }
            _ => panic!("expected ToolStart"),
        }

        let event = adapter.on_tool_start("mystery_tool", &json!({}));
        match event {
            EmittedEvent::ToolStart { motivation, .. } => {
                assert_eq!(motivation, "calling tool: mystery_tool");
            }
            _ => panic!("expected ToolStart"),
        }
    }

    #[test]
    fn tool_end_detects_cache_hit_and_truncates() {
        let adapter = EventStreamAdapter::new();
        let long_output = format!("{}{}", CACHE_HIT_PREFIX, "x".repeat(TOOL_OUTPUT_TRUNCATE + 50));
        let event = adapter.on_tool_end("fetch_url", &long_output, Some(Duration::from_millis(12)));
        match event {
            EmittedEvent::ToolEnd {
                cached,
                output,
                duration_ms,
                ..
            } => {
                assert!(cached);
                assert_eq!(output.chars().count(), TOOL_OUTPUT_TRUNCATE);
                assert_eq!(duration_ms, Some(12));
            }
            _ => panic!("expected ToolEnd"),
        }
    }

    #[test]
    fn chain_end_only_surfaces_new_tail() {
        let mut adapter = EventStreamAdapter::new();
        let first = vec![json!({"type": "plan_created", "plan": {}})];
        let surfaced = adapter.on_chain_end(&first);
        assert_eq!(surfaced.len(), 1);

        // Same slice observed again: nothing new.
        let surfaced_again = adapter.on_chain_end(&first);
        assert!(surfaced_again.is_empty());

        let mut second = first.clone();
        second.push(json!({"type": "plan_updated", "plan_id": "p1", "step_id": 1, "status": "completed"}));
        let surfaced = adapter.on_chain_end(&second);
        assert_eq!(surfaced.len(), 1);
        match &surfaced[0] {
            EmittedEvent::Side(v) => assert_eq!(v["type"], "plan_updated"),
            _ => panic!("expected Side event"),
        }
    }

    #[test]
    fn emitted_event_into_json_has_type_tag() {
        let json_value = EmittedEvent::Token {
            content: "hi".into(),
        }
        .into_json();
        assert_eq!(json_value["type"], "token");
        assert_eq!(json_value["content"], "hi");
    }

    #[test]
    fn to_protocol_event_converts_typed_variants() {
        let event = EmittedEvent::Token {
            content: "hi".into(),
        };
        assert_eq!(
            event.to_protocol_event(),
            Some(stream_event::ProtocolEvent::Token { content: "hi".into() })
        );
    }

    #[test]
    fn to_protocol_event_parses_known_side_channel_shapes() {
        let event = EmittedEvent::Side(json!({
            "type": "plan_updated",
            "plan_id": "p1",
            "step_id": 2,
            "status": "running",
        }));
        assert_eq!(
            event.to_protocol_event(),
            Some(stream_event::ProtocolEvent::PlanUpdated {
                plan_id: "p1".into(),
                step_id: Some(2),
                status: "running".into(),
            })
        );
    }

    #[test]
    fn to_protocol_event_returns_none_for_unmodeled_side_channel_shapes() {
        let event = EmittedEvent::Side(json!({"type": "progress", "category": "fact", "entries": 3}));
        assert_eq!(event.to_protocol_event(), None);
    }
}
