//! Pluggable, tiered debug tracing as a [`RunMiddleware`] implementation.
//!
//! Grounded on `examples/original_source/backend/engine/middleware/debug.py`:
//! four levels (`off`/`basic`/`standard`/`full`), an in-memory collector that
//! pairs `tool_start`/`tool_end` and `llm_start`/`llm_end` back up by matching
//! the most recent in-flight entry, and persistence of the collected calls via
//! an external collaborator at `on_run_end`. `DebugLevel` here is a proper
//! `Ord` enum (`Off < Basic < Standard < Full`) rather than the source's
//! string-keyed comparison, since string ordering of the level names
//! ("basic" < "full" < "off" < "standard") doesn't actually match intent.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::context::RunnerContext;
use super::middleware::RunMiddleware;

const LLM_START_INPUT_TRUNCATE: usize = 2000;
const LLM_END_OUTPUT_TRUNCATE: usize = 1000;
const TOOL_END_OUTPUT_TRUNCATE: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    #[default]
    Off,
    /// Tool call timings only.
    Basic,
    /// + LLM call start/end and token/cost aggregates, with payload truncation.
    Standard,
    /// + full, untruncated input/output content.
    Full,
}

/// Persists a run's collected debug calls. Implemented by whatever keeps
/// session data around; `weft` has no opinion on where that data lives.
#[async_trait]
pub trait DebugSink: Send + Sync {
    async fn save_debug_calls(&self, session_id: &str, calls: Vec<Value>);
}

/// Accumulates debug call records for one run, matching `tool_end`/`llm_end`
/// back to the in-flight record a preceding `tool_start`/`llm_start` opened.
#[derive(Default)]
pub struct InMemoryCollector {
    calls: Mutex<Vec<Value>>,
}

impl InMemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool_start(&self, event: &Value) {
        let mut calls = self.lock();
        calls.push(json!({
            "tool": event.get("tool").cloned().unwrap_or(Value::Null),
            "input": event.get("input").cloned().unwrap_or(Value::Null),
            "output": "",
            "duration_ms": Value::Null,
            "cached": false,
            "in_progress": true,
            "motivation": event.get("motivation").cloned().unwrap_or(Value::Null),
        }));
    }

    pub fn record_tool_end(&self, event: &Value) {
        let tool_name = event.get("tool").and_then(Value::as_str);
        let mut calls = self.lock();
        if let Some(call) = find_in_progress(&mut calls, |c| c.get("tool").and_then(Value::as_str) == tool_name) {
            let output = event.get("output").and_then(Value::as_str).unwrap_or("");
            call["output"] = json!(truncate(output, TOOL_END_OUTPUT_TRUNCATE));
            call["duration_ms"] = event.get("duration_ms").cloned().unwrap_or(Value::Null);
            call["cached"] = event.get("cached").cloned().unwrap_or(json!(false));
            call["in_progress"] = json!(false);
        }
    }

    pub fn record_llm_start(&self, event: &Value) {
        let mut calls = self.lock();
        calls.push(json!({
            "call_id": event.get("call_id").cloned().unwrap_or(Value::Null),
            "node": event.get("node").cloned().unwrap_or(Value::Null),
            "model": event.get("model").cloned().unwrap_or(Value::Null),
            "duration_ms": Value::Null,
            "input_tokens": Value::Null,
            "output_tokens": Value::Null,
            "total_tokens": Value::Null,
            "tokens_estimated": Value::Null,
            "input": event.get("input").cloned().unwrap_or(Value::Null),
            "output": "",
            "cost": Value::Null,
            "model_info": Value::Null,
            "in_progress": true,
            "motivation": event.get("motivation").cloned().unwrap_or(Value::Null),
        }));
    }

    pub fn record_llm_end(&self, event: &Value) {
        let call_id = event.get("call_id").and_then(Value::as_str);
        let mut calls = self.lock();
        if let Some(call) = find_in_progress(&mut calls, |c| c.get("call_id").and_then(Value::as_str) == call_id) {
            call["duration_ms"] = event.get("duration_ms").cloned().unwrap_or(Value::Null);
            call["input_tokens"] = event.get("input_tokens").cloned().unwrap_or(Value::Null);
            call["output_tokens"] = event.get("output_tokens").cloned().unwrap_or(Value::Null);
            call["total_tokens"] = event.get("total_tokens").cloned().unwrap_or(Value::Null);
            call["tokens_estimated"] = event.get("tokens_estimated").cloned().unwrap_or(Value::Null);
            call["output"] = event.get("output").cloned().unwrap_or(Value::Null);
            call["cost"] = event.get("cost").cloned().unwrap_or(Value::Null);
            call["model_info"] = event.get("model_info").cloned().unwrap_or(Value::Null);
            call["in_progress"] = json!(false);
        }
    }

    pub fn get_all(&self) -> Vec<Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn find_in_progress(calls: &mut [Value], matches: impl Fn(&Value) -> bool) -> Option<&mut Value> {
    calls
        .iter_mut()
        .rev()
        .find(|c| c.get("in_progress") == Some(&json!(true)) && matches(c))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...[truncated]", &s[..max])
    }
}

/// Tiered debug tracing middleware: records tool/LLM call timings at `Basic`
/// and above, truncates large payloads at `Standard`, and persists everything
/// collected through `sink` when the run ends.
pub struct DebugMiddleware {
    level: DebugLevel,
    collector: InMemoryCollector,
    sink: Option<std::sync::Arc<dyn DebugSink>>,
}

impl DebugMiddleware {
    pub fn new(level: DebugLevel) -> Self {
        Self {
            level,
            collector: InMemoryCollector::new(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: std::sync::Arc<dyn DebugSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

#[async_trait]
impl RunMiddleware for DebugMiddleware {
    async fn on_event(&self, event: Value, _ctx: &RunnerContext) -> Option<Value> {
        if self.level == DebugLevel::Off {
            return Some(event);
        }

        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");

        if event_type == "tool_start" {
            self.collector.record_tool_start(&event);
        } else if event_type == "tool_end" {
            self.collector.record_tool_end(&event);
        }

        if self.level >= DebugLevel::Standard {
            if event_type == "llm_start" {
                self.collector.record_llm_start(&event);
            } else if event_type == "llm_end" {
                self.collector.record_llm_end(&event);
            }
        }

        let mut event = event;
        if self.level == DebugLevel::Standard {
            if event_type == "llm_start" {
                if let Some(input) = event.get("input").and_then(Value::as_str) {
                    if input.len() > LLM_START_INPUT_TRUNCATE {
                        event["input"] = json!(truncate(input, LLM_START_INPUT_TRUNCATE));
                    }
                }
            } else if event_type == "llm_end" {
                if let Some(output) = event.get("output").and_then(Value::as_str) {
                    if output.len() > LLM_END_OUTPUT_TRUNCATE {
                        event["output"] = json!(truncate(output, LLM_END_OUTPUT_TRUNCATE));
                    }
                }
            }
        }

        Some(event)
    }

    async fn on_run_end(&self, ctx: &RunnerContext) {
        if self.level == DebugLevel::Off {
            return;
        }
        let calls = self.collector.get_all();
        if calls.is_empty() {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.save_debug_calls(&ctx.session_id, calls).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct RecordingSink {
        saved: AsyncMutex<Vec<(String, Vec<Value>)>>,
    }

    #[async_trait]
    impl DebugSink for RecordingSink {
        async fn save_debug_calls(&self, session_id: &str, calls: Vec<Value>) {
            self.saved.lock().await.push((session_id.to_string(), calls));
        }
    }

    #[tokio::test]
    async fn off_passes_events_through_untouched_and_records_nothing() {
        let mw = DebugMiddleware::new(DebugLevel::Off);
        let ctx = RunnerContext::new("s1", "/tmp");
        let event = json!({"type": "tool_start", "tool": "glob", "input": "*.rs", "motivation": "m"});
        let out = mw.on_event(event.clone(), &ctx).await;
        assert_eq!(out, Some(event));
        assert!(mw.collector.get_all().is_empty());
    }

    #[tokio::test]
    async fn basic_pairs_tool_start_and_end() {
        let mw = DebugMiddleware::new(DebugLevel::Basic);
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.on_event(json!({"type": "tool_start", "tool": "glob", "input": "*.rs", "motivation": "m"}), &ctx).await;
        mw.on_event(json!({"type": "tool_end", "tool": "glob", "output": "a.rs", "cached": false, "duration_ms": 12}), &ctx).await;

        let calls = mw.collector.get_all();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["tool"], "glob");
        assert_eq!(calls[0]["output"], "a.rs");
        assert_eq!(calls[0]["in_progress"], false);
    }

    #[tokio::test]
    async fn basic_ignores_llm_events() {
        let mw = DebugMiddleware::new(DebugLevel::Basic);
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.on_event(json!({"type": "llm_start", "call_id": "c1", "node": "agent", "model": "gpt", "input": "hi", "motivation": "m"}), &ctx).await;
        assert!(mw.collector.get_all().is_empty());
    }

    #[tokio::test]
    async fn standard_truncates_large_llm_payloads_in_forwarded_event() {
        let mw = DebugMiddleware::new(DebugLevel::Standard);
        let ctx = RunnerContext::new("s1", "/tmp");
        let big_input = "x".repeat(3000);
        let out = mw
            .on_event(json!({"type": "llm_start", "call_id": "c1", "node": "agent", "model": "gpt", "input": big_input, "motivation": "m"}), &ctx)
            .await
            .unwrap();
        let forwarded = out["input"].as_str().unwrap();
        assert!(forwarded.len() < 3000);
        assert!(forwarded.ends_with("...[truncated]"));

        // the collector keeps the untruncated input, only the forwarded event is trimmed
        let calls = mw.collector.get_all();
        assert_eq!(calls[0]["input"].as_str().unwrap().len(), 3000);
    }

    #[tokio::test]
    async fn full_does_not_truncate() {
        let mw = DebugMiddleware::new(DebugLevel::Full);
        let ctx = RunnerContext::new("s1", "/tmp");
        let big_output = "y".repeat(5000);
        mw.on_event(json!({"type": "llm_start", "call_id": "c1", "node": "agent", "model": "gpt", "input": "hi", "motivation": "m"}), &ctx).await;
        let out = mw
            .on_event(json!({"type": "llm_end", "call_id": "c1", "node": "agent", "model": "gpt", "duration_ms": 5, "output": big_output.clone()}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["output"].as_str().unwrap().len(), 5000);
    }

    #[tokio::test]
    async fn on_run_end_saves_collected_calls_through_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mw = DebugMiddleware::new(DebugLevel::Basic).with_sink(sink.clone());
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.on_event(json!({"type": "tool_start", "tool": "glob", "input": "*", "motivation": "m"}), &ctx).await;
        mw.on_event(json!({"type": "tool_end", "tool": "glob", "output": "", "cached": false}), &ctx).await;
        mw.on_run_end(&ctx).await;

        let saved = sink.saved.lock().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "s1");
        assert_eq!(saved[0].1.len(), 1);
    }

    #[tokio::test]
    async fn on_run_end_with_no_calls_does_not_invoke_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mw = DebugMiddleware::new(DebugLevel::Standard).with_sink(sink.clone());
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.on_run_end(&ctx).await;
        assert!(sink.saved.lock().await.is_empty());
    }

    #[tokio::test]
    async fn off_never_invokes_sink_even_with_calls_recorded_directly() {
        let sink = Arc::new(RecordingSink::default());
        let mw = DebugMiddleware::new(DebugLevel::Off).with_sink(sink.clone());
        let ctx = RunnerContext::new("s1", "/tmp");
        mw.collector.record_tool_start(&json!({"tool": "glob"}));
        mw.on_run_end(&ctx).await;
        assert!(sink.saved.lock().await.is_empty());
    }
}
