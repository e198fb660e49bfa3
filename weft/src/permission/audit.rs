//! Append-only JSON-lines audit trail for every tool-permission decision.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const MAX_INPUT_VALUE_CHARS: usize = 500;
const MAX_ERROR_CHARS: usize = 500;
const MAX_FEEDBACK_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub ts: f64,
    pub tool: String,
    pub input: serde_json::Value,
    pub risk: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Appends one JSON object per line to `logs/audit.jsonl`. Never blocks a tool
/// call on a write failure; I/O errors are logged and swallowed.
pub struct AuditLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: logs_dir.into().join("audit.jsonl"),
            lock: Mutex::new(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn log(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        risk_level: &str,
        action: &str,
        request_id: Option<&str>,
        exec_ms: Option<f64>,
        error: Option<&str>,
        feedback: Option<&str>,
    ) {
        let entry = AuditEntry {
            ts: (Utc::now().timestamp_millis() as f64) / 1000.0,
            tool: tool_name.to_string(),
            input: sanitize_input(tool_input),
            risk: risk_level.to_string(),
            action: action.to_string(),
            request_id: request_id.map(str::to_string),
            exec_ms: exec_ms.map(|ms| (ms * 10.0).round() / 10.0),
            error: error.map(|e| truncate(e, MAX_ERROR_CHARS)),
            feedback: feedback.map(|f| truncate(f, MAX_FEEDBACK_CHARS)),
        };

        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await;
        match file {
            Ok(mut f) => {
                if let Err(e) = f.write_all(format!("{line}\n").as_bytes()).await {
                    tracing::warn!(error = %e, "permission audit: failed to write log line");
                }
            }
            Err(e) => tracing::warn!(error = %e, "permission audit: failed to open log file"),
        }
    }
}

fn sanitize_input(input: &serde_json::Value) -> serde_json::Value {
    let Some(obj) = input.as_object() else {
        return input.clone();
    };
    let mut out = serde_json::Map::new();
    for (k, v) in obj {
        match v.as_str() {
            Some(s) if s.chars().count() > MAX_INPUT_VALUE_CHARS => {
                out.insert(k.clone(), serde_json::Value::String(format!("{}...[truncated]", truncate(s, MAX_INPUT_VALUE_CHARS))));
            }
            _ => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    serde_json::Value::Object(out)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
