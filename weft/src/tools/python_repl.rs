//! `python_repl` built-in: runs a Python snippet to completion and captures output.
//!
//! Risk classification and approval are the Permission Gate's job; this tool
//! only executes whatever code it is handed. Execution happens in a spawned
//! `python3` subprocess under a hard timeout, mirroring [`TerminalTool`]'s
//! blocking-work-off-the-event-loop shape.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_BYTES: usize = 100_000;

pub struct PythonReplTool {
    timeout: Duration,
    interpreter: String,
}

impl Default for PythonReplTool {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interpreter: "python3".to_string(),
        }
    }
}

impl PythonReplTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[async_trait]
impl Tool for PythonReplTool {
    fn name(&self) -> &str {
        "python_repl"
    }

    fn description(&self) -> &str {
        "Runs a Python snippet to completion and returns its combined stdout/stderr."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"code": {"type": "string"}},
            "required": ["code"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(code) = args.get("code").and_then(|v| v.as_str()) else {
            return arg_error("python_repl", "missing required string arg `code`");
        };

        let mut child = match Command::new(&self.interpreter)
            .arg("-")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolCallContent::new(format!("[ERROR] python_repl: spawn failed: {e}")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(code.as_bytes()).await {
                return ToolCallContent::new(format!("[ERROR] python_repl: write to stdin failed: {e}"));
            }
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut combined = String::new();
                combined.push_str(&String::from_utf8_lossy(&output.stdout));
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                if combined.len() > MAX_OUTPUT_BYTES {
                    combined.truncate(MAX_OUTPUT_BYTES);
                    combined.push_str("...[truncated]");
                }
                if !output.status.success() {
                    combined = format!("[ERROR] exit status {}: {combined}", output.status);
                }
                ToolCallContent::new(combined)
            }
            Ok(Err(e)) => ToolCallContent::new(format!("[ERROR] python_repl: wait failed: {e}")),
            Err(_) => ToolCallContent::new(format!("[ERROR] tool timed out ({}s)", self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_code_arg_is_an_error() {
        let tool = PythonReplTool::new();
        let result = tool.invoke(serde_json::json!({}), &ToolCallContext::new()).await;
        assert!(result.as_str().starts_with("[ERROR]"));
    }

    #[tokio::test]
    async fn unknown_interpreter_reports_spawn_failure() {
        let tool = PythonReplTool::new().with_interpreter("definitely-not-a-real-interpreter");
        let result = tool
            .invoke(serde_json::json!({"code": "print(1)"}), &ToolCallContext::new())
            .await;
        assert!(result.as_str().starts_with("[ERROR] python_repl: spawn failed"));
    }
}
