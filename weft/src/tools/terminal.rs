//! `terminal` built-in: runs a shell command and captures combined output.
//!
//! Risk classification and approval are the Permission Gate's job; this
//! tool only executes whatever command it is handed, under a hard timeout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_BYTES: usize = 100_000;

pub struct TerminalTool {
    timeout: Duration,
}

impl Default for TerminalTool {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TerminalTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        "terminal"
    }

    fn description(&self) -> &str {
        "Runs a shell command and returns its combined stdout/stderr."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"command": {"type": "string"}},
            "required": ["command"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(command) = args.get("command").and_then(|v| v.as_str()) else {
            return arg_error("terminal", "missing required string arg `command`");
        };

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output();

        match tokio::time::timeout(self.timeout, child).await {
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
            Ok(Err(e)) => ToolCallContent::new(format!("[ERROR] terminal: spawn failed: {e}")),
            Err(_) => ToolCallContent::new(format!(
                "[ERROR] tool timed out ({}s)",
                self.timeout.as_secs()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let tool = TerminalTool::new();
        let result = tool
            .invoke(serde_json::json!({"command": "echo hi"}), &ToolCallContext::new())
            .await;
        assert_eq!(result.as_str().trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_error() {
        let tool = TerminalTool::new();
        let result = tool
            .invoke(serde_json::json!({"command": "exit 7"}), &ToolCallContext::new())
            .await;
        assert!(result.as_str().starts_with("[ERROR]"));
    }

    #[tokio::test]
    async fn missing_command_arg_is_an_error() {
        let tool = TerminalTool::new();
        let result = tool.invoke(serde_json::json!({}), &ToolCallContext::new()).await;
        assert!(result.as_str().starts_with("[ERROR]"));
    }
}
