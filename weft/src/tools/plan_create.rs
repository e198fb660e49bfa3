//! `plan_create` built-in.
//!
//! The `agent` node special-cases this tool: it parses the call's arguments
//! into a [`crate::state::Plan`] and sets `agent_outcome = plan_create` rather
//! than feeding the tool's return value back into the ReAct loop. The tool
//! itself only validates the shape and echoes it back.

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

pub struct PlanCreateTool;

#[async_trait]
impl Tool for PlanCreateTool {
    fn name(&self) -> &str {
        "plan_create"
    }

    fn description(&self) -> &str {
        "Creates a multi-step plan for the current request. Call this instead of answering directly when the task needs more than one step."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "steps": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["title", "steps"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(title) = args.get("title").and_then(|v| v.as_str()) else {
            return arg_error("plan_create", "missing required string arg `title`");
        };
        let Some(steps) = args.get("steps").and_then(|v| v.as_array()) else {
            return arg_error("plan_create", "missing required array arg `steps`");
        };
        if steps.iter().any(|s| s.as_str().is_none()) {
            return arg_error("plan_create", "`steps` must be an array of strings");
        }

        ToolCallContent::new(format!(
            "plan created: \"{title}\" with {} step(s)",
            steps.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_plan_echoes_title_and_step_count() {
        let tool = PlanCreateTool;
        let result = tool
            .invoke(
                serde_json::json!({"title": "Ship it", "steps": ["build", "test", "deploy"]}),
                &ToolCallContext::new(),
            )
            .await;
        assert!(result.as_str().contains("Ship it"));
        assert!(result.as_str().contains("3 step"));
    }

    #[tokio::test]
    async fn missing_steps_is_an_error() {
        let tool = PlanCreateTool;
        let result = tool
            .invoke(serde_json::json!({"title": "x"}), &ToolCallContext::new())
            .await;
        assert!(result.as_str().starts_with("[ERROR]"));
    }
}
