//! Adapts a [`ToolSource`]-advertised [`ToolSpec`] into a [`Tool`] so dynamically
//! discovered tools (the `mcp` resolve token) sit in the same registry as
//! the built-ins.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSpec};
use crate::tools::Tool;

pub struct DynamicTool {
    source: Arc<dyn ToolSource>,
    spec: ToolSpec,
}

impl DynamicTool {
    pub fn new(source: Arc<dyn ToolSource>, spec: ToolSpec) -> Self {
        Self { source, spec }
    }
}

#[async_trait]
impl Tool for DynamicTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        self.spec.description.as_deref().unwrap_or("")
    }

    fn input_schema(&self) -> serde_json::Value {
        self.spec.input_schema.clone()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolCallContext) -> ToolCallContent {
        match self.source.call_tool(&self.spec.name, args, ctx).await {
            Ok(content) => content,
            Err(e) => ToolCallContent::new(format!("[ERROR] {}: {e}", self.spec.name)),
        }
    }
}
