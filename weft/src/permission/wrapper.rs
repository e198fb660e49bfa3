//! Wraps a [`Tool`] so every invocation passes through the permission gate
//! first, and is audit-logged regardless of outcome.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::Tool;

use super::gate::{Decision, PermissionGate};

/// A tool wrapped with the permission gate. Identity for the gate's rate
/// limiting and audit trail comes from the inner tool's own name; session
/// identity comes from `ToolCallContext::thread_id`/`user_id`, already
/// threaded explicitly through every `invoke` call, so no additional
/// thread-local session carrier is needed here.
pub struct SecuredTool {
    inner: Arc<dyn Tool>,
    gate: Arc<PermissionGate>,
}

impl SecuredTool {
    pub fn new(inner: Arc<dyn Tool>, gate: Arc<PermissionGate>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl Tool for SecuredTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn input_schema(&self) -> serde_json::Value {
        self.inner.input_schema()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolCallContext) -> ToolCallContent {
        let request_id = Uuid::new_v4().to_string();
        let decision = self.gate.check_permission(self.inner.name(), &args, &request_id, ctx).await;

        match decision {
            Decision::Deny { reason } => ToolCallContent::new(format!("\u{26d4} Operation denied: {reason}")),
            Decision::Allow => {
                let started = Instant::now();
                let result = self.inner.invoke(args.clone(), ctx).await;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                let error = result.as_str().starts_with("[ERROR]").then(|| result.as_str());
                self.gate.log_execution_result(self.inner.name(), &args, &request_id, elapsed_ms, error).await;
                result
            }
        }
    }
}
