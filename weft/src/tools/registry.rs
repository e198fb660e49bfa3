//! [`ToolRegistry::resolve`]: turns a spec-token list into a concrete tool set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::permission::{PermissionGate, SecuredTool};
use crate::tool_source::ToolSource;
use crate::tools::Tool;

const CORE_TOOL_NAMES: &[&str] = &[
    "terminal",
    "python_repl",
    "fetch_url",
    "file_read",
    "rag_search",
    "memory_write",
    "memory_search",
];

/// Holds built-in tools plus any dynamic sources (e.g. an MCP-style provider),
/// and resolves a requested tool set by name/group token. When a
/// [`PermissionGate`] is attached, every tool handed back by `resolve` is
/// wrapped in [`SecuredTool`] so no call reaches a built-in unclassified.
pub struct ToolRegistry {
    built_ins: HashMap<String, Arc<dyn Tool>>,
    plan_tools: HashMap<String, Arc<dyn Tool>>,
    sources: Vec<Arc<dyn ToolSource>>,
    gate: Option<Arc<PermissionGate>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            built_ins: HashMap::new(),
            plan_tools: HashMap::new(),
            sources: Vec::new(),
            gate: None,
        }
    }

    pub fn with_permission_gate(mut self, gate: Arc<PermissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.built_ins.insert(tool.name().to_string(), tool);
        self
    }

    pub fn register_plan_tool(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.plan_tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn add_source(&mut self, source: Arc<dyn ToolSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Resolves a spec-token list into a de-duplicated tool set, preserving
    /// first-appearance order. Tokens: `all`, `core`, `mcp`, `plan`, or an
    /// individual tool name. Unknown names are logged and skipped.
    pub async fn resolve(&self, spec: &[String], include_plan_create: bool) -> Vec<Arc<dyn Tool>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        let mut push = |name: &str, tool: Arc<dyn Tool>, seen: &mut std::collections::HashSet<String>| {
            if seen.insert(name.to_string()) {
                out.push(tool);
            }
        };

        for token in spec {
            match token.as_str() {
                "all" => {
                    for name in CORE_TOOL_NAMES {
                        if let Some(tool) = self.built_ins.get(*name) {
                            push(name, tool.clone(), &mut seen);
                        }
                    }
                    for tool in self.dynamic_tools().await {
                        push(tool.name(), tool, &mut seen);
                    }
                    for tool in self.plan_tools.values() {
                        push(tool.name(), tool.clone(), &mut seen);
                    }
                }
                "core" => {
                    for name in CORE_TOOL_NAMES {
                        if let Some(tool) = self.built_ins.get(*name) {
                            push(name, tool.clone(), &mut seen);
                        }
                    }
                }
                "mcp" => {
                    for tool in self.dynamic_tools().await {
                        push(tool.name(), tool, &mut seen);
                    }
                }
                "plan" => {
                    for tool in self.plan_tools.values() {
                        push(tool.name(), tool.clone(), &mut seen);
                    }
                }
                name => {
                    if let Some(tool) = self.built_ins.get(name) {
                        push(name, tool.clone(), &mut seen);
                    } else if let Some(tool) = self.plan_tools.get(name) {
                        push(name, tool.clone(), &mut seen);
                    } else {
                        tracing::warn!(tool = name, "unknown tool name in resolve spec, skipping");
                    }
                }
            }
        }

        if include_plan_create {
            for tool in self.plan_tools.values() {
                push(tool.name(), tool.clone(), &mut seen);
            }
        }

        match &self.gate {
            Some(gate) => out
                .into_iter()
                .map(|tool| Arc::new(SecuredTool::new(tool, gate.clone())) as Arc<dyn Tool>)
                .collect(),
            None => out,
        }
    }

    async fn dynamic_tools(&self) -> Vec<Arc<dyn Tool>> {
        // Dynamic tools are advertised as specs, not `Tool` impls; wrap each behind
        // an adapter that dispatches back through its originating source.
        let mut out = Vec::new();
        for source in &self.sources {
            match source.list_tools().await {
                Ok(specs) => {
                    for spec in specs {
                        out.push(Arc::new(super::dynamic::DynamicTool::new(source.clone(), spec))
                            as Arc<dyn Tool>);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "tool source unavailable during resolve"),
            }
        }
        out
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FetchUrlTool;

    fn registry_with_fetch() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FetchUrlTool::new()));
        reg
    }

    #[tokio::test]
    async fn resolve_core_includes_registered_core_tool() {
        let reg = registry_with_fetch();
        let tools = reg.resolve(&["core".to_string()], false).await;
        assert!(tools.iter().any(|t| t.name() == "fetch_url"));
    }

    #[tokio::test]
    async fn resolve_deduplicates_by_name() {
        let reg = registry_with_fetch();
        let spec = vec!["fetch_url".to_string(), "fetch_url".to_string()];
        let tools = reg.resolve(&spec, false).await;
        assert_eq!(tools.len(), 1);
    }

    #[tokio::test]
    async fn resolve_skips_unknown_tool_name() {
        let reg = registry_with_fetch();
        let tools = reg.resolve(&["not_a_real_tool".to_string()], false).await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn resolve_with_gate_wraps_tools_so_blocked_calls_are_denied() {
        use crate::permission::{PermissionGate, SecurityLevel};
        use crate::tool_source::ToolCallContext;

        struct TerminalLikeTool;
        #[async_trait::async_trait]
        impl Tool for TerminalLikeTool {
            fn name(&self) -> &str {
                "terminal"
            }
            fn description(&self) -> &str {
                "runs shell commands"
            }
            fn input_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object"})
            }
            async fn invoke(
                &self,
                _args: serde_json::Value,
                _ctx: &ToolCallContext,
            ) -> crate::tool_source::ToolCallContent {
                crate::tool_source::ToolCallContent::new("should not run")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(PermissionGate::new(SecurityLevel::Standard, dir.path()));
        let mut reg = ToolRegistry::new().with_permission_gate(gate);
        reg.register(Arc::new(TerminalLikeTool));

        let tools = reg.resolve(&["terminal".to_string()], false).await;
        assert_eq!(tools.len(), 1);

        let result = tools[0]
            .invoke(serde_json::json!({"command": "mkfs.ext4 /dev/sda1"}), &ToolCallContext::new())
            .await;
        assert!(result.as_str().starts_with("\u{26d4} Operation denied"));
    }
}
