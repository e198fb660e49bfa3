//! Security levels, tool policies, and the per-level policy matrix.

use serde::{Deserialize, Serialize};

/// How permissive the gate is overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// All tools auto-execute.
    Relaxed,
    /// Dangerous tools need approval.
    Standard,
    /// Most tools need approval.
    Strict,
}

impl std::str::FromStr for SecurityLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            _ => Err(()),
        }
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::Standard
    }
}

/// Risk classification for a tool invocation. Ordered by severity so that
/// aggregating several sub-commands can take the max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Warn,
    Dangerous,
    Blocked,
}

/// How a tool is handled at a given security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolPolicy {
    /// Execute automatically.
    Auto,
    /// Approve only if classified `dangerous` or `warn`.
    ApproveDangerous,
    /// Always require approval, regardless of risk.
    AlwaysApprove,
    /// Approve only if classified `dangerous`.
    ApproveSensitive,
}

/// Returns the configured policy for `tool_name` at `level`. MCP tools (names
/// prefixed `mcp_`) follow the terminal policy; unrecognized tool names default
/// to `Auto` (no gate needed for tools with no risk surface, e.g. `list_dir`).
pub fn get_tool_policy(level: SecurityLevel, tool_name: &str) -> ToolPolicy {
    if tool_name.starts_with("mcp_") {
        return policy_for(level, "terminal");
    }
    policy_for(level, tool_name)
}

fn policy_for(level: SecurityLevel, tool_name: &str) -> ToolPolicy {
    use SecurityLevel::*;
    use ToolPolicy::*;

    match (level, tool_name) {
        (Relaxed, _) => Auto,

        (Standard, "terminal") => ApproveDangerous,
        (Standard, "python_repl") => AlwaysApprove,
        (Standard, "fetch_url") => Auto, // SSRF filtering in the classifier handles this
        (Standard, "file_read") => ApproveSensitive,
        (Standard, "memory_write") => Auto,
        (Standard, "memory_search") => Auto,

        (Strict, "terminal") => AlwaysApprove,
        (Strict, "python_repl") => AlwaysApprove,
        (Strict, "fetch_url") => AlwaysApprove,
        (Strict, "file_read") => ApproveSensitive,
        (Strict, "memory_write") => Auto,
        (Strict, "memory_search") => Auto,

        (_, _) => Auto,
    }
}
