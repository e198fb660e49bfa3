//! The permission gate: classify, decide, and (when required) suspend a tool
//! call pending human approval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, Mutex};

use crate::tool_source::ToolCallContext;

use super::audit::AuditLogger;
use super::classifier::{classify_file_path, classify_python_code, classify_terminal_command, classify_url};
use super::config::{get_tool_policy, RiskLevel, SecurityLevel, ToolPolicy};
use super::rate_limiter::RateLimiter;

const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

/// What the caller should do with the tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run the tool.
    Allow,
    /// Refuse outright; `reason` is shown to the model in place of tool output.
    Deny { reason: String },
}

/// A tool call suspended pending human review.
struct PendingApproval {
    resolve: oneshot::Sender<ApprovalOutcome>,
}

/// What a human decided about a pending approval.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Approved,
    Denied,
    /// Denied, with free-text instructions the model should incorporate into
    /// its next turn instead of retrying blindly.
    Instructed(String),
}

/// Per-tool-call security gate: rate limiting, risk classification, and the
/// approve/deny/instruct suspension flow.
pub struct PermissionGate {
    security_level: SecurityLevel,
    approval_timeout: Duration,
    rate_limiter: RateLimiter,
    audit: AuditLogger,
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl PermissionGate {
    pub fn new(security_level: SecurityLevel, logs_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            security_level,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            rate_limiter: RateLimiter::new(),
            audit: AuditLogger::new(logs_dir),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Classifies and decides on a tool call, suspending for approval if the
    /// policy requires one. `request_id` identifies this pending approval so a
    /// later `resolve_approval` call can find it.
    pub async fn check_permission(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        request_id: &str,
        ctx: &ToolCallContext,
    ) -> Decision {
        let started = Instant::now();

        if self.security_level == SecurityLevel::Relaxed {
            self.audit.log(tool_name, tool_input, "safe", "auto_allowed", Some(request_id), None, None, None).await;
            return Decision::Allow;
        }

        let (rate_ok, rate_reason) = self.rate_limiter.check(tool_name).await;
        if !rate_ok {
            self.audit
                .log(tool_name, tool_input, "blocked", "rate_limited", Some(request_id), Some(elapsed_ms(started)), Some(&rate_reason), None)
                .await;
            return Decision::Deny { reason: rate_reason };
        }

        let risk = self.classify(tool_name, tool_input).await;

        if risk == RiskLevel::Blocked {
            let reason = format!("{tool_name} call blocked: classified as a catastrophic or disallowed operation.");
            self.audit.log(tool_name, tool_input, "blocked", "blocked", Some(request_id), Some(elapsed_ms(started)), Some(&reason), None).await;
            return Decision::Deny { reason };
        }

        let policy = get_tool_policy(self.security_level, tool_name);
        if !needs_approval(policy, risk) {
            self.audit
                .log(tool_name, tool_input, risk_label(risk), "auto_allowed", Some(request_id), Some(elapsed_ms(started)), None, None)
                .await;
            return Decision::Allow;
        }

        self.request_approval(tool_name, tool_input, request_id, risk, ctx, started).await
    }

    async fn classify(&self, tool_name: &str, tool_input: &serde_json::Value) -> RiskLevel {
        match tool_name {
            "terminal" => tool_input
                .get("command")
                .and_then(|v| v.as_str())
                .map(classify_terminal_command)
                .unwrap_or(RiskLevel::Warn),
            "python_repl" => tool_input
                .get("code")
                .and_then(|v| v.as_str())
                .map(classify_python_code)
                .unwrap_or(RiskLevel::Warn),
            "fetch_url" => match tool_input.get("url").and_then(|v| v.as_str()) {
                Some(url) => classify_url(url).await,
                None => RiskLevel::Warn,
            },
            "file_read" | "file_write" => tool_input
                .get("path")
                .and_then(|v| v.as_str())
                .map(classify_file_path)
                .unwrap_or(RiskLevel::Safe),
            _ => RiskLevel::Safe,
        }
    }

    async fn request_approval(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        request_id: &str,
        risk: RiskLevel,
        ctx: &ToolCallContext,
        started: Instant,
    ) -> Decision {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(request_id.to_string(), PendingApproval { resolve: tx });
        }

        if let Some(writer) = &ctx.stream_writer {
            writer.emit_custom(serde_json::json!({
                "type": "approval_request",
                "request_id": request_id,
                "tool": tool_name,
                "input": tool_input,
                "risk_level": risk_label(risk),
            }));
        }

        let outcome = match tokio::time::timeout(self.approval_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) | Err(_) => {
                self.pending.lock().await.remove(request_id);
                ApprovalOutcome::Denied
            }
        };

        match outcome {
            ApprovalOutcome::Approved => {
                self.audit
                    .log(tool_name, tool_input, risk_label(risk), "approved", Some(request_id), Some(elapsed_ms(started)), None, None)
                    .await;
                Decision::Allow
            }
            ApprovalOutcome::Denied => {
                let reason = format!("{tool_name} call denied by operator.");
                self.audit
                    .log(tool_name, tool_input, risk_label(risk), "denied", Some(request_id), Some(elapsed_ms(started)), Some(&reason), None)
                    .await;
                Decision::Deny { reason }
            }
            ApprovalOutcome::Instructed(feedback) => {
                self.audit
                    .log(tool_name, tool_input, risk_label(risk), "instructed", Some(request_id), Some(elapsed_ms(started)), None, Some(&feedback))
                    .await;
                Decision::Deny { reason: feedback }
            }
        }
    }

    /// Logs the post-execution outcome of a call `check_permission` already
    /// allowed: real elapsed time and whether it errored, completing the
    /// before/after audit pair.
    pub async fn log_execution_result(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        request_id: &str,
        exec_ms: f64,
        error: Option<&str>,
    ) {
        let action = if error.is_some() { "failed" } else { "completed" };
        self.audit.log(tool_name, tool_input, "executed", action, Some(request_id), Some(exec_ms), error, None).await;
    }

    /// Resolves a pending approval. Returns `false` if `request_id` isn't
    /// pending (already resolved, timed out, or never existed) — idempotent.
    pub async fn resolve_approval(&self, request_id: &str, outcome: ApprovalOutcome) -> bool {
        let pending = self.pending.lock().await.remove(request_id);
        match pending {
            Some(p) => p.resolve.send(outcome).is_ok(),
            None => false,
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn needs_approval(policy: ToolPolicy, risk: RiskLevel) -> bool {
    match policy {
        ToolPolicy::Auto => false,
        ToolPolicy::AlwaysApprove => true,
        ToolPolicy::ApproveDangerous => risk >= RiskLevel::Warn,
        ToolPolicy::ApproveSensitive => risk >= RiskLevel::Warn,
    }
}

fn risk_label(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Safe => "safe",
        RiskLevel::Warn => "warn",
        RiskLevel::Dangerous => "dangerous",
        RiskLevel::Blocked => "blocked",
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolCallContext {
        ToolCallContext::new()
    }

    #[tokio::test]
    async fn relaxed_level_always_allows() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PermissionGate::new(SecurityLevel::Relaxed, dir.path());
        let decision = gate.check_permission("terminal", &serde_json::json!({"command": "rm -rf /"}), "req-1", &ctx()).await;
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn standard_level_allows_safe_terminal_command() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PermissionGate::new(SecurityLevel::Standard, dir.path());
        let decision = gate.check_permission("terminal", &serde_json::json!({"command": "ls -la"}), "req-1", &ctx()).await;
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn standard_level_blocks_catastrophic_command() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PermissionGate::new(SecurityLevel::Standard, dir.path());
        let decision = gate.check_permission("terminal", &serde_json::json!({"command": "mkfs.ext4 /dev/sda1"}), "req-1", &ctx()).await;
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[tokio::test]
    async fn dangerous_terminal_command_suspends_and_waits_for_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(PermissionGate::new(SecurityLevel::Standard, dir.path()).with_approval_timeout(Duration::from_secs(5)));

        let gate2 = gate.clone();
        let handle = tokio::spawn(async move {
            gate2.check_permission("terminal", &serde_json::json!({"command": "rm -rf /tmp/work"}), "req-2", &ToolCallContext::new()).await
        });

        // Give the spawned task a chance to register the pending approval.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.pending_count().await, 1);

        let resolved = gate.resolve_approval("req-2", ApprovalOutcome::Approved).await;
        assert!(resolved);

        let decision = handle.await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn denied_approval_yields_deny_decision() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(PermissionGate::new(SecurityLevel::Standard, dir.path()).with_approval_timeout(Duration::from_secs(5)));

        let gate2 = gate.clone();
        let handle = tokio::spawn(async move {
            gate2.check_permission("terminal", &serde_json::json!({"command": "rm -rf /tmp/work"}), "req-3", &ToolCallContext::new()).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.resolve_approval("req-3", ApprovalOutcome::Denied).await;

        let decision = handle.await.unwrap();
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[tokio::test]
    async fn resolving_unknown_request_id_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PermissionGate::new(SecurityLevel::Standard, dir.path());
        assert!(!gate.resolve_approval("nonexistent", ApprovalOutcome::Approved).await);
    }

    #[tokio::test]
    async fn strict_level_requires_approval_for_fetch_url() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(PermissionGate::new(SecurityLevel::Strict, dir.path()).with_approval_timeout(Duration::from_secs(5)));

        let gate2 = gate.clone();
        let handle = tokio::spawn(async move {
            gate2.check_permission("fetch_url", &serde_json::json!({"url": "https://example.com"}), "req-4", &ToolCallContext::new()).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.pending_count().await, 1);
        gate.resolve_approval("req-4", ApprovalOutcome::Approved).await;
        let decision = handle.await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }
}
