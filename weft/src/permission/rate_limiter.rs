//! Sliding-window rate limiting per tool key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// `(max_calls, window)` for a tool key.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max_calls: usize,
    pub window: Duration,
}

fn default_limits() -> HashMap<&'static str, RateLimit> {
    [
        ("terminal", RateLimit { max_calls: 20, window: Duration::from_secs(300) }),
        ("python_repl", RateLimit { max_calls: 20, window: Duration::from_secs(300) }),
        ("fetch_url", RateLimit { max_calls: 30, window: Duration::from_secs(300) }),
        ("mcp", RateLimit { max_calls: 20, window: Duration::from_secs(300) }),
    ]
    .into_iter()
    .collect()
}

/// Sliding-window rate limiter keyed by tool name (MCP tools share one `mcp` bucket).
pub struct RateLimiter {
    limits: HashMap<&'static str, RateLimit>,
    calls: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limits: default_limits(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `(allowed, reason)`. Records this call if allowed.
    pub async fn check(&self, tool_name: &str) -> (bool, String) {
        let limit_key = if tool_name.starts_with("mcp_") { "mcp" } else { tool_name };
        let Some(limit) = self.limits.get(limit_key) else {
            return (true, "no_limit".to_string());
        };

        let now = Instant::now();
        let cutoff = now - limit.window;
        let mut calls = self.calls.lock().await;
        let entry = calls.entry(limit_key.to_string()).or_default();
        entry.retain(|t| *t > cutoff);

        if entry.len() >= limit.max_calls {
            let retry_after = entry[0] + limit.window - now;
            return (
                false,
                format!(
                    "Rate limited: {tool_name} exceeded {} calls per {}s. Retry in {}s.",
                    limit.max_calls,
                    limit.window.as_secs(),
                    retry_after.as_secs()
                ),
            );
        }

        entry.push(now);
        (true, "ok".to_string())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_tool_is_always_allowed() {
        let limiter = RateLimiter::new();
        let (allowed, _) = limiter.check("memory_search").await;
        assert!(allowed);
    }

    #[tokio::test]
    async fn exceeding_limit_denies_with_retry_after() {
        let limiter = RateLimiter::new();
        for _ in 0..30 {
            let (allowed, _) = limiter.check("fetch_url").await;
            assert!(allowed);
        }
        let (allowed, reason) = limiter.check("fetch_url").await;
        assert!(!allowed);
        assert!(reason.contains("Retry in"));
    }

    #[tokio::test]
    async fn mcp_tools_share_one_bucket() {
        let limiter = RateLimiter::new();
        for _ in 0..20 {
            let (allowed, _) = limiter.check("mcp_whatever").await;
            assert!(allowed);
        }
        let (allowed, _) = limiter.check("mcp_other").await;
        assert!(!allowed);
    }
}
