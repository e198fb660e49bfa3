//! `fetch_url` built-in: HTTP GET with a response-size cap.
//!
//! URL risk classification (loopback/private-range rejection) is the Permission
//! Gate's job, not this tool's; this tool only performs the request. A
//! same-URL repeat is served from the attached [`UrlCache`] when present,
//! marked with the `[CACHE_HIT]` prefix tool results use for a cached result.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::UrlCache;
use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

const MAX_BODY_BYTES: usize = 200_000;

pub struct FetchUrlTool {
    client: reqwest::Client,
    cache: Option<Arc<UrlCache>>,
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: None,
        }
    }
}

impl FetchUrlTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<UrlCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetches the contents of a URL via HTTP GET."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "http(s) URL to fetch"}
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(url) = args.get("url").and_then(|v| v.as_str()) else {
            return arg_error("fetch_url", "missing required string arg `url`");
        };

        let parsed = match url::Url::parse(url) {
            Ok(u) => u,
            Err(e) => return arg_error("fetch_url", format!("invalid url: {e}")),
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return arg_error("fetch_url", "only http/https URLs are supported");
        }

        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url).await {
                return ToolCallContent::new(format!("[CACHE_HIT]{body}"));
            }
        }

        match self.client.get(parsed).send().await {
            Ok(resp) => {
                let status = resp.status();
                match resp.text().await {
                    Ok(mut body) => {
                        if body.len() > MAX_BODY_BYTES {
                            body.truncate(MAX_BODY_BYTES);
                            body.push_str("...[truncated]");
                        }
                        if status.is_success() {
                            if let Some(cache) = &self.cache {
                                if let Err(e) = cache.set(url, &body).await {
                                    tracing::warn!(error = %e, "fetch_url: cache write failed");
                                }
                            }
                            ToolCallContent::new(body)
                        } else {
                            ToolCallContent::new(format!("[ERROR] fetch_url: HTTP {status}: {body}"))
                        }
                    }
                    Err(e) => ToolCallContent::new(format!("[ERROR] fetch_url: body read failed: {e}")),
                }
            }
            Err(e) => ToolCallContent::new(format!("[ERROR] fetch_url: request failed: {e}")),
        }
    }
}
