//! Process-wide compiled-graph cache, keyed by the SHA-256 of the effective
//! config's canonical (sorted-key) JSON.
//!
//! Mirrors [`crate::cache::PromptCache`]'s fingerprint-then-lookup shape, but in
//! memory rather than on disk: compiling a `StateGraph` is cheap structurally, but
//! every process that serves more than one session with the same graph config
//! should build it once, not once per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::error::AgentError;
use crate::graph::CompiledStateGraph;
use crate::llm::LlmClient;
use crate::memory::Checkpointer;
use crate::state::AgentState;
use crate::tools::ToolRegistry;

use super::assembly;
use super::schema::GraphConfig;

/// Hashes `config`'s canonical JSON to a hex digest used as the cache key.
pub fn content_hash(config: &GraphConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.canonical_json().as_bytes());
    hex::encode(hasher.finalize())
}

/// A process-wide cache of compiled graphs, one entry per distinct effective
/// config. Not a global/static singleton by itself: callers own one instance
/// (typically behind a `once_cell::sync::Lazy` or held by the Runner) and share
/// it across sessions that reuse the same `llm`/`registry`/checkpointer.
#[derive(Default)]
pub struct CompiledGraphCache {
    entries: Mutex<HashMap<String, Arc<CompiledStateGraph<AgentState>>>>,
}

impl CompiledGraphCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the graph compiled for `config`, from cache if an identical
    /// config (by content hash) was compiled before, otherwise building and
    /// caching it. `llm`/`registry`/`checkpointer` are only consulted on a
    /// cache miss: a cache hit reuses whatever was baked into the first build.
    pub async fn get_or_build(
        &self,
        config: &GraphConfig,
        llm: Arc<dyn LlmClient>,
        registry: &ToolRegistry,
        checkpointer: Option<Arc<dyn Checkpointer<AgentState>>>,
    ) -> Result<Arc<CompiledStateGraph<AgentState>>, AgentError> {
        let key = content_hash(config);

        if let Some(hit) = self.lock().get(&key).cloned() {
            return Ok(hit);
        }

        let compiled = Arc::new(assembly::build(config, llm, registry, checkpointer).await?);
        self.lock().insert(key, compiled.clone());
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<CompiledStateGraph<AgentState>>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
