//! `RunnerDeps`: the long-lived collaborators a [`Runner`](super::Runner) shares
//! across every turn of every session -- the compiled-graph cache, the tool
//! registry, the memory store, the caches. One instance per process (or per
//! worker), built once at startup and cloned cheaply behind `Arc`s.

use std::sync::Arc;

use crate::cache::{LlmReplyCache, PromptCache};
use crate::graph_config::{CompiledGraphCache, GraphConfig};
use crate::llm::LlmClient;
use crate::memory::{Checkpointer, MemoryStore};
use crate::prompt::PromptBuilderConfig;
use crate::state::AgentState;
use crate::stream::PricingTable;
use crate::tools::ToolRegistry;

use super::context::PlanApprovalRegistry;

/// Bundles every collaborator [`Runner::run`](super::Runner::run) needs so the
/// run function itself stays a thin procedure over already-assembled pieces,
/// matching how the node set takes its tools/LLM/checkpointer pre-built rather
/// than constructing them inline.
pub struct RunnerDeps {
    pub llm: Arc<dyn LlmClient>,
    pub registry: ToolRegistry,
    pub graph_config: GraphConfig,
    pub graph_cache: Arc<CompiledGraphCache>,
    pub checkpointer: Arc<dyn Checkpointer<AgentState>>,
    pub memory: Arc<MemoryStore>,
    pub prompt_config: PromptBuilderConfig,
    pub prompt_cache: Option<Arc<PromptCache>>,
    pub llm_reply_cache: Option<Arc<LlmReplyCache>>,
    pub pricing: Option<PricingTable>,
    pub approvals: Arc<PlanApprovalRegistry>,
}

impl RunnerDeps {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        graph_config: GraphConfig,
        checkpointer: Arc<dyn Checkpointer<AgentState>>,
        memory: Arc<MemoryStore>,
        prompt_config: PromptBuilderConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            graph_config,
            graph_cache: Arc::new(CompiledGraphCache::new()),
            checkpointer,
            memory,
            prompt_config,
            prompt_cache: None,
            llm_reply_cache: None,
            pricing: None,
            approvals: Arc::new(PlanApprovalRegistry::new()),
        }
    }

    pub fn with_prompt_cache(mut self, cache: Arc<PromptCache>) -> Self {
        self.prompt_cache = Some(cache);
        self
    }

    pub fn with_llm_reply_cache(mut self, cache: Arc<LlmReplyCache>) -> Self {
        self.llm_reply_cache = Some(cache);
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }
}
