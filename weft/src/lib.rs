//! # Weft
//!
//! A graph-based execution engine for local AI digital workers. One shared
//! [`AgentState`] flows through a small, fixed graph of nodes —
//! `agent -> plan_gate -> approval -> executor -> replanner -> summarizer` — with
//! conditional routing back through the loop until the plan finishes or the agent
//! responds directly.
//!
//! ## Design principles
//!
//! - **Single state type**: every node reads and writes [`AgentState`].
//! - **Partial updates**: a node returns only the fields it changed; the compiled
//!   graph's [`AgentStateUpdater`] folds the partial into the running state
//!   (message append-or-replace-by-id, event accumulation, overwrite elsewhere).
//! - **State graphs**: [`StateGraph`] compiles to [`CompiledStateGraph`], with
//!   conditional edges, retry, middleware, checkpointing, and human-in-the-loop
//!   suspension.
//!
//! ## Main modules
//!
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`].
//! - [`nodes`]: the six top-level nodes ([`AgentNode`], [`PlanGateNode`],
//!   [`ApprovalNode`], [`ExecutorNode`], [`ReplannerNode`], [`SummarizerNode`]).
//! - [`graph_config`]: [`GraphConfig`] (YAML-backed node/edge toggles),
//!   [`build_graph`], and [`CompiledGraphCache`] (content-hash keyed reuse).
//! - [`state`]: [`AgentState`], [`Plan`], [`Step`].
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], [`ChatOpenAI`].
//! - [`tools`] / [`tool_source`]: the built-in tool set and the dynamic tool seam.
//! - [`memory`]: checkpointing ([`Checkpointer`], [`MemorySaver`]) and the vector
//!   index backing long-term memory.
//! - [`cache`]: [`Cache`], [`TwoTierCache`] and the facades built on it
//!   ([`UrlCache`], [`LlmReplyCache`], [`PromptCache`], [`TranslateCache`],
//!   [`CachedTool`]).
//! - [`message`]: [`Message`], [`Role`].
//! - [`stream`]: [`StreamEvent`], [`StreamWriter`] for incremental output, and
//!   [`EventStreamAdapter`] for translating per-call LLM/tool events into the
//!   normalised [`EmittedEvent`]s a transport forwards to a client.
//! - [`channels`]: [`StateUpdater`], [`FieldBasedUpdater`] and friends.
//! - [`permission`]: [`permission::PermissionGate`], [`SecuredTool`], the risk
//!   classifiers, and the audit trail.
//! - [`prompt`]: [`build_system_prompt`], the skills snapshot, and implicit recall.
//! - [`runner`]: [`Runner`], the top-level entry point tying the graph, prompt
//!   builder, event adapter, and approval registry into one streamed turn.
//! - [`error`]: [`AgentError`].

pub mod cache;
pub mod channels;
pub mod error;
pub mod graph;
pub mod graph_config;
pub mod llm;
pub mod memory;
pub mod message;
pub mod nodes;
pub mod permission;
pub mod prompt;
pub mod runner;
pub mod state;
pub mod stream;
pub mod tool_source;
pub mod tools;

pub use cache::{
    Cache, CacheError, CachedTool, DiskCache, InMemoryCache, LlmReplyCache, LlmReplyKeyParams,
    PromptCache, TranslateCache, TwoTierCache, UrlCache,
};
pub use channels::{
    BoxedStateUpdater, Channel, ChannelError, EphemeralValue, FieldBasedUpdater,
    NamedBarrierValue, ReplaceUpdater, StateUpdater,
};
pub use error::AgentError;
pub use graph::{
    generate_dot, generate_text, CompilationError, CompiledStateGraph, DefaultInterruptHandler,
    GraphInterrupt, Interrupt, InterruptHandler, InvokeOutcome, LoggingNodeMiddleware, NameNode,
    Next, Node, NodeMiddleware, RetryPolicy, RunContext, Runtime, StateGraph, END, START,
};
pub use graph_config::{
    build_graph, content_hash, CompiledGraphCache, GraphConfig, GraphConfigFile,
};
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, ToolChoiceMode};
pub use memory::{
    archive_daily_log, cleanup_old_logs, compress_memories, consolidate_memory,
    decide_consolidation, execute_reflect_results, reflect_on_session, summarize_daily_log,
    ArchiveStatus, Checkpoint, CheckpointError, CheckpointListItem, CheckpointMetadata,
    Checkpointer, CleanupReport, CompressionStats, ConsolidationResult, DailyLog, DailyLogEntry,
    Decision, Embedder, MemoryCategory, MemoryContext, MemoryData, MemoryEntry, MemorySaver,
    MemoryStore, OpenAIEmbedder, ReflectionDecision, RunnableConfig, SearchHit, ToolCallSummary,
};
pub use message::{Message, Role, ToolCallRequest};
pub use nodes::{
    AgentNode, ApprovalNode, ExecutorNode, PlanGateNode, ReplannerNode, SummarizerNode,
};
pub use permission::{
    get_tool_policy, ApprovalOutcome, AuditEntry, AuditLogger, PermissionGate, RateLimit,
    RateLimiter, RiskLevel, SecuredTool, SecurityLevel, ToolPolicy,
};
pub use prompt::{
    build_implicit_recall_context, build_system_prompt, generate_skills_snapshot,
    substitute_placeholders, PromptBuilderConfig,
};
pub use runner::{
    ApprovalDecision, DebugLevel, DebugMiddleware, DebugSink, InMemoryCollector,
    PlanApprovalRegistry, RunMiddleware, Runner, RunnerContext, RunnerDeps,
};
pub use state::{
    AgentOutcome, AgentState, AgentStateUpdater, Plan, ReplanAction, Step, StepStatus,
};
pub use stream::{
    EmittedEvent, EventStreamAdapter, MessageChunk, ModelPrice, PricingTable, StreamEvent,
    StreamMode, StreamWriter, ToolStreamWriter,
};
pub use tool_source::{
    ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec,
};
pub use tools::{
    FetchUrlTool, FileReadTool, FileWriteTool, GlobTool, ListDirTool, MemoryBackend,
    MemorySearchTool, MemoryStoreHandle, MemoryWriteTool, PlanCreateTool, Tool, ToolRegistry,
    TerminalTool,
};

/// When running `cargo test -p weft`, initializes tracing from `RUST_LOG` so unit
/// tests can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
