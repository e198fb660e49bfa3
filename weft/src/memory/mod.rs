//! # Memory: Checkpointing, IDs, and Long-term Store
//!
//! [`Checkpointer`] persists per-thread graph state snapshots for resumable
//! runs and interrupt/resume. [`MemoryStore`] is the long-term memory layer:
//! structured [`MemoryEntry`] records plus daily logs, searchable via
//! [`VectorIndex`] and [`Embedder`] with a keyword-scan fallback.
//!
//! ## Config
//!
//! [`RunnableConfig`] is passed to `CompiledStateGraph::invoke`:
//! - `thread_id`: identifies the conversation/thread; required to checkpoint.
//! - `checkpoint_id`: optional, loads a specific checkpoint (time-travel).
//! - `checkpoint_ns`: optional namespace for subgraphs.
//!
//! ## Checkpointer Implementations
//!
//! | Type          | Persistence | Use case       |
//! |---------------|-------------|-----------------|
//! | [`MemorySaver`] | In-memory  | Dev, tests, default runner use |
//!
//! Use with [`StateGraph::compile_with_checkpointer`](crate::graph::StateGraph::compile_with_checkpointer).

mod archive;
mod checkpoint;
mod checkpointer;
mod compress;
mod config;
mod consolidate;
mod embedder;
mod entry;
mod ids;
mod memory_saver;
mod openai_embedder;
mod reflect;
mod similarity;
mod store;
mod vector_index;

pub use archive::{archive_daily_log, cleanup_old_logs, summarize_daily_log, ArchiveStatus, CleanupReport};
pub use checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata, CheckpointReason};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use compress::{compress_memories, CompressionStats};
pub use config::RunnableConfig;
pub use consolidate::{consolidate_memory, decide_consolidation, ConsolidationResult, Decision};
pub use embedder::{Embedder, EmbedderError};
pub use entry::{DailyLog, DailyLogEntry, MemoryCategory, MemoryContext, MemoryEntry};
pub use ids::short_hex_id;
pub use memory_saver::{new_checkpoint, MemorySaver};
pub use openai_embedder::OpenAIEmbedder;
pub use reflect::{execute_reflect_results, reflect_on_session, ReflectionDecision, ToolCallSummary};
pub use similarity::{jaccard_word_similarity, text_similarity};
pub use store::{MemoryData, MemoryStore, SearchHit};
pub use vector_index::{cosine_similarity, DocumentSource, IndexedDocument, VectorHit, VectorIndex};
