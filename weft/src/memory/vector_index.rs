//! Lazily-built in-memory vector index over memory entries and daily-log entries.
//!
//! A single process-local index, not a managed vector database: a dirty flag forces
//! a rebuild on the next read after any entry
//! mutation, guarded by its own lock so index lifecycle never blocks ordinary reads of
//! the JSON store.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::memory::embedder::{Embedder, EmbedderError};

/// A single embedded document: a memory entry or a daily-log entry.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub category: Option<String>,
    pub salience: Option<f32>,
    pub vector: Vec<f32>,
}

/// One scored hit from [`VectorIndex::search`], before decay/salience weighting is
/// applied by the caller.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub category: Option<String>,
    pub salience: Option<f32>,
    pub semantic_score: f32,
}

/// An unembedded document source handed to [`VectorIndex::rebuild`].
pub struct DocumentSource {
    pub id: String,
    pub text: String,
    pub category: Option<String>,
    pub salience: Option<f32>,
}

#[derive(Default)]
struct IndexState {
    documents: Vec<IndexedDocument>,
    dirty: bool,
    built: bool,
}

/// Lazily-built, dirty-flag-invalidated vector index.
///
/// `rebuild` is idempotent and safe to call from multiple readers; only one rebuild runs
/// at a time because the whole state lives behind a single `RwLock`.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Marks the index stale; the next call to [`VectorIndex::search`] rebuilds from
    /// `sources` before scoring. Called after any memory/daily-log mutation.
    pub async fn mark_dirty(&self) {
        self.state.write().await.dirty = true;
    }

    /// Rebuilds the index from scratch over `sources`, embedding every document in one
    /// batched call.
    pub async fn rebuild(&self, sources: Vec<DocumentSource>) -> Result<(), EmbedderError> {
        let texts: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&texts).await?
        };

        let documents = sources
            .into_iter()
            .zip(vectors)
            .map(|(source, vector)| IndexedDocument {
                id: source.id,
                text: source.text,
                category: source.category,
                salience: source.salience,
                vector,
            })
            .collect();

        let mut state = self.state.write().await;
        state.documents = documents;
        state.dirty = false;
        state.built = true;
        Ok(())
    }

    /// Searches the index, rebuilding first if dirty or never built. `top_k` candidates
    /// are returned ranked by raw semantic score; decay/salience weighting and category
    /// filtering are applied by the caller.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        rebuild_if_needed: impl FnOnce() -> Option<Vec<DocumentSource>>,
    ) -> Result<Vec<VectorHit>, EmbedderError> {
        {
            let needs_rebuild = {
                let state = self.state.read().await;
                state.dirty || !state.built
            };
            if needs_rebuild {
                if let Some(sources) = rebuild_if_needed() {
                    self.rebuild(sources).await?;
                }
            }
        }

        let query_vector = self
            .embedder
            .embed(&[query])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedderError::Empty)?;

        let state = self.state.read().await;
        let mut hits: Vec<VectorHit> = state
            .documents
            .iter()
            .map(|doc| VectorHit {
                id: doc.id.clone(),
                category: doc.category.clone(),
                salience: doc.salience,
                semantic_score: cosine_similarity(&query_vector, &doc.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.semantic_score.total_cmp(&a.semantic_score));
        hits.truncate(top_k);
        Ok(hits)
    }

    pub async fn is_ready(&self) -> bool {
        let state = self.state.read().await;
        state.built && !state.dirty
    }
}

/// Cosine similarity between two equal-length vectors; `0.0` when either has zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
