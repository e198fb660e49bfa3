//! Embedder trait backing the long-term memory store's vector index.
//!
//! Implementations can wrap OpenAI, a local model, or a mock embedder for tests.

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced while turning text into vectors.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding provider error: {0}")]
    Provider(String),
    #[error("embedding provider returned no vectors")]
    Empty,
}

/// Produces fixed-size float vectors from text. Used by
/// [`crate::memory::vector_index::VectorIndex`] to embed memory/daily-log documents on
/// build and the search query on lookup.
///
/// Implementations must be `Send + Sync` for use from async memory-store methods.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of dimension [`Embedder::dimension`].
    /// Returns one vector per input text in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Vector dimension returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;
}
