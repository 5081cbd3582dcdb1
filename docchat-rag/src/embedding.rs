//! Embedding provider trait for turning question text into a query vector.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::EmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(config)?;
/// let embedding = provider.embed("how do I reset my password?").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality the index expects.
    fn dimensions(&self) -> usize;

    /// Return the model identifier, for diagnostics.
    fn model(&self) -> &str;
}
