//! Vector store trait for nearest-neighbor document retrieval.

use async_trait::async_trait;

use crate::document::RetrievedDocument;
use crate::error::Result;

/// A read-only index of document chunks searchable by vector similarity.
///
/// The target index and vector field are fixed at construction time, so a
/// search only needs the query vector and the number of neighbors.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::VectorStore;
///
/// let hits = store.search(&query_embedding, 2).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for the `top_k` chunks most similar to `embedding`.
    ///
    /// Returns results ordered by descending score. An empty result is not an
    /// error.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>>;

    /// The index name, for diagnostics.
    fn index_name(&self) -> &str;

    /// The vector field name, for diagnostics.
    fn vector_field(&self) -> &str;
}
