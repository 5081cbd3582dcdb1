//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps pre-embedded chunks in a `Vec` behind a
//! `tokio::sync::RwLock`. It stands in for OpenSearch in local development
//! and tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::RetrievedDocument;
use crate::error::{ChatError, Result};
use crate::vectorstore::VectorStore;

const DEFAULT_VECTOR_FIELD: &str = "embeddings";

#[derive(Debug, Clone)]
struct StoredChunk {
    text: String,
    file_path: String,
    embedding: Vec<f32>,
}

/// An in-memory [`VectorStore`] for development and testing.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new("documents", 3);
/// store.insert("Paris is in France.", "geo.md", vec![1.0, 0.0, 0.0]).await?;
/// let hits = store.search(&[1.0, 0.0, 0.0], 2).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    index: String,
    vector_field: String,
    dimensions: usize,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    /// Create an empty store whose vectors have `dimensions` entries.
    pub fn new(index: impl Into<String>, dimensions: usize) -> Self {
        Self {
            index: index.into(),
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            dimensions,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Name the vector field reported in answer diagnostics.
    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    /// Add a pre-embedded chunk.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the embedding length does not match
    /// the store's dimensions.
    pub async fn insert(
        &self,
        text: impl Into<String>,
        file_path: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(ChatError::Config(format!(
                "embedding has {} dimensions but index '{}' expects {}",
                embedding.len(),
                self.index,
                self.dimensions
            )));
        }
        self.chunks.write().await.push(StoredChunk {
            text: text.into(),
            file_path: file_path.into(),
            embedding,
        });
        Ok(())
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Returns `true` when nothing has been inserted.
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let chunks = self.chunks.read().await;
        let mut scored: Vec<RetrievedDocument> = chunks
            .iter()
            .map(|chunk| RetrievedDocument {
                text: chunk.text.clone(),
                score: cosine_similarity(&chunk.embedding, embedding),
                file_path: chunk.file_path.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn index_name(&self) -> &str {
        &self.index
    }

    fn vector_field(&self) -> &str {
        &self.vector_field
    }
}
