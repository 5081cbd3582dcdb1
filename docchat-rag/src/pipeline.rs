//! Semantic query pipeline.
//!
//! The [`SemanticPipeline`] answers a question by composing an
//! [`EmbeddingProvider`], a [`VectorStore`], and a [`Generator`]:
//! embed → search → assemble context → generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{Query, SemanticPipeline};
//!
//! let pipeline = SemanticPipeline::builder()
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(store))
//!     .generator(Arc::new(generator))
//!     .top_k(2)
//!     .build()?;
//!
//! let answer = pipeline.answer(&Query::new("What is RAG?", None)?).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{EmbeddingConfig, GenerationConfig, SearchConfig};
use crate::context::assemble_context;
use crate::document::{
    Answer, DocumentSummary, Query, RetrievedDocument, SearchInfo, SearchMode, SemanticSearchInfo,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{ChatError, Result};
use crate::generation::{Generator, NO_RESPONSE_GENERATED};
use crate::openai::{OpenAIChatGenerator, OpenAIEmbeddingProvider};
use crate::opensearch::OpenSearchStore;
use crate::vectorstore::VectorStore;

/// Answer returned when the index has nothing relevant to the question.
pub const NO_RELEVANT_DOCUMENTS: &str =
    "No relevant documents found in the knowledge base for your question.";

/// The semantic retrieval-and-generation pipeline.
///
/// Holds long-lived, stateless clients; one instance serves every request.
/// Construct one via [`SemanticPipeline::builder()`] or
/// [`SemanticPipeline::from_config()`].
pub struct SemanticPipeline {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl SemanticPipeline {
    /// Create a new [`SemanticPipelineBuilder`].
    pub fn builder() -> SemanticPipelineBuilder {
        SemanticPipelineBuilder::default()
    }

    /// Build the OpenSearch + OpenAI pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if an endpoint or API key is missing.
    /// Nothing is sent over the network.
    pub fn from_config(
        search: &SearchConfig,
        embedding: &EmbeddingConfig,
        generation: &GenerationConfig,
    ) -> Result<Self> {
        let embedding_provider = Arc::new(OpenAIEmbeddingProvider::new(embedding)?);
        let generator = Arc::new(OpenAIChatGenerator::new(generation)?);
        let vector_store = Arc::new(OpenSearchStore::new(search)?);
        info!(
            index = %search.index,
            field = %search.vector_field,
            k = search.top_k,
            embedding_model = %embedding.model,
            chat_model = %generation.model,
            "semantic pipeline initialized"
        );
        Self::builder()
            .embedding_provider(embedding_provider)
            .vector_store(vector_store)
            .generator(generator)
            .top_k(search.top_k)
            .build()
    }

    /// The number of documents requested per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the documents for `query`: embed → search.
    ///
    /// # Errors
    ///
    /// Propagates embedding and search failures unchanged. Returns
    /// [`ChatError::Config`] when the embedding length differs from the
    /// provider's declared dimensions.
    pub async fn search(&self, query: &Query) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.embedding_provider.embed(query.text()).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let expected = self.embedding_provider.dimensions();
        if embedding.len() != expected {
            error!(returned = embedding.len(), expected, "embedding dimension mismatch");
            return Err(ChatError::Config(format!(
                "embedding dimension mismatch: model '{}' returned {} values but the index expects {}",
                self.embedding_provider.model(),
                embedding.len(),
                expected
            )));
        }

        self.vector_store.search(&embedding, self.top_k).await.map_err(|e| {
            error!(index = self.vector_store.index_name(), error = %e, "vector search failed");
            e
        })
    }

    /// Answer `query`: embed → search → assemble → generate.
    ///
    /// When nothing is retrieved the generator is not called and the answer
    /// is [`NO_RELEVANT_DOCUMENTS`]. A generation failure degrades to
    /// [`NO_RESPONSE_GENERATED`] instead of failing the request.
    ///
    /// # Errors
    ///
    /// Returns an error only when embedding or retrieval fails.
    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        let documents = self.search(query).await?;
        let context = assemble_context(&documents);

        let (answer, generation_model) = if context.is_empty() {
            info!(session_id = query.session_id(), "no documents retrieved, skipping generation");
            (NO_RELEVANT_DOCUMENTS.to_string(), None)
        } else {
            let text = match self.generator.generate(query.text(), &context).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    warn!(model = self.generator.model(), "generation returned no text");
                    NO_RESPONSE_GENERATED.to_string()
                }
                Err(e) => {
                    warn!(model = self.generator.model(), error = %e, "generation failed");
                    NO_RESPONSE_GENERATED.to_string()
                }
            };
            (text, Some(self.generator.model().to_string()))
        };

        let retrieved_docs: Vec<DocumentSummary> =
            documents.iter().enumerate().map(|(i, doc)| DocumentSummary::new(i + 1, doc)).collect();

        info!(
            session_id = query.session_id(),
            docs_retrieved = retrieved_docs.len(),
            "semantic query completed"
        );

        Ok(Answer {
            answer,
            session_id: query.session_id().to_string(),
            search_type: SearchMode::Semantic,
            docs_retrieved: Some(retrieved_docs.len()),
            retrieved_docs: Some(retrieved_docs),
            search_info: SearchInfo::Semantic(SemanticSearchInfo {
                query: query.text().to_string(),
                index: self.vector_store.index_name().to_string(),
                vector_field: self.vector_store.vector_field().to_string(),
                k: self.top_k,
                embedding_model: self.embedding_provider.model().to_string(),
                generation_model,
            }),
        })
    }
}

/// Builder for constructing a [`SemanticPipeline`].
///
/// All fields except `top_k` (default 2) are required.
#[derive(Default)]
pub struct SemanticPipelineBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn Generator>>,
    top_k: Option<usize>,
}

impl SemanticPipelineBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the number of documents to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Build the [`SemanticPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if a component is missing or `top_k == 0`.
    pub fn build(self) -> Result<SemanticPipeline> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| ChatError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| ChatError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| ChatError::Config("generator is required".to_string()))?;
        let top_k = self.top_k.unwrap_or(2);
        if top_k == 0 {
            return Err(ChatError::Config("top_k must be greater than zero".to_string()));
        }

        Ok(SemanticPipeline { embedding_provider, vector_store, generator, top_k })
    }
}
