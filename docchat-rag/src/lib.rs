//! # docchat-rag
//!
//! Question answering over an OpenSearch document index.
//!
//! Two modes share one [`Answer`] contract:
//!
//! - **Semantic**: [`SemanticPipeline`] embeds the question, runs a k-NN
//!   search, assembles a rank-labeled [`ContextWindow`], and asks a chat model
//!   to answer from that context only.
//! - **Hybrid**: [`LangflowClient`] forwards the question to a Langflow flow
//!   (which does its own BM25 + vector fusion) and normalizes whatever shape
//!   the flow replies with.
//!
//! Configuration is plain data ([`SearchConfig`], [`EmbeddingConfig`],
//! [`GenerationConfig`], [`DelegateConfig`]); this crate never reads the
//! environment.

pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod langflow;
pub mod openai;
pub mod opensearch;
pub mod pipeline;
pub mod vectorstore;

pub use config::{
    DelegateConfig, EmbeddingConfig, GenerationConfig, SearchConfig, SearchConfigBuilder,
    TlsOverrides, TlsPolicy, parse_flag,
};
pub use context::{ContextWindow, DOCUMENT_SEPARATOR, assemble_context};
pub use document::{
    Answer, DocumentSummary, HybridSearchInfo, Query, RetrievedDocument, SearchInfo, SearchMode,
    SemanticSearchInfo,
};
pub use embedding::EmbeddingProvider;
pub use error::{ChatError, Result};
pub use generation::{Generator, NO_RESPONSE_GENERATED};
pub use inmemory::InMemoryVectorStore;
pub use langflow::{LangflowClient, NO_RESPONSE_RECEIVED};
pub use openai::{OpenAIChatGenerator, OpenAIEmbeddingProvider};
pub use opensearch::OpenSearchStore;
pub use pipeline::{NO_RELEVANT_DOCUMENTS, SemanticPipeline, SemanticPipelineBuilder};
pub use vectorstore::VectorStore;
