//! Data types for queries, retrieved documents, and answers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Number of characters of a retrieved document shown in an [`Answer`].
pub const DISPLAY_TEXT_LEN: usize = 500;

/// A user question plus the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    session_id: String,
}

impl Query {
    /// Create a query, generating a session id when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] if `text` is blank.
    pub fn new(text: impl Into<String>, session_id: Option<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ChatError::InvalidRequest("Message is required".to_string()));
        }
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(Self { text, session_id })
    }

    /// The raw question text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The session id, supplied or generated.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// A chunk returned by the search index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    /// Source text of the chunk.
    pub text: String,
    /// Engine-defined relevance score (higher is more relevant).
    pub score: f32,
    /// Provenance of the chunk, usually the source file path.
    pub file_path: String,
}

/// The retrieval mode that produced an [`Answer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Local k-NN search plus generation.
    Semantic,
    /// Delegated to the Langflow orchestrator.
    Hybrid,
}

/// A retrieved document as shown to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    /// 1-based rank.
    pub rank: usize,
    /// Relevance score from the index.
    pub score: f32,
    /// Text, truncated to [`DISPLAY_TEXT_LEN`] characters.
    pub text: String,
    /// Provenance path.
    pub file_path: String,
}

impl DocumentSummary {
    /// Summarize `document` at the given 1-based `rank`.
    pub fn new(rank: usize, document: &RetrievedDocument) -> Self {
        Self {
            rank,
            score: document.score,
            text: truncate_for_display(&document.text, DISPLAY_TEXT_LEN),
            file_path: document.file_path.clone(),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Diagnostics for a semantic answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticSearchInfo {
    /// The question that was embedded.
    pub query: String,
    /// Index that was searched.
    pub index: String,
    /// Vector field that was searched.
    pub vector_field: String,
    /// Number of neighbors requested.
    pub k: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Generation model identifier, absent when generation was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_model: Option<String>,
}

/// Diagnostics for a hybrid answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HybridSearchInfo {
    /// The question that was forwarded.
    pub query: String,
    /// Langflow flow that answered.
    pub flow_id: String,
    /// Which extraction rule produced the answer, if any did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_from: Option<String>,
}

/// Diagnostic block attached to every [`Answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchInfo {
    /// Produced by the local pipeline.
    Semantic(SemanticSearchInfo),
    /// Produced by the delegate path.
    Hybrid(HybridSearchInfo),
}

/// The structured result returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Free-text answer.
    pub answer: String,
    /// Session id, echoed or generated.
    pub session_id: String,
    /// Mode that produced the answer.
    pub search_type: SearchMode,
    /// Number of documents retrieved (semantic mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_retrieved: Option<usize>,
    /// Summaries of the retrieved documents (semantic mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_docs: Option<Vec<DocumentSummary>>,
    /// What produced this answer.
    pub search_info: SearchInfo,
}
