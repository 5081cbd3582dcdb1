//! Context window assembly.

use crate::document::RetrievedDocument;

/// Separator placed between rendered documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Rank-labeled concatenation of retrieved documents, built once per query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextWindow {
    text: String,
    documents: usize,
}

impl ContextWindow {
    /// The rendered context.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of documents rendered into the window.
    pub fn len(&self) -> usize {
        self.documents
    }

    /// Returns `true` when no documents were retrieved.
    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }
}

/// Render `documents` as `Document <rank>:\n<text>` segments joined by
/// [`DOCUMENT_SEPARATOR`]. Ranks are 1-based and follow input order.
pub fn assemble_context(documents: &[RetrievedDocument]) -> ContextWindow {
    let text = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc.text))
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR);
    ContextWindow { text, documents: documents.len() }
}
