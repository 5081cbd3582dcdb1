//! Answer generation from a question and its retrieved context.

use async_trait::async_trait;

use crate::context::ContextWindow;
use crate::error::Result;

/// Literal answer returned when generation fails or produces nothing.
pub const NO_RESPONSE_GENERATED: &str = "No response generated.";

/// System instruction sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only \
the provided context documents. When comparing items, prefer structured formatting such as \
tables or bulleted lists. If the answer is not contained in the context, say explicitly that \
the provided documents do not contain that information instead of guessing.";

/// A chat-completion backend conditioned on retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer to `question` grounded in `context`.
    ///
    /// Returns `Ok(None)` when the provider succeeded but produced no text.
    async fn generate(&self, question: &str, context: &ContextWindow) -> Result<Option<String>>;

    /// Return the model identifier, for diagnostics.
    fn model(&self) -> &str;
}

/// Build the user turn: the context followed by the question.
pub fn user_prompt(question: &str, context: &ContextWindow) -> String {
    format!("Context:\n{}\n\nQuestion: {question}", context.as_str())
}
