//! OpenAI-compatible embedding and chat-completion providers.
//!
//! Both providers call the HTTP API directly through `reqwest`, so any
//! OpenAI-compatible server can be targeted by changing `base_url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::context::ContextWindow;
use crate::document::truncate_for_display;
use crate::embedding::EmbeddingProvider;
use crate::error::{ChatError, Result, unreachable};
use crate::generation::{Generator, SYSTEM_PROMPT, user_prompt};

const PROVIDER: &str = "OpenAI";

fn require_api_key(api_key: Option<&String>) -> Result<String> {
    match api_key.map(|k| k.trim()) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(ChatError::Config("OPENAI_API_KEY is not configured".to_string())),
    }
}

fn build_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ChatError::Config(format!("failed to build {PROVIDER} HTTP client: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Longest raw error body quoted in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// The provider's `error.message`, or the start of the raw body when the body
/// is not an OpenAI error object.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => truncate_for_display(body.trim(), MAX_ERROR_BODY_CHARS),
    }
}

/// Send `body` to `url` and return the raw success body, mapping transport and
/// status failures onto [`ChatError`].
async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    api_key: &str,
    url: &str,
    body: &T,
) -> Result<String> {
    let response =
        client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
            let err = unreachable(PROVIDER, url, e);
            error!(provider = PROVIDER, error = %err, "request failed");
            err
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| unreachable(PROVIDER, url, e))?;

    if !status.is_success() {
        error!(provider = PROVIDER, %status, "API error");
        return Err(ChatError::UpstreamStatus {
            service: PROVIDER.to_string(),
            status: status.as_u16(),
            message: error_detail(&body),
        });
    }

    Ok(body)
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{EmbeddingConfig, OpenAIEmbeddingProvider};
///
/// let config = EmbeddingConfig { api_key: Some("sk-...".into()), ..Default::default() };
/// let provider = OpenAIEmbeddingProvider::new(&config)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured. No network
    /// call is made.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_api_key(config.api_key.as_ref())?;
        if config.dimensions == 0 {
            return Err(ChatError::Config("embedding dimensions must be greater than zero".into()));
        }
        Ok(Self {
            client: build_client(config.timeout)?,
            api_key,
            url: endpoint(&config.base_url, "embeddings"),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidRequest("Message is required".to_string()));
        }

        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let request_body = EmbeddingRequest { model: &self.model, input: [text] };
        let body = post_json(&self.client, &self.api_key, &self.url, &request_body).await?;

        let parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            ChatError::ResponseShape {
                service: PROVIDER.to_string(),
                message: format!("{PROVIDER} returned an unparseable embeddings response: {e}"),
                hint: None,
            }
        })?;

        let embedding = parsed.data.into_iter().next().and_then(|d| d.embedding).ok_or_else(|| {
            ChatError::ResponseShape {
                service: PROVIDER.to_string(),
                message: format!("{PROVIDER} embeddings response has no data[0].embedding field"),
                hint: None,
            }
        })?;

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// A [`Generator`] backed by the OpenAI chat-completions API.
pub struct OpenAIChatGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIChatGenerator {
    /// Create a generator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured or the
    /// sampling parameters are out of range.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = require_api_key(config.api_key.as_ref())?;
        config.validate()?;
        Ok(Self {
            client: build_client(config.timeout)?,
            api_key,
            url: endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAIChatGenerator {
    async fn generate(&self, question: &str, context: &ContextWindow) -> Result<Option<String>> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            documents = context.len(),
            "generating answer"
        );

        let prompt = user_prompt(question, context);
        let request_body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let body = post_json(&self.client, &self.api_key, &self.url, &request_body).await?;

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::ResponseShape {
                service: PROVIDER.to_string(),
                message: format!("{PROVIDER} returned an unparseable completion: {e}"),
                hint: None,
            })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
