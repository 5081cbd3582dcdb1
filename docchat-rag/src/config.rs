//! Configuration for the search index, model providers, and delegate orchestrator.
//!
//! Every type here is plain data handed to the pipeline at startup. Nothing in this
//! crate reads the process environment; the server crate owns that concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default dimensionality for `text-embedding-3-small`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Default chat-completion model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Whether TLS certificates presented by the search cluster are verified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Verify certificates (the default everywhere but non-production https).
    #[default]
    Verify,
    /// Accept any certificate, for self-signed or expired internal clusters.
    SkipVerification,
}

/// The override flags that feed [`TlsPolicy::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsOverrides {
    /// Explicit "verify certificates" flag (`OPENSEARCH_SSL_VERIFY`).
    pub ssl_verify: Option<bool>,
    /// Explicit "reject unauthorized" flag (`NODE_TLS_REJECT_UNAUTHORIZED`).
    pub reject_unauthorized: Option<bool>,
    /// Whether the process runs in a production environment.
    pub production: bool,
}

impl TlsPolicy {
    /// Resolve the policy for `endpoint` from the override flags.
    ///
    /// Precedence: `ssl_verify` wins over `reject_unauthorized`, which wins over the
    /// environment default. Non-production environments talking https to the
    /// cluster skip verification so that internal test clusters with expired
    /// certificates keep working; production always verifies unless overridden.
    pub fn resolve(overrides: &TlsOverrides, endpoint: &str) -> Self {
        let verify = match (overrides.ssl_verify, overrides.reject_unauthorized) {
            (Some(verify), _) => verify,
            (None, Some(reject)) => reject,
            (None, None) => {
                let encrypted = endpoint.trim_start().to_ascii_lowercase().starts_with("https://");
                overrides.production || !encrypted
            }
        };
        if verify { Self::Verify } else { Self::SkipVerification }
    }

    /// Returns `true` when certificate verification is disabled.
    pub fn skips_verification(self) -> bool {
        matches!(self, Self::SkipVerification)
    }
}

/// Parse a boolean-ish flag value (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Connection and query parameters for the OpenSearch index.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Cluster endpoint, e.g. `https://localhost:9200`.
    pub url: Option<String>,
    /// Basic-auth username.
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Index holding the document chunks.
    pub index: String,
    /// Name of the `knn_vector` field.
    pub vector_field: String,
    /// Number of neighbors to request.
    pub top_k: usize,
    /// Certificate verification policy.
    pub tls: TlsPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("url", &self.url.as_deref().map(crate::error::redact_endpoint))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("index", &self.index)
            .field("vector_field", &self.vector_field)
            .field("top_k", &self.top_k)
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            index: "documents".to_string(),
            vector_field: "embeddings".to_string(),
            top_k: 2,
            tls: TlsPolicy::Verify,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SearchConfig {
    /// Create a new builder for constructing a [`SearchConfig`].
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Set the cluster endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Set the basic-auth credential pair.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// Set the index name.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.config.index = index.into();
        self
    }

    /// Set the vector field name.
    pub fn vector_field(mut self, field: impl Into<String>) -> Self {
        self.config.vector_field = field.into();
        self
    }

    /// Set the number of neighbors to request.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the certificate verification policy.
    pub fn tls(mut self, tls: TlsPolicy) -> Self {
        self.config.tls = tls;
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the [`SearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if:
    /// - `top_k == 0`
    /// - the index or vector field name is empty
    /// - the url is set but does not parse
    pub fn build(self) -> Result<SearchConfig> {
        if self.config.top_k == 0 {
            return Err(ChatError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.index.trim().is_empty() {
            return Err(ChatError::Config("index name must not be empty".to_string()));
        }
        if self.config.vector_field.trim().is_empty() {
            return Err(ChatError::Config("vector field name must not be empty".to_string()));
        }
        if let Some(url) = &self.config.url {
            reqwest::Url::parse(url).map_err(|e| {
                ChatError::Config(format!(
                    "invalid OpenSearch URL '{}': {e}",
                    crate::error::redact_endpoint(url)
                ))
            })?;
        }
        Ok(self.config)
    }
}

/// Parameters for the embedding provider.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base, without the `/embeddings` suffix.
    pub base_url: String,
    /// Embedding model identifier.
    pub model: String,
    /// Dimension baked into the index mapping.
    pub dimensions: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Parameters for the chat-completion provider.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Provider API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Chat model identifier.
    pub model: String,
    /// Sampling temperature. Low but nonzero.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationConfig {
    /// Check the sampling parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if `temperature` is outside `(0, 2]` or
    /// `max_tokens == 0`.
    pub fn validate(&self) -> Result<()> {
        if !(self.temperature > 0.0 && self.temperature <= 2.0) {
            return Err(ChatError::Config(format!(
                "temperature ({}) must be in (0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Parameters for the Langflow delegate path.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateConfig {
    /// Langflow base URL, e.g. `http://localhost:7860`.
    pub url: Option<String>,
    /// Flow to run.
    pub flow_id: Option<String>,
    /// Value for the `x-api-key` header.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for DelegateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateConfig")
            .field("url", &self.url.as_deref().map(crate::error::redact_endpoint))
            .field("flow_id", &self.flow_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self { url: None, flow_id: None, api_key: None, timeout: Duration::from_secs(120) }
    }
}
