//! Environment-backed server configuration.
//!
//! Values are read through a lookup function so that tests can supply a map
//! instead of mutating the process environment. Missing endpoints and keys
//! are left unset here; they surface as configuration errors on the first
//! request that needs them.

use std::str::FromStr;
use std::time::Duration;

use docchat_rag::{
    DelegateConfig, EmbeddingConfig, GenerationConfig, SearchConfig, TlsOverrides, TlsPolicy,
    parse_flag,
};
use tracing::warn;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3000;

/// Everything the server needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub delegate: DelegateConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            delegate: DelegateConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> docchat_rag::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a value is present but invalid, e.g.
    /// `OPENSEARCH_TOP_K=0` or an unparseable `OPENSEARCH_URL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> docchat_rag::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let production = get("APP_ENV")
            .or_else(|| get("NODE_ENV"))
            .is_some_and(|env| env.eq_ignore_ascii_case("production"));
        let overrides = TlsOverrides {
            ssl_verify: get("OPENSEARCH_SSL_VERIFY").as_deref().and_then(parse_flag),
            reject_unauthorized: get("NODE_TLS_REJECT_UNAUTHORIZED").as_deref().and_then(parse_flag),
            production,
        };

        let search_url = get("OPENSEARCH_URL");
        let tls = match &search_url {
            Some(url) => TlsPolicy::resolve(&overrides, url),
            None => TlsPolicy::Verify,
        };

        let mut search = SearchConfig::builder()
            .tls(tls)
            .top_k(parse_or(get("OPENSEARCH_TOP_K"), "OPENSEARCH_TOP_K", defaults.search.top_k))
            .timeout(secs_or(
                get("OPENSEARCH_TIMEOUT_SECS"),
                "OPENSEARCH_TIMEOUT_SECS",
                defaults.search.timeout,
            ));
        if let Some(url) = search_url {
            search = search.url(url);
        }
        if let Some(username) = get("OPENSEARCH_USERNAME") {
            search = search.credentials(username, get("OPENSEARCH_PASSWORD").unwrap_or_default());
        }
        if let Some(index) = get("OPENSEARCH_INDEX") {
            search = search.index(index);
        }
        if let Some(field) = get("OPENSEARCH_VECTOR_FIELD") {
            search = search.vector_field(field);
        }
        let search = search.build()?;

        let api_key = get("OPENAI_API_KEY");
        let base_url = get("OPENAI_BASE_URL").unwrap_or(defaults.embedding.base_url.clone());
        let openai_timeout = get("OPENAI_TIMEOUT_SECS");

        let embedding = EmbeddingConfig {
            api_key: api_key.clone(),
            base_url: base_url.clone(),
            model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding.model),
            dimensions: parse_or(
                get("EMBEDDING_DIMENSIONS"),
                "EMBEDDING_DIMENSIONS",
                defaults.embedding.dimensions,
            ),
            timeout: secs_or(
                openai_timeout.clone(),
                "OPENAI_TIMEOUT_SECS",
                defaults.embedding.timeout,
            ),
        };

        let generation = GenerationConfig {
            api_key,
            base_url,
            model: get("CHAT_MODEL").unwrap_or(defaults.generation.model),
            timeout: secs_or(openai_timeout, "OPENAI_TIMEOUT_SECS", defaults.generation.timeout),
            ..defaults.generation
        };

        let delegate = DelegateConfig {
            url: get("LANGFLOW_URL"),
            flow_id: get("LANGFLOW_FLOW_ID"),
            api_key: get("LANGFLOW_API_KEY"),
            timeout: secs_or(
                get("LANGFLOW_TIMEOUT_SECS"),
                "LANGFLOW_TIMEOUT_SECS",
                defaults.delegate.timeout,
            ),
        };

        Ok(Self {
            host: get("DOCCHAT_HOST").unwrap_or(defaults.host),
            port: parse_or(get("DOCCHAT_PORT"), "DOCCHAT_PORT", defaults.port),
            search,
            embedding,
            generation,
            delegate,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            default
        }),
    }
}

/// A timeout in whole seconds. Zero would fail every call, so it falls back
/// to the default.
fn secs_or(value: Option<String>, key: &str, default: Duration) -> Duration {
    match parse_or(value, key, default.as_secs()) {
        0 => {
            warn!(key, "timeout must be greater than zero, using the default");
            default
        }
        secs => Duration::from_secs(secs),
    }
}
