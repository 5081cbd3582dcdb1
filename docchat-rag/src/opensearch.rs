//! OpenSearch k-NN backend.
//!
//! Provides [`OpenSearchStore`], a [`VectorStore`] that talks to the
//! OpenSearch REST API over `reqwest`. Only the `text` and `file_path` fields
//! are requested back, never the stored vectors.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{OpenSearchStore, SearchConfig};
//!
//! let config = SearchConfig::builder().url("https://localhost:9200").build()?;
//! let store = OpenSearchStore::new(&config)?;
//! let hits = store.search(&query_embedding, 2).await?;
//! ```

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::config::SearchConfig;
use crate::document::RetrievedDocument;
use crate::error::{ChatError, Result, unreachable};
use crate::vectorstore::VectorStore;

const SERVICE: &str = "OpenSearch";

/// Fields returned for each hit.
const SOURCE_FIELDS: [&str; 2] = ["text", "file_path"];

/// Provenance used when a hit carries no `file_path`.
const UNKNOWN_SOURCE: &str = "unknown";

/// A [`VectorStore`] backed by an OpenSearch index with a `knn_vector` field.
#[derive(Debug)]
pub struct OpenSearchStore {
    client: reqwest::Client,
    endpoint: String,
    search_url: String,
    authorization: Option<HeaderValue>,
    index: String,
    vector_field: String,
}

impl OpenSearchStore {
    /// Create a store from configuration.
    ///
    /// Credentials embedded in the URL are moved into the `Authorization`
    /// header when no explicit pair is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no URL is configured or the URL is
    /// invalid. No network call is made.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let raw = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ChatError::Config("OPENSEARCH_URL is not configured".to_string()))?;

        let mut url = reqwest::Url::parse(raw).map_err(|e| {
            ChatError::Config(format!(
                "invalid OpenSearch URL '{}': {e}",
                crate::error::redact_endpoint(raw)
            ))
        })?;

        let embedded = (!url.username().is_empty()).then(|| {
            (url.username().to_string(), url.password().unwrap_or_default().to_string())
        });
        let _ = url.set_username("");
        let _ = url.set_password(None);

        let credentials = match (&config.username, &config.password) {
            (Some(user), password) if !user.is_empty() => {
                Some((user.clone(), password.clone().unwrap_or_default()))
            }
            _ => embedded,
        };
        let authorization = credentials
            .map(|(user, password)| basic_auth_header(&user, &password))
            .transpose()?;

        if config.tls.skips_verification() {
            warn!(endpoint = %url, "TLS certificate verification is disabled for OpenSearch");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.tls.skips_verification())
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build {SERVICE} HTTP client: {e}")))?;

        let endpoint = url.as_str().trim_end_matches('/').to_string();
        let search_url = format!("{endpoint}/{}/_search", config.index);

        Ok(Self {
            client,
            endpoint,
            search_url,
            authorization,
            index: config.index.clone(),
            vector_field: config.vector_field.clone(),
        })
    }

    /// The configured endpoint, without credentials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns `true` when requests carry basic credentials.
    pub fn has_credentials(&self) -> bool {
        self.authorization.is_some()
    }
}

fn basic_auth_header(username: &str, password: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .map_err(|_| ChatError::Config("OpenSearch credentials are not valid header text".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Build the k-NN query body: exactly `k` neighbors, only the display fields.
pub fn knn_query(vector_field: &str, embedding: &[f32], k: usize) -> Value {
    let mut field = Map::new();
    field.insert(vector_field.to_string(), json!({ "vector": embedding, "k": k }));
    json!({
        "size": k,
        "_source": SOURCE_FIELDS,
        "query": { "knn": Value::Object(field) },
    })
}

// ── OpenSearch response types ──────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponse {
    hits: Option<Hits>,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: HitSource,
}

#[derive(Deserialize, Default)]
struct HitSource {
    #[serde(default)]
    text: String,
    file_path: Option<String>,
}

/// Pull a readable reason out of an OpenSearch error body.
fn error_reason(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let reason = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("reason")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    reason.unwrap_or_else(|| crate::document::truncate_for_display(body.trim(), 200))
}

/// Convert parsed hits into ranked documents, at most `top_k` of them.
fn into_documents(hits: Vec<Hit>, top_k: usize) -> Vec<RetrievedDocument> {
    let mut documents: Vec<RetrievedDocument> = hits
        .into_iter()
        .map(|hit| RetrievedDocument {
            text: hit.source.text,
            score: hit.score.unwrap_or_default(),
            file_path: hit.source.file_path.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        })
        .collect();
    documents.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    documents.truncate(top_k);
    documents
}

#[async_trait]
impl VectorStore for OpenSearchStore {
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>> {
        debug!(index = %self.index, field = %self.vector_field, k = top_k, "opensearch knn search");

        let mut request = self.client.post(&self.search_url).json(&knn_query(
            &self.vector_field,
            embedding,
            top_k,
        ));
        if let Some(auth) = &self.authorization {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request.send().await.map_err(|e| {
            let err = unreachable(SERVICE, &self.endpoint, e);
            error!(error = %err, "opensearch unreachable");
            err
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| unreachable(SERVICE, &self.endpoint, e))?;

        if !status.is_success() {
            error!(index = %self.index, %status, "opensearch search failed");
            return Err(ChatError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                message: error_reason(&body),
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::ResponseShape {
                service: SERVICE.to_string(),
                message: format!("{SERVICE} returned an unparseable search response: {e}"),
                hint: None,
            })?;
        let hits = parsed.hits.ok_or_else(|| ChatError::ResponseShape {
            service: SERVICE.to_string(),
            message: format!("{SERVICE} search response has no hits field"),
            hint: Some(format!("Check that index '{}' exists.", self.index)),
        })?;

        let documents = into_documents(hits.hits, top_k);
        debug!(index = %self.index, hits = documents.len(), "opensearch search completed");
        Ok(documents)
    }

    fn index_name(&self) -> &str {
        &self.index
    }

    fn vector_field(&self) -> &str {
        &self.vector_field
    }
}
