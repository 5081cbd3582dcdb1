//! Delegate (hybrid) path through a Langflow flow.
//!
//! The question is forwarded to the flow's run endpoint and the flow's reply is
//! normalized into an [`Answer`]. Langflow's output schema varies between flow
//! designs, so the answer text is located by an ordered list of
//! [`ExtractionRule`]s rather than a fixed response type.

use reqwest::header::HeaderValue;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::DelegateConfig;
use crate::document::{Answer, HybridSearchInfo, Query, SearchInfo, SearchMode};
use crate::error::{ChatError, Result, redact_endpoint, unreachable};

const SERVICE: &str = "Langflow";

/// Answer used when no extraction rule finds any text.
pub const NO_RESPONSE_RECEIVED: &str = "No response received from the RAG system.";

/// One way of locating answer text in a Langflow response.
#[derive(Clone, Copy)]
pub struct ExtractionRule {
    /// Short name, reported in the answer's diagnostics.
    pub name: &'static str,
    extract: fn(&Value) -> Option<String>,
}

impl ExtractionRule {
    /// Apply the rule, returning non-empty text if the shape matches.
    pub fn apply(&self, body: &Value) -> Option<String> {
        (self.extract)(body).filter(|text| !text.trim().is_empty())
    }
}

impl std::fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRule").field("name", &self.name).finish()
    }
}

/// Known response shapes, in priority order.
pub const EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "outputs", extract: from_nested_outputs },
    ExtractionRule { name: "result", extract: from_result },
    ExtractionRule { name: "text", extract: from_text },
];

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty()).map(str::to_string)
}

/// `outputs[].outputs[]` with text at `results.message.text`, `results.text`,
/// or `message.text`.
fn from_nested_outputs(body: &Value) -> Option<String> {
    body.get("outputs")?.as_array()?.iter().find_map(|outer| {
        outer.get("outputs")?.as_array()?.iter().find_map(|inner| {
            non_empty_str(inner.pointer("/results/message/text"))
                .or_else(|| non_empty_str(inner.pointer("/results/text")))
                .or_else(|| non_empty_str(inner.pointer("/message/text")))
        })
    })
}

/// Top-level `result`: a string, an object with `text`, or anything else serialized.
fn from_result(body: &Value) -> Option<String> {
    match body.get("result")? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => non_empty_str(other.get("text")).or_else(|| serde_json::to_string(other).ok()),
    }
}

/// Top-level `text`.
fn from_text(body: &Value) -> Option<String> {
    non_empty_str(body.get("text"))
}

/// Find the answer text, returning the name of the rule that matched.
pub fn extract_answer(body: &Value) -> Option<(&'static str, String)> {
    EXTRACTION_RULES.iter().find_map(|rule| rule.apply(body).map(|text| (rule.name, text)))
}

/// Returns `true` if `body` is an HTML document rather than an API payload.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(15).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Pull a human-readable message out of a Langflow error body.
///
/// Tries `detail`, then `message`, then `error` (a string or an object with
/// `message`).
pub fn error_message(body: &Value) -> Option<String> {
    let describe = |value: &Value| match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => non_empty_str(other.get("message")).or_else(|| Some(other.to_string())),
    };
    body.get("detail")
        .and_then(describe)
        .or_else(|| non_empty_str(body.get("message")))
        .or_else(|| body.get("error").and_then(describe))
}

#[derive(Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    input_type: &'a str,
    output_type: &'a str,
    session_id: &'a str,
}

/// Client for a single Langflow flow.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{DelegateConfig, LangflowClient, Query};
///
/// let client = LangflowClient::new(&config)?;
/// let answer = client.run(&Query::new("What is in the handbook?", None)?).await?;
/// ```
#[derive(Debug)]
pub struct LangflowClient {
    client: reqwest::Client,
    run_url: String,
    endpoint: String,
    flow_id: String,
    api_key: Option<HeaderValue>,
}

impl LangflowClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the URL or flow id is missing.
    pub fn new(config: &DelegateConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ChatError::Config("LANGFLOW_URL is not configured".to_string()))?;
        let flow_id = config
            .flow_id
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ChatError::Config("LANGFLOW_FLOW_ID is not configured".to_string()))?;
        reqwest::Url::parse(url).map_err(|e| {
            ChatError::Config(format!("invalid Langflow URL '{}': {e}", redact_endpoint(url)))
        })?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|key| {
                let mut value = HeaderValue::from_str(key).map_err(|_| {
                    ChatError::Config("LANGFLOW_API_KEY is not valid header text".to_string())
                })?;
                value.set_sensitive(true);
                Ok::<_, ChatError>(value)
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build {SERVICE} HTTP client: {e}")))?;

        let base = url.trim_end_matches('/');
        Ok(Self {
            client,
            run_url: format!("{base}/api/v1/run/{flow_id}"),
            endpoint: redact_endpoint(base),
            flow_id: flow_id.to_string(),
            api_key,
        })
    }

    /// The flow this client runs.
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    /// Forward `query` to the flow and normalize the reply.
    ///
    /// # Errors
    ///
    /// - [`ChatError::Unreachable`] if Langflow cannot be reached.
    /// - [`ChatError::ResponseShape`] for HTML or non-JSON bodies.
    /// - [`ChatError::UpstreamRejected`] for error statuses, carrying the
    ///   upstream status.
    pub async fn run(&self, query: &Query) -> Result<Answer> {
        debug!(flow_id = %self.flow_id, session_id = query.session_id(), "running langflow flow");

        let payload = RunRequest {
            input_value: query.text(),
            input_type: "chat",
            output_type: "chat",
            session_id: query.session_id(),
        };
        let mut request =
            self.client.post(&self.run_url).query(&[("stream", "false")]).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.clone());
        }

        let response = request.send().await.map_err(|e| {
            let err = unreachable(SERVICE, &self.endpoint, e);
            error!(error = %err, "langflow unreachable");
            err
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| unreachable(SERVICE, &self.endpoint, e))?;

        self.interpret(status, &body, query)
    }

    /// Turn a raw Langflow reply into an [`Answer`] or a classified error.
    pub fn interpret(&self, status: u16, body: &str, query: &Query) -> Result<Answer> {
        if looks_like_html(body) {
            error!(status, flow_id = %self.flow_id, "langflow returned html");
            return Err(self.html_error());
        }

        let parsed: Option<Value> = serde_json::from_str(body).ok();

        if !(200..300).contains(&status) {
            let message = parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            error!(status, flow_id = %self.flow_id, "langflow reported an error");
            return Err(ChatError::UpstreamRejected {
                service: SERVICE.to_string(),
                status,
                message,
            });
        }

        let value = parsed.ok_or_else(|| ChatError::ResponseShape {
            service: SERVICE.to_string(),
            message: format!("Invalid response from {SERVICE}: expected a JSON body"),
            hint: Some("Check that LANGFLOW_URL points at the Langflow API.".to_string()),
        })?;

        let (extracted_from, answer) = match extract_answer(&value) {
            Some((rule, text)) => (Some(rule.to_string()), text),
            None => (None, NO_RESPONSE_RECEIVED.to_string()),
        };

        info!(
            flow_id = %self.flow_id,
            session_id = query.session_id(),
            rule = extracted_from.as_deref().unwrap_or("none"),
            "hybrid query completed"
        );

        Ok(Answer {
            answer,
            session_id: query.session_id().to_string(),
            search_type: SearchMode::Hybrid,
            docs_retrieved: None,
            retrieved_docs: None,
            search_info: SearchInfo::Hybrid(HybridSearchInfo {
                query: query.text().to_string(),
                flow_id: self.flow_id.clone(),
                extracted_from,
            }),
        })
    }

    fn html_error(&self) -> ChatError {
        let (message, hint) = if self.api_key.is_none() {
            (
                format!(
                    "{SERVICE} returned an HTML page instead of JSON; authentication is likely \
                     required (LANGFLOW_API_KEY is not set)"
                ),
                "Set LANGFLOW_API_KEY to a valid Langflow API key.",
            )
        } else {
            (
                format!(
                    "{SERVICE} returned an HTML page instead of JSON; the URL or flow id is \
                     likely wrong, or the API key was rejected"
                ),
                "Check that LANGFLOW_URL points at the Langflow API and LANGFLOW_FLOW_ID names an existing flow.",
            )
        };
        ChatError::ResponseShape { service: SERVICE.to_string(), message, hint: Some(hint.into()) }
    }
}
