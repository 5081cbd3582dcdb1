//! Error types for the `docchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering a chat request.
///
/// Every variant maps onto one HTTP status through [`ChatError::status_code`], so
/// the server layer never has to inspect messages to decide how to respond.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A required endpoint or credential is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The inbound request was rejected before any pipeline step ran.
    #[error("{0}")]
    InvalidRequest(String),

    /// A network-level failure reaching an upstream service.
    #[error("{service} is unreachable at {endpoint}: {message}")]
    Unreachable {
        /// The upstream service (e.g. `OpenSearch`, `OpenAI`).
        service: String,
        /// The configured endpoint, with credentials stripped.
        endpoint: String,
        /// A description of the failure.
        message: String,
    },

    /// A non-success status from the index or a model provider.
    #[error("{service} request failed with status {status}: {message}")]
    UpstreamStatus {
        /// The upstream service.
        service: String,
        /// The raw HTTP status returned upstream.
        status: u16,
        /// The message extracted from the error body, if any.
        message: String,
    },

    /// The delegate orchestrator reported an error in a parseable body.
    ///
    /// The upstream status is passed through to the caller.
    #[error("{service} error: {message}")]
    UpstreamRejected {
        /// The upstream service.
        service: String,
        /// The HTTP status to pass through.
        status: u16,
        /// The message extracted from the error body.
        message: String,
    },

    /// A success response whose body could not be understood.
    #[error("{message}")]
    ResponseShape {
        /// The upstream service.
        service: String,
        /// A description of the unexpected shape.
        message: String,
        /// Operator guidance naming the likely misconfiguration.
        hint: Option<String>,
    },

    /// An unexpected local failure. Details are logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// The HTTP status this error should be reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Config(_) | Self::Internal(_) => 500,
            Self::Unreachable { .. } | Self::UpstreamStatus { .. } | Self::ResponseShape { .. } => {
                502
            }
            Self::UpstreamRejected { status, .. } => *status,
        }
    }

    /// Guidance for the operator, when the failure points at a likely cause.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::ResponseShape { hint, .. } => hint.as_deref(),
            Self::Unreachable { service, .. } if service == "OpenSearch" => {
                Some("Check that OPENSEARCH_URL is correct and the cluster is running.")
            }
            Self::Unreachable { service, .. } if service == "Langflow" => {
                Some("Check that LANGFLOW_URL is correct and Langflow is running.")
            }
            _ => None,
        }
    }

    /// The message safe to return to a caller.
    ///
    /// Internal failures are replaced by a generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// A convenience result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Convert a transport failure into [`ChatError::Unreachable`].
///
/// The request URL is dropped from the underlying error and the endpoint is
/// redacted, so neither can leak credentials.
pub(crate) fn unreachable(service: &str, endpoint: &str, err: reqwest::Error) -> ChatError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.without_url().to_string()
    };
    ChatError::Unreachable {
        service: service.to_string(),
        endpoint: redact_endpoint(endpoint),
        message,
    }
}

/// Strip userinfo from an endpoint so it can appear in messages and logs.
pub(crate) fn redact_endpoint(endpoint: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(mut url) => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => endpoint.to_string(),
    }
}
