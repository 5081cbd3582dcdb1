use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docchat_rag::{Answer, ChatError, LangflowClient, Query, SemanticPipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::config::AppConfig;

/// Shared per-process state.
///
/// The semantic pipeline (which owns the OpenSearch handle) and the Langflow
/// client are built on first use from the startup configuration and reused by
/// every request after that.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    config: AppConfig,
    pipeline: OnceCell<Arc<SemanticPipeline>>,
    delegate: OnceCell<Arc<LangflowClient>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::from_parts(config, None)
    }

    /// State with a ready-made pipeline, e.g. one built over custom backends.
    pub fn with_pipeline(config: AppConfig, pipeline: Arc<SemanticPipeline>) -> Self {
        Self::from_parts(config, Some(pipeline))
    }

    fn from_parts(config: AppConfig, pipeline: Option<Arc<SemanticPipeline>>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                pipeline: OnceCell::new_with(pipeline),
                delegate: OnceCell::new(),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    async fn pipeline(&self) -> docchat_rag::Result<Arc<SemanticPipeline>> {
        let config = &self.inner.config;
        self.inner
            .pipeline
            .get_or_try_init(|| async {
                SemanticPipeline::from_config(&config.search, &config.embedding, &config.generation)
                    .map(Arc::new)
            })
            .await
            .cloned()
    }

    async fn delegate(&self) -> docchat_rag::Result<Arc<LangflowClient>> {
        let config = &self.inner.config;
        self.inner
            .delegate
            .get_or_try_init(|| async { LangflowClient::new(&config.delegate).map(Arc::new) })
            .await
            .cloned()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Parse a request body. An empty body is treated as a request without a
    /// message.
    fn from_body(body: &[u8]) -> docchat_rag::Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ChatError::InvalidRequest(format!("Invalid request body: {e}")))
    }

    fn into_query(self) -> docchat_rag::Result<Query> {
        let message = self
            .message
            .ok_or_else(|| ChatError::InvalidRequest("Message is required".to_string()))?;
        Query::new(message, self.session_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// A [`ChatError`] on its way out as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_server_error() {
            error!(%status, error = %self.0, "chat request failed");
        } else {
            warn!(%status, error = %self.0, "chat request rejected");
        }
        let body = ErrorBody {
            error: self.0.public_message(),
            hint: self.0.hint().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(hybrid_chat))
        .route("/api/chat/semantic", post(semantic_chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docchat server")?;

    let app = app_router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docchat listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docchat"}))
}

/// Run `work` on its own task so it completes even if the caller hangs up.
async fn detached<F>(work: F) -> docchat_rag::Result<Answer>
where
    F: Future<Output = docchat_rag::Result<Answer>> + Send + 'static,
{
    tokio::spawn(work).await.map_err(|e| {
        error!(error = %e, "chat task did not complete");
        ChatError::Internal(e.to_string())
    })?
}

async fn semantic_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Answer>, ApiError> {
    let query = ChatRequest::from_body(&body)?.into_query()?;
    let pipeline = state.pipeline().await?;
    let answer = detached(async move { pipeline.answer(&query).await }).await?;
    Ok(Json(answer))
}

async fn hybrid_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Answer>, ApiError> {
    let query = ChatRequest::from_body(&body)?.into_query()?;
    let delegate = state.delegate().await?;
    let answer = detached(async move { delegate.run(&query).await }).await?;
    Ok(Json(answer))
}
