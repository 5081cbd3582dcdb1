use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use docchat_server::{AppConfig, AppState, app_router};
use serde_json::{Value, json};

async fn spawn(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

/// An address nothing listens on.
async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

async fn spawn_app(vars: &[(&str, &str)]) -> (String, tokio::task::JoinHandle<()>) {
    let vars: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("valid config");
    spawn(app_router(AppState::new(config))).await
}

// ── Mock OpenSearch ────────────────────────────────────────────────

#[derive(Clone, Default)]
struct SearchLog {
    bodies: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Vec<Option<String>>>>,
}

fn opensearch_mock(status: StatusCode, response: Value, log: SearchLog) -> Router {
    Router::new()
        .route(
            "/{index}/_search",
            post(move |State(log): State<SearchLog>, headers: HeaderMap, Json(body): Json<Value>| {
                let response = response.clone();
                async move {
                    log.bodies.lock().unwrap().push(body);
                    log.authorization.lock().unwrap().push(
                        headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                    );
                    (status, Json(response))
                }
            }),
        )
        .with_state(log)
}

/// OpenSearch that answers only after `delay`.
fn slow_opensearch_mock(delay: Duration, response: Value) -> Router {
    Router::new().route(
        "/{index}/_search",
        post(move || {
            let response = response.clone();
            async move {
                tokio::time::sleep(delay).await;
                Json(response)
            }
        }),
    )
}

fn hits(docs: &[(&str, f32, &str)]) -> Value {
    let hits: Vec<Value> = docs
        .iter()
        .map(|(text, score, path)| json!({"_score": score, "_source": {"text": text, "file_path": path}}))
        .collect();
    json!({"took": 3, "hits": {"total": {"value": hits.len()}, "hits": hits}})
}

// ── Mock OpenAI ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct ModelCalls {
    embeddings: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

fn openai_mock(calls: ModelCalls) -> Router {
    Router::new()
        .route(
            "/v1/embeddings",
            post(|State(calls): State<ModelCalls>, Json(body): Json<Value>| async move {
                calls.embeddings.fetch_add(1, Ordering::SeqCst);
                assert_eq!(body["input"].as_array().map(Vec::len), Some(1));
                Json(json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}))
            }),
        )
        .route(
            "/v1/chat/completions",
            post(|State(calls): State<ModelCalls>, Json(body): Json<Value>| async move {
                calls.completions.fetch_add(1, Ordering::SeqCst);
                assert_eq!(body["messages"][0]["role"], "system");
                Json(json!({"choices": [{"message": {"role": "assistant", "content": "generated answer"}}]}))
            }),
        )
        .with_state(calls)
}

/// OpenAI with fixed replies for both endpoints.
fn openai_scripted(embeddings: (StatusCode, Value), completions: (StatusCode, Value)) -> Router {
    Router::new()
        .route(
            "/v1/embeddings",
            post(move || {
                let (status, body) = embeddings.clone();
                async move { (status, Json(body)) }
            }),
        )
        .route(
            "/v1/chat/completions",
            post(move || {
                let (status, body) = completions.clone();
                async move { (status, Json(body)) }
            }),
        )
}

fn embedding_reply() -> (StatusCode, Value) {
    (StatusCode::OK, json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}))
}

// ── Mock Langflow ──────────────────────────────────────────────────

fn langflow_fixed(status: StatusCode, content_type: &'static str, body: &'static str) -> Router {
    Router::new().route(
        "/api/v1/run/{flow_id}",
        post(move || async move { (status, [(header::CONTENT_TYPE, content_type)], body) }),
    )
}

#[derive(Clone, Default)]
struct LangflowLog {
    requests: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>, Value)>>>,
}

fn langflow_recording(log: LangflowLog) -> Router {
    Router::new()
        .route(
            "/api/v1/run/{flow_id}",
            post(
                |State(log): State<LangflowLog>,
                 Query(params): Query<HashMap<String, String>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string);
                    log.requests.lock().unwrap().push((key, params, body));
                    Json(json!({"outputs": [{"outputs": [{"results": {"message": {"text": "from the flow"}}}]}]}))
                },
            ),
        )
        .with_state(log)
}

async fn post_json(url: String, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new().post(url).json(&body).send().await.expect("response");
    let status = StatusCode::from_u16(response.status().as_u16()).expect("status");
    let body: Value = response.json().await.expect("json body");
    (status, body)
}

// ── Semantic mode ──────────────────────────────────────────────────

#[tokio::test]
async fn semantic_zero_hits_short_circuits_generation() {
    let calls = ModelCalls::default();
    let (openai, openai_handle) = spawn(openai_mock(calls.clone())).await;
    let (search, search_handle) =
        spawn(opensearch_mock(StatusCode::OK, hits(&[]), SearchLog::default())).await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) = post_json(
        format!("{base}/api/chat/semantic"),
        json!({"message": "asdkjalksjd nonsense query"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["docs_retrieved"], 0);
    assert_eq!(body["search_type"], "semantic");
    assert!(body["answer"].as_str().unwrap().contains("No relevant documents found"));
    assert_eq!(body["retrieved_docs"], json!([]));
    assert_eq!(calls.embeddings.load(Ordering::SeqCst), 1);
    assert_eq!(calls.completions.load(Ordering::SeqCst), 0);

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_answer_with_hits() {
    let calls = ModelCalls::default();
    let log = SearchLog::default();
    let (openai, openai_handle) = spawn(openai_mock(calls.clone())).await;
    let (search, search_handle) = spawn(opensearch_mock(
        StatusCode::OK,
        hits(&[("Solar panels make power.", 12.5, "energy/solar.pdf"), ("Wind too.", 7.25, "energy/wind.pdf")]),
        log.clone(),
    ))
    .await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENSEARCH_USERNAME", "admin"),
        ("OPENSEARCH_PASSWORD", "admin"),
        ("OPENSEARCH_INDEX", "handbook"),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) = post_json(
        format!("{base}/api/chat/semantic"),
        json!({"message": "How is power made?", "session_id": "session-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "generated answer");
    assert_eq!(body["session_id"], "session-7");
    assert_eq!(body["docs_retrieved"], 2);
    assert_eq!(body["retrieved_docs"][0]["rank"], 1);
    assert_eq!(body["retrieved_docs"][0]["score"], 12.5);
    assert_eq!(body["retrieved_docs"][0]["file_path"], "energy/solar.pdf");
    assert_eq!(body["retrieved_docs"][1]["rank"], 2);
    assert_eq!(body["search_info"]["index"], "handbook");
    assert_eq!(body["search_info"]["k"], 2);
    assert_eq!(calls.completions.load(Ordering::SeqCst), 1);

    let request = log.bodies.lock().unwrap()[0].clone();
    assert_eq!(request["size"], 2);
    assert_eq!(request["query"]["knn"]["embeddings"]["k"], 2);
    assert_eq!(request["_source"], json!(["text", "file_path"]));
    let auth = log.authorization.lock().unwrap()[0].clone();
    assert_eq!(auth.as_deref(), Some("Basic YWRtaW46YWRtaW4="));

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_index_unreachable_is_502_without_credentials() {
    let (openai, openai_handle) = spawn(openai_mock(ModelCalls::default())).await;
    let closed = closed_endpoint().await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", closed.as_str()),
        ("OPENSEARCH_USERNAME", "admin"),
        ("OPENSEARCH_PASSWORD", "s3cret"),
        ("OPENSEARCH_TIMEOUT_SECS", "5"),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("OpenSearch is unreachable"), "unexpected error: {error}");
    assert!(error.contains(closed.trim_start_matches("http://")));
    assert!(!body.to_string().contains("s3cret"));
    assert!(body["hint"].as_str().unwrap().contains("OPENSEARCH_URL"));

    handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_index_error_status_is_502() {
    let (openai, openai_handle) = spawn(openai_mock(ModelCalls::default())).await;
    let (search, search_handle) = spawn(opensearch_mock(
        StatusCode::NOT_FOUND,
        json!({"error": {"reason": "no such index [documents]"}, "status": 404}),
        SearchLog::default(),
    ))
    .await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("404"));
    assert!(error.contains("no such index"));

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_dimension_mismatch_is_a_configuration_error() {
    let (openai, openai_handle) = spawn(openai_mock(ModelCalls::default())).await;
    let (search, search_handle) =
        spawn(opensearch_mock(StatusCode::OK, hits(&[]), SearchLog::default())).await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("dimension mismatch"));

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_without_api_key_is_500() {
    let (base, handle) = spawn_app(&[("OPENSEARCH_URL", "http://localhost:9200")]).await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));

    handle.abort();
}

#[tokio::test]
async fn semantic_without_index_url_is_500() {
    let (base, handle) = spawn_app(&[("OPENAI_API_KEY", "test-key")]).await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("OPENSEARCH_URL"));

    handle.abort();
}

#[tokio::test]
async fn semantic_embedding_error_status_is_502_with_provider_message() {
    let (openai, openai_handle) = spawn(openai_scripted(
        (StatusCode::UNAUTHORIZED, json!({"error": {"message": "bad key", "type": "invalid_request_error"}})),
        embedding_reply(),
    ))
    .await;
    let (search, search_handle) =
        spawn(opensearch_mock(StatusCode::OK, hits(&[]), SearchLog::default())).await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "sk-do-not-echo"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("bad key"), "unexpected error: {error}");
    assert!(error.contains("401"));
    assert!(!body.to_string().contains("sk-do-not-echo"));

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_embedding_without_vector_is_502() {
    let (openai, openai_handle) =
        spawn(openai_scripted((StatusCode::OK, json!({"data": []})), embedding_reply())).await;
    let (search, search_handle) =
        spawn(opensearch_mock(StatusCode::OK, hits(&[]), SearchLog::default())).await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "anything"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("data[0].embedding"));

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn semantic_completion_failure_degrades_to_fallback() {
    let (openai, openai_handle) = spawn(openai_scripted(
        embedding_reply(),
        (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": {"message": "overloaded"}})),
    ))
    .await;
    let (search, search_handle) = spawn(opensearch_mock(
        StatusCode::OK,
        hits(&[("Solar panels make power.", 3.0, "energy/solar.pdf")]),
        SearchLog::default(),
    ))
    .await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let (status, body) =
        post_json(format!("{base}/api/chat/semantic"), json!({"message": "power?"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "No response generated.");
    assert_eq!(body["docs_retrieved"], 1);

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

#[tokio::test]
async fn abandoned_semantic_request_runs_to_completion() {
    let calls = ModelCalls::default();
    let (openai, openai_handle) = spawn(openai_mock(calls.clone())).await;
    let (search, search_handle) = spawn(slow_opensearch_mock(
        Duration::from_millis(800),
        hits(&[("Solar panels make power.", 3.0, "energy/solar.pdf")]),
    ))
    .await;
    let openai_base = format!("{openai}/v1");
    let (base, handle) = spawn_app(&[
        ("OPENSEARCH_URL", search.as_str()),
        ("OPENAI_API_KEY", "test-key"),
        ("OPENAI_BASE_URL", openai_base.as_str()),
        ("EMBEDDING_DIMENSIONS", "3"),
    ])
    .await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("client");
    let result = impatient
        .post(format!("{base}/api/chat/semantic"))
        .json(&json!({"message": "power?"}))
        .send()
        .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.completions.load(Ordering::SeqCst), 1);

    handle.abort();
    search_handle.abort();
    openai_handle.abort();
}

// ── Request validation ─────────────────────────────────────────────

#[tokio::test]
async fn missing_message_is_400_in_both_modes() {
    let (base, handle) = spawn_app(&[]).await;

    for path in ["/api/chat", "/api/chat/semantic"] {
        let (status, body) = post_json(format!("{base}{path}"), json!({"session_id": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "path {path}");
        assert_eq!(body["error"], "Message is required", "path {path}");
    }

    handle.abort();
}

#[tokio::test]
async fn empty_body_is_a_missing_message() {
    let (base, handle) = spawn_app(&[]).await;

    for path in ["/api/chat", "/api/chat/semantic"] {
        let response =
            reqwest::Client::new().post(format!("{base}{path}")).send().await.expect("response");
        assert_eq!(response.status().as_u16(), 400, "path {path}");
        let body: Value = response.json().await.expect("json error body");
        assert_eq!(body["error"], "Message is required", "path {path}");
    }

    handle.abort();
}

#[tokio::test]
async fn malformed_body_is_400_json() {
    let (base, handle) = spawn_app(&[]).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .expect("response");

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json error body");
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    handle.abort();
}

// ── Hybrid mode ────────────────────────────────────────────────────

#[tokio::test]
async fn hybrid_html_response_points_at_api_key() {
    let (langflow, langflow_handle) = spawn(langflow_fixed(
        StatusCode::OK,
        "text/html",
        "<!DOCTYPE html><html><body>Login</body></html>",
    ))
    .await;
    let (base, handle) =
        spawn_app(&[("LANGFLOW_URL", langflow.as_str()), ("LANGFLOW_FLOW_ID", "flow-1")]).await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("authentication") && error.contains("LANGFLOW_API_KEY"));

    handle.abort();
    langflow_handle.abort();
}

#[tokio::test]
async fn hybrid_nested_outputs_are_normalized() {
    let (langflow, langflow_handle) = spawn(langflow_fixed(
        StatusCode::OK,
        "application/json",
        r#"{"outputs":[{"outputs":[{"results":{"text":"42"}}]}]}"#,
    ))
    .await;
    let (base, handle) =
        spawn_app(&[("LANGFLOW_URL", langflow.as_str()), ("LANGFLOW_FLOW_ID", "flow-1")]).await;

    let (status, body) = post_json(
        format!("{base}/api/chat"),
        json!({"message": "meaning of life?", "session_id": "s-42"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "42");
    assert_eq!(body["session_id"], "s-42");
    assert_eq!(body["search_type"], "hybrid");
    assert_eq!(body["search_info"]["flow_id"], "flow-1");

    handle.abort();
    langflow_handle.abort();
}

#[tokio::test]
async fn hybrid_upstream_error_status_passes_through() {
    let (langflow, langflow_handle) = spawn(langflow_fixed(
        StatusCode::UNAUTHORIZED,
        "application/json",
        r#"{"detail":"invalid key"}"#,
    ))
    .await;
    let (base, handle) = spawn_app(&[
        ("LANGFLOW_URL", langflow.as_str()),
        ("LANGFLOW_FLOW_ID", "flow-1"),
        ("LANGFLOW_API_KEY", "wrong"),
    ])
    .await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hi"})).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Langflow error: invalid key");

    handle.abort();
    langflow_handle.abort();
}

#[tokio::test]
async fn hybrid_non_json_response_is_invalid() {
    let (langflow, langflow_handle) =
        spawn(langflow_fixed(StatusCode::OK, "text/plain", "upstream says hello")).await;
    let (base, handle) =
        spawn_app(&[("LANGFLOW_URL", langflow.as_str()), ("LANGFLOW_FLOW_ID", "flow-1")]).await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid response from Langflow"));

    handle.abort();
    langflow_handle.abort();
}

#[tokio::test]
async fn hybrid_forwards_session_and_api_key() {
    let log = LangflowLog::default();
    let (langflow, langflow_handle) = spawn(langflow_recording(log.clone())).await;
    let (base, handle) = spawn_app(&[
        ("LANGFLOW_URL", langflow.as_str()),
        ("LANGFLOW_FLOW_ID", "flow-1"),
        ("LANGFLOW_API_KEY", "lf-secret"),
    ])
    .await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "from the flow");
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(!session_id.is_empty());

    let (key, params, payload) = log.requests.lock().unwrap()[0].clone();
    assert_eq!(key.as_deref(), Some("lf-secret"));
    assert_eq!(params.get("stream").map(String::as_str), Some("false"));
    assert_eq!(payload["input_value"], "hello");
    assert_eq!(payload["input_type"], "chat");
    assert_eq!(payload["output_type"], "chat");
    assert_eq!(payload["session_id"], session_id.as_str());

    handle.abort();
    langflow_handle.abort();
}

#[tokio::test]
async fn hybrid_unreachable_is_502() {
    let closed = closed_endpoint().await;
    let (base, handle) = spawn_app(&[
        ("LANGFLOW_URL", closed.as_str()),
        ("LANGFLOW_FLOW_ID", "flow-1"),
        ("LANGFLOW_TIMEOUT_SECS", "5"),
    ])
    .await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("Langflow is unreachable"));

    handle.abort();
}

#[tokio::test]
async fn hybrid_without_configuration_is_500() {
    let (base, handle) = spawn_app(&[]).await;

    let (status, body) = post_json(format!("{base}/api/chat"), json!({"message": "hi"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("LANGFLOW_URL"));

    handle.abort();
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, handle) = spawn_app(&[]).await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "docchat");

    handle.abort();
}
