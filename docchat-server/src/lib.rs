//! `docchat-server` exposes the docchat question-answering pipeline over HTTP.
//! `POST /api/chat/semantic` runs the local OpenSearch pipeline and
//! `POST /api/chat` delegates to a Langflow flow.

pub mod config;
pub mod server;

pub use config::AppConfig;
pub use server::{AppState, app_router, run_server};
