use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::runner::{read_results, JobRunner};
use crate::config::{
    ServerConfig, DEFAULT_EPISODES, MAX_EPISODES, RESULTS_PATH, RUN_PATH, STATIC_RESULTS_PATH,
};
use crate::models::RunResponseWire;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
}

/// Create the API router
pub fn create_router(config: ServerConfig) -> Router {
    let state = AppState {
        runner: Arc::new(JobRunner::new(config)),
    };

    Router::new()
        .route("/health", get(health_check))
        .route(RESULTS_PATH, get(get_results))
        .route(STATIC_RESULTS_PATH, get(get_static_results))
        .route(RUN_PATH, post(run_model))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Last exported results
async fn get_results(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    read_results(&state.runner.config().results_path)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No results yet. Run the model first.".to_string()))
}

/// The artifact as stored on disk, for clients that read it as a static file
async fn get_static_results(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = &state.runner.config().results_path;
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("td3_results.json not found".to_string()))
        }
        Err(e) => Err(ApiError::Internal(anyhow::Error::new(e).context(format!(
            "Failed to read {}",
            path.display()
        )))),
    }
}

/// Run the training job and return its log and results
async fn run_model(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<RunResponseWire>) {
    let episodes = requested_episodes(&body);
    let (status, reply) = state.runner.run(episodes).await;
    (status, Json(reply))
}

/// Episode count from the request body. Anything other than an integer in
/// `1..=MAX_EPISODES` falls back to the default.
fn requested_episodes(body: &[u8]) -> u32 {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("episodes").and_then(Value::as_u64))
        .filter(|n| (1..=MAX_EPISODES as u64).contains(n))
        .map(|n| n as u32)
        .unwrap_or(DEFAULT_EPISODES)
}

// ===== Request/Response Types =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(err) => {
                tracing::error!("Results error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = anyhow::anyhow!("Test error");
        let api_err: ApiError = err.into();

        match api_err {
            ApiError::Internal(_) => (),
            _ => panic!("Expected Internal error"),
        }
    }

    #[test]
    fn test_requested_episodes() {
        assert_eq!(requested_episodes(br#"{"episodes": 7}"#), 7);
        assert_eq!(requested_episodes(br#"{"episodes": 100}"#), 100);
        assert_eq!(requested_episodes(br#"{"episodes": 101}"#), DEFAULT_EPISODES);
        assert_eq!(requested_episodes(br#"{"episodes": 0}"#), DEFAULT_EPISODES);
        assert_eq!(requested_episodes(br#"{"episodes": 2.5}"#), DEFAULT_EPISODES);
        assert_eq!(requested_episodes(br#"{"episodes": "5"}"#), DEFAULT_EPISODES);
        assert_eq!(requested_episodes(b""), DEFAULT_EPISODES);
        assert_eq!(requested_episodes(b"not json"), DEFAULT_EPISODES);
    }
}
