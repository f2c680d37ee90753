//! Caption rewrite HTTP service.
//!
//! Exposes the forced-rewrite protocol to other tools (browser extensions,
//! download hooks) over a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, and which credentials are present |
//! | `POST` | `/rewrite` | Rewrite one caption (token required) |
//!
//! # Authentication
//!
//! `/rewrite` requires the token held in the environment variable named by
//! `server.api_token_env`, sent either as `Authorization: Bearer <token>` or
//! as `X-API-Token: <token>`. Without a configured token every rewrite
//! request is rejected.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "caption is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `internal` (500).
//! Rewrite failures are not HTTP errors: the original caption comes back
//! with `changed: false` and the failure text in `reason`.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use photodesk_core::caption::{rewrite_with_retry, CaptionConfig, CaptionDecisionEngine, LlmClient};
use photodesk_core::tokenize::normalize_ws;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    caption: Arc<CaptionConfig>,
    client: Arc<dyn LlmClient>,
    api_token: Option<String>,
}

impl AppState {
    pub fn new(caption: &CaptionConfig, client: Arc<dyn LlmClient>, api_token: Option<String>) -> Self {
        Self {
            caption: Arc::new(caption.clone()),
            client,
            api_token: api_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rewrite", post(handle_rewrite))
        .layer(cors)
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn run_server(config: &Config, client: Arc<dyn LlmClient>) -> anyhow::Result<()> {
    let api_token = std::env::var(&config.server.api_token_env).ok();
    let state = AppState::new(&config.caption, client, api_token);
    if state.api_token.is_none() {
        warn!(
            "{} is not set; every /rewrite request will be rejected",
            config.server.api_token_env
        );
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Rewrite API listening on http://{}", config.server.bind);
    println!("Rewrite API listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "Unauthorized".to_string(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    has_llm_credential: bool,
    has_api_token: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        has_llm_credential: state.client.has_credential(),
        has_api_token: state.api_token.is_some(),
    })
}

// ============ POST /rewrite ============

#[derive(Debug, Default, Deserialize)]
struct RewriteRequest {
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RewriteResponse {
    pub caption: String,
    pub changed: bool,
    pub reason: String,
}

/// Token presented by the caller, bearer header first.
fn presented_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if auth.len() > 7 && auth[..7].eq_ignore_ascii_case("bearer ") {
            return Some(auth[7..].trim().to_string());
        }
    }
    headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    match (expected, presented_token(headers)) {
        (Some(expected), Some(given)) => given == expected,
        _ => false,
    }
}

fn build_rewrite_prompt(caption: &str, metadata: &Value, max_words: usize) -> String {
    format!(
        "Rewrite this photo caption using the provided rules.\n\
         Original caption: {}\n\
         Source metadata: {}\n\
         Hard limits: max {} words, output only the caption.",
        caption, metadata, max_words
    )
}

async fn handle_rewrite(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RewriteResponse>, AppError> {
    if !authorized(&headers, state.api_token.as_deref()) {
        return Err(unauthorized());
    }

    // Unparseable bodies are treated like empty ones.
    let request: RewriteRequest = serde_json::from_slice(&body).unwrap_or_default();
    let original = request.caption.unwrap_or_default().trim().to_string();
    if original.is_empty() {
        return Err(bad_request("caption is required"));
    }
    let metadata = request
        .metadata
        .filter(|m| !m.is_null())
        .unwrap_or_else(|| Value::Object(Default::default()));

    let readiness = CaptionDecisionEngine::new(&state.caption, Some(state.client.as_ref()))
        .llm_available()
        .map(|_| ());
    if let Err(reason) = readiness {
        return Ok(Json(RewriteResponse {
            caption: normalize_ws(&original),
            changed: false,
            reason: reason.to_string(),
        }));
    }

    let prompt = build_rewrite_prompt(&original, &metadata, state.caption.max_words);
    let client = state.client.clone();
    let caption_cfg = state.caption.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        rewrite_with_retry(
            client.as_ref(),
            &caption_cfg.model,
            &caption_cfg.instructions,
            &prompt,
            &original,
        )
    })
    .await
    .map_err(|e| internal(format!("rewrite task failed: {}", e)))?;

    debug!("rewrite finished (reason: {:?})", outcome.reason);
    Ok(Json(RewriteResponse {
        caption: outcome.caption,
        changed: outcome.rewritten,
        reason: outcome.reason,
    }))
}
