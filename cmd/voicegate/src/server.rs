//! HTTP verification server.
//!
//! API endpoints:
//! - POST /api/verify?mode=... - WAV body in, DecisionResult JSON out
//! - GET /api/templates        - Enrolled template keys
//! - GET /api/health           - Liveness and template count

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use voicegate_audio::decode_wav;
use voicegate_voiceprint::{DecisionPolicy, DecisionResult, Mode, TemplateKey, VoiceprintError};

/// Largest accepted WAV upload.
const MAX_WAV_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
struct ServerState {
    policy: Arc<DecisionPolicy>,
    default_mode: Mode,
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    mode: Option<String>,
}

/// Builds the API router over a ready policy.
pub fn router(policy: Arc<DecisionPolicy>, default_mode: Mode) -> Router {
    let state = ServerState {
        policy,
        default_mode,
    };

    Router::new()
        .route("/api/verify", post(verify))
        .route("/api/templates", get(templates))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_WAV_BYTES))
        .with_state(state)
}

/// Start HTTP server for verification requests.
pub async fn start_server(addr: &str, policy: Arc<DecisionPolicy>, default_mode: Mode) -> Result<()> {
    let templates = policy.store().len();
    let app = router(policy, default_mode);

    let addr = parse_addr(addr)?;
    println!("Server started at http://{}", addr);
    println!("  - POST /api/verify     Verify a WAV recording (?mode=passphrase|passphrase_and_speaker)");
    println!("  - GET  /api/templates  Enrolled templates ({})", templates);
    println!("  - GET  /api/health     Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse address string to SocketAddr.
fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

/// A denial carrying the reason. Never a grant.
fn deny(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "accepted": false,
            "error": error.into(),
        })),
    )
        .into_response()
}

fn error_status(err: &VoiceprintError) -> StatusCode {
    match err {
        VoiceprintError::Audio(_) | VoiceprintError::Extraction(_) | VoiceprintError::Comparison(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn verify(
    State(state): State<ServerState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => return deny(e.status(), e.body_text()),
    };
    let body = match body {
        Ok(body) => body,
        Err(e) => return deny(e.status(), e.body_text()),
    };
    let mode = match query.mode.as_deref().map(str::parse::<Mode>).transpose() {
        Ok(mode) => mode.unwrap_or(state.default_mode),
        Err(e) => return deny(StatusCode::BAD_REQUEST, e.to_string()),
    };

    // Extraction and scoring run to completion even if the client leaves.
    let policy = state.policy.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<DecisionResult, VoiceprintError> {
        let signal = decode_wav(Cursor::new(body))?;
        policy.decide(&signal, mode)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, %mode, "verification failed");
            deny(error_status(&e), e.to_string())
        }
        Err(e) => deny(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("verification task failed: {e}"),
        ),
    }
}

async fn templates(State(state): State<ServerState>) -> impl IntoResponse {
    let keys: Vec<TemplateKey> = state.policy.store().iter().map(|t| t.key().clone()).collect();
    Json(keys)
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "templates": state.policy.store().len(),
    }))
}
