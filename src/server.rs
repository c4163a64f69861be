//! HTTP surface for the processing pipeline.
//!
//! Exposes the drain trigger and the monitoring view over JSON. The trigger
//! endpoint is used by both external periodic schedulers and manual
//! administrative invocation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/process` | Run one drain invocation, optionally overriding batch size and time budget |
//! | `GET`  | `/status` | Synchronization health aggregates |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses follow:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "batch_size must be > 0" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! dashboards and cross-origin scheduler calls.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::drain::{self, DrainOptions, DrainReport};
use crate::status::{self, StatusReport};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Starts the HTTP server. Binds to `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config, pool: SqlitePool) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/process", post(handle_process))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Embedsync server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /process ============

/// Request body for the processing trigger. Both fields optional; defaults
/// come from the drain configuration.
#[derive(Deserialize, Default)]
struct ProcessRequest {
    batch_size: Option<usize>,
    timeout_seconds: Option<u64>,
}

async fn handle_process(
    State(state): State<AppState>,
    body: Option<Json<ProcessRequest>>,
) -> Result<Json<DrainReport>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    if req.batch_size == Some(0) {
        return Err(bad_request("batch_size must be > 0"));
    }
    if req.timeout_seconds == Some(0) {
        return Err(bad_request("timeout_seconds must be > 0"));
    }

    let opts = DrainOptions {
        batch_size: req.batch_size,
        time_budget: req.timeout_seconds.map(Duration::from_secs),
    };

    let report = drain::run_drain(&state.pool, &state.config, opts)
        .await
        .map_err(|e| internal(format!("drain failed: {}", e)))?;

    Ok(Json(report))
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Result<Json<StatusReport>, AppError> {
    let report = status::collect_status(&state.pool)
        .await
        .map_err(|e| internal(format!("status failed: {}", e)))?;

    Ok(Json(report))
}
