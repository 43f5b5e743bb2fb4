//! HTTP read API and refresh trigger.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/events?date=YYYY-MM-DD` | Grouped events for one day (default today) |
//! | `GET`  | `/events/week` | Grouped events for the seven days starting today |
//! | `GET`  | `/events/random` | One stored event picked at random, or `null` |
//! | `POST` | `/refresh` | Start a pipeline run in the background |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid date '2025-13-01': expected YYYY-MM-DD" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! `POST /refresh` answers `202 Accepted` as soon as the run is scheduled.
//! Runs triggered while another is in flight wait for it to finish.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use event_harvester_core::models::EventRow;
use event_harvester_core::store::EventStore;

use crate::config::Config;
use crate::events::{day_events, parse_date, week_events, DayEvents};
use crate::pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    /// Email corpus read by `POST /refresh`.
    source: Arc<PathBuf>,
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(pipeline: Arc<Pipeline>, source: PathBuf) -> Router {
    let state = AppState {
        pipeline,
        source: Arc::new(source),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/events", get(handle_day))
        .route("/events/week", get(handle_week))
        .route("/events/random", get(handle_random))
        .route("/refresh", post(handle_refresh))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Arc<Pipeline>, source: PathBuf) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(pipeline, source);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Server listening");
    println!("harvest server listening on http://{}", bind_addr);

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

fn internal(err: anyhow::Error) -> AppError {
    error!("request failed: {:#}", err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
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

// ============ GET /events ============

#[derive(Deserialize)]
struct DayQuery {
    date: Option<String>,
}

async fn handle_day(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<DayEvents>, AppError> {
    let date = match query.date.as_deref() {
        Some(s) => parse_date(s).map_err(|e| bad_request(e.to_string()))?,
        None => Local::now().date_naive(),
    };
    let day = day_events(state.pipeline.store().as_ref(), date)
        .await
        .map_err(internal)?;
    Ok(Json(day))
}

// ============ GET /events/week ============

#[derive(Serialize)]
struct WeekResponse {
    days: Vec<DayEvents>,
}

async fn handle_week(State(state): State<AppState>) -> Result<Json<WeekResponse>, AppError> {
    let days = week_events(state.pipeline.store().as_ref(), Local::now().date_naive())
        .await
        .map_err(internal)?;
    Ok(Json(WeekResponse { days }))
}

// ============ GET /events/random ============

#[derive(Serialize)]
struct RandomResponse {
    event: Option<EventRow>,
}

async fn handle_random(State(state): State<AppState>) -> Result<Json<RandomResponse>, AppError> {
    let event = state.pipeline.store().random().await.map_err(internal)?;
    Ok(Json(RandomResponse { event }))
}

// ============ POST /refresh ============

#[derive(Serialize)]
struct RefreshResponse {
    status: &'static str,
}

async fn handle_refresh(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let handle = state.pipeline.spawn(state.source.as_ref().clone());
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(report)) => info!(inserted = report.inserted, "Refresh finished"),
            Ok(Err(e)) => error!("Refresh failed: {}", e),
            Err(e) => error!("Refresh task panicked: {}", e),
        }
    });
    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse { status: "started" }),
    )
}
