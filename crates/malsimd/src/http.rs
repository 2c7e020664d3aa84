//! HTTP surface: routes, shared state and status-code mapping.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use malsim_core::{
    ErrorKind, FailureReport, PipelineStage, ResponseEnvelope, SimulationRequest,
    SimulationService, SimulationTemplate,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: SimulationService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: SimulationService) -> Self {
        Self {
            service,
            started_at: Utc::now(),
        }
    }
}

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub template: TemplateStatus,
}

/// The template the next request would use.
#[derive(Debug, Serialize)]
pub struct TemplateStatus {
    pub path: String,
    /// SHA-256 of the template, absent when it cannot be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/run-simulation", post(run_simulation_handler))
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST `/api/run-simulation` - runs one simulation and returns both charts.
///
/// # Response
/// - `200 OK` with `{ success: true, plots }`
/// - `400 BAD_REQUEST` when the body is rejected before any work starts
/// - `504 GATEWAY_TIMEOUT` when a build, run or request ceiling was hit
/// - `500 INTERNAL_SERVER_ERROR` for every other failure
pub async fn run_simulation_handler(
    State(state): State<AppState>,
    payload: Result<Json<SimulationRequest>, JsonRejection>,
) -> impl IntoResponse {
    let response = match payload {
        Ok(Json(request)) => state.service.handle(request).await,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected simulation request body");
            ResponseEnvelope::Failure(FailureReport {
                stage: PipelineStage::Received,
                kind: ErrorKind::UnexpectedFailure,
                message: format!("invalid request: {}", rejection.body_text()),
                timed_out: false,
            })
        }
    };
    (status_for(&response), Json(response))
}

/// GET `/api/status` - liveness plus the active template fingerprint.
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let path = &state.service.config().template_path;
    let template = match SimulationTemplate::load(path).await {
        Ok(template) => TemplateStatus {
            path: path.display().to_string(),
            digest: Some(template.digest().to_string()),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "simulation template unavailable");
            TemplateStatus {
                path: path.display().to_string(),
                digest: None,
                error: Some(e.to_string()),
            }
        }
    };

    Json(StatusResponse {
        status: "Server is running",
        started_at: state.started_at,
        template,
    })
}

pub fn status_for(response: &ResponseEnvelope) -> StatusCode {
    match response.failure() {
        None => StatusCode::OK,
        Some(report) if report.stage == PipelineStage::Received => StatusCode::BAD_REQUEST,
        Some(report) if report.timed_out => StatusCode::GATEWAY_TIMEOUT,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
