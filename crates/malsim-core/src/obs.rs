//! Structured observability hooks for the request lifecycle.
//!
//! Every request runs inside a [`request_span`]; the `emit_*` functions log
//! lifecycle events at `info!` (failures at `warn!`).

use crate::error::ErrorKind;
use crate::lifecycle::PipelineStage;
use tracing::{info, warn, Span};
use uuid::Uuid;

/// Span tagging all logs of one request with its id.
pub fn request_span(request_id: &Uuid) -> Span {
    tracing::info_span!("malsim.request", request_id = %request_id)
}

/// Emit event: request accepted.
pub fn emit_request_started(houses: u64, days: u64, template_digest: &str) {
    info!(
        event = "request.started",
        houses = houses,
        days = days,
        template_digest = %template_digest,
    );
}

/// Emit event: a pipeline stage began.
pub fn emit_stage_entered(stage: PipelineStage) {
    info!(event = "stage.entered", stage = %stage);
}

/// Emit event: request finished with both charts.
pub fn emit_request_completed(duration_ms: u64) {
    info!(event = "request.completed", duration_ms = duration_ms);
}

/// Emit event: request failed (warning level).
pub fn emit_request_failed(
    stage: PipelineStage,
    kind: ErrorKind,
    duration_ms: u64,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "request.failed",
        stage = %stage,
        kind = ?kind,
        duration_ms = duration_ms,
        error = %error,
    );
}
