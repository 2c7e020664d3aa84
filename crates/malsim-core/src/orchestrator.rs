//! Request orchestration: parameterize → build → run → ingest → project.
//!
//! Stages run strictly in sequence; the first failure short-circuits the
//! request and is reported together with the stage it happened in. No
//! partial results are ever returned.

use crate::chart::{project, Plots};
use crate::config::ServiceConfig;
use crate::diagnostics::bound_text;
use crate::error::{ErrorKind, SimError, SimResult};
use crate::ingest::{aggregate_house_infections, ingest};
use crate::lifecycle::{PipelineStage, RequestLifecycle};
use crate::obs;
use crate::request::SimulationRequest;
use crate::runner::RunArgs;
use crate::template::{parameterize, ParameterizeOptions, SimulationTemplate};
use crate::toolchain::{NativeToolchain, SimulationToolchain};
use crate::workspace::RequestWorkspace;
use serde::{Serialize, Serializer};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Room left in failure messages for the text around bounded diagnostics.
const MESSAGE_OVERHEAD_BYTES: usize = 512;

/// Why a request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    pub message: String,
    pub timed_out: bool,
}

/// Outcome of one request: both charts, or a single failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(Plots),
    Failure(FailureReport),
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    pub fn plots(&self) -> Option<&Plots> {
        match self {
            ResponseEnvelope::Success(plots) => Some(plots),
            ResponseEnvelope::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        match self {
            ResponseEnvelope::Success(_) => None,
            ResponseEnvelope::Failure(report) => Some(report),
        }
    }
}

#[derive(Serialize)]
struct WireResponse<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    plots: Option<&'a Plots>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ResponseEnvelope::Success(plots) => WireResponse {
                success: true,
                plots: Some(plots),
                error: None,
                stage: None,
                kind: None,
            },
            ResponseEnvelope::Failure(report) => WireResponse {
                success: false,
                plots: None,
                error: Some(&report.message),
                stage: Some(report.stage),
                kind: Some(report.kind),
            },
        };
        wire.serialize(serializer)
    }
}

/// Runs simulation requests end to end.
#[derive(Clone)]
pub struct SimulationService {
    config: Arc<ServiceConfig>,
    toolchain: Arc<dyn SimulationToolchain>,
    permits: Arc<Semaphore>,
}

impl SimulationService {
    pub fn new(config: ServiceConfig, toolchain: Arc<dyn SimulationToolchain>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            config: Arc::new(config),
            toolchain,
            permits,
        }
    }

    /// Service backed by the system compiler.
    pub fn native(config: ServiceConfig) -> Self {
        let toolchain = Arc::new(NativeToolchain::from_config(&config));
        Self::new(config, toolchain)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Handle one request. Always returns exactly one of success or failure.
    pub async fn handle(&self, request: SimulationRequest) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        self.handle_request(request_id, request)
            .instrument(obs::request_span(&request_id))
            .await
    }

    async fn handle_request(&self, request_id: Uuid, request: SimulationRequest) -> ResponseEnvelope {
        let start = Instant::now();
        let mut lifecycle = RequestLifecycle::new();

        match self.run_pipeline(request_id, &request, &mut lifecycle).await {
            Ok(plots) => {
                obs::emit_request_completed(start.elapsed().as_millis() as u64);
                ResponseEnvelope::Success(plots)
            }
            Err(err) => {
                let stage = lifecycle.fail();
                obs::emit_request_failed(
                    stage,
                    err.kind(),
                    start.elapsed().as_millis() as u64,
                    &err,
                );
                ResponseEnvelope::Failure(self.report(stage, &err))
            }
        }
    }

    async fn run_pipeline(
        &self,
        request_id: Uuid,
        request: &SimulationRequest,
        lifecycle: &mut RequestLifecycle,
    ) -> SimResult<Plots> {
        let deadline = Instant::now() + self.config.request_timeout();

        request.validate(&self.config.limits)?;

        advance(lifecycle, PipelineStage::Parameterizing)?;
        let template = self
            .within(deadline, SimulationTemplate::load(&self.config.template_path))
            .await??;
        obs::emit_request_started(request.houses, request.days, template.digest());
        let source = parameterize(
            &template,
            request,
            ParameterizeOptions {
                adjust_rates_for_temperature: self.config.adjust_rates_for_temperature,
            },
        )?;

        advance(lifecycle, PipelineStage::Building)?;
        let permit = self
            .within(deadline, self.permits.clone().acquire_owned())
            .await?
            .map_err(|e| SimError::Unexpected(format!("run queue closed: {e}")))?;
        let workspace = RequestWorkspace::create(&self.config.work_root, request_id).await?;
        let artifact = self
            .within(deadline, self.toolchain.build(&source, &workspace))
            .await??;

        advance(lifecycle, PipelineStage::Running)?;
        let args = RunArgs {
            temperature: request.temperature,
            days: request.days,
        };
        self.within(deadline, self.toolchain.execute(&artifact, &args, &workspace))
            .await??;
        drop(permit);

        advance(lifecycle, PipelineStage::Ingesting)?;
        let results = self.within(deadline, ingest(workspace.path())).await??;
        let aggregated = aggregate_house_infections(&results.houses)?;

        advance(lifecycle, PipelineStage::Projecting)?;
        let plots = project(&results.global, &aggregated)?;

        workspace.cleanup().await;
        lifecycle.complete().map_err(SimError::Unexpected)?;
        Ok(plots)
    }

    /// Await `fut` unless the request deadline passes first.
    async fn within<F: Future>(&self, deadline: Instant, fut: F) -> SimResult<F::Output> {
        tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| SimError::DeadlineExceeded {
                limit_ms: self.config.request_timeout_ms,
            })
    }

    fn report(&self, stage: PipelineStage, err: &SimError) -> FailureReport {
        FailureReport {
            stage,
            kind: err.kind(),
            message: bound_text(
                &err.to_string(),
                self.config.max_diagnostic_bytes + MESSAGE_OVERHEAD_BYTES,
            ),
            timed_out: err.is_timeout(),
        }
    }
}

fn advance(lifecycle: &mut RequestLifecycle, stage: PipelineStage) -> SimResult<()> {
    lifecycle.enter(stage).map_err(SimError::Unexpected)?;
    obs::emit_stage_entered(stage);
    Ok(())
}
