//! Per-request state machine.
//!
//! `Received → Parameterizing → Building → Running → Ingesting → Projecting → Completed`,
//! with any non-terminal state able to move to `Failed(stage)`.

use serde::Serialize;
use std::fmt;

/// A stage of the request pipeline.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Parameterizing,
    Building,
    Running,
    Ingesting,
    Projecting,
}

impl PipelineStage {
    /// Stage name as it appears in logs and responses.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Parameterizing => "parameterizing",
            PipelineStage::Building => "building",
            PipelineStage::Running => "running",
            PipelineStage::Ingesting => "ingesting",
            PipelineStage::Projecting => "projecting",
        }
    }

    /// The stage that follows this one, or `None` for the last.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Received => Some(PipelineStage::Parameterizing),
            PipelineStage::Parameterizing => Some(PipelineStage::Building),
            PipelineStage::Building => Some(PipelineStage::Running),
            PipelineStage::Running => Some(PipelineStage::Ingesting),
            PipelineStage::Ingesting => Some(PipelineStage::Projecting),
            PipelineStage::Projecting => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observable state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Active(PipelineStage),
    Completed,
    Failed(PipelineStage),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Active(_))
    }
}

/// Tracks a request's progress and rejects out-of-order transitions.
#[derive(Debug)]
pub struct RequestLifecycle {
    state: RequestState,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Active(PipelineStage::Received),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The active stage, or the stage a failed request stopped in.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self.state {
            RequestState::Active(stage) | RequestState::Failed(stage) => Some(stage),
            RequestState::Completed => None,
        }
    }

    /// Move to `stage`, which must directly follow the active one.
    pub fn enter(&mut self, stage: PipelineStage) -> Result<(), String> {
        match self.state {
            RequestState::Active(current) if current.next() == Some(stage) => {
                self.state = RequestState::Active(stage);
                Ok(())
            }
            other => Err(format!("invalid transition {other:?} -> {stage}")),
        }
    }

    /// Finish successfully; only valid once projection is active.
    pub fn complete(&mut self) -> Result<(), String> {
        match self.state {
            RequestState::Active(PipelineStage::Projecting) => {
                self.state = RequestState::Completed;
                Ok(())
            }
            other => Err(format!("cannot complete from {other:?}")),
        }
    }

    /// Fail in the active stage and return it. A terminal request keeps its state.
    pub fn fail(&mut self) -> PipelineStage {
        match self.state {
            RequestState::Active(stage) => {
                self.state = RequestState::Failed(stage);
                stage
            }
            RequestState::Failed(stage) => stage,
            RequestState::Completed => PipelineStage::Projecting,
        }
    }
}
