//! Execution of a built simulator.

use crate::builder::BuildArtifact;
use crate::error::{FailureDetail, SimError, SimResult};
use crate::process::{run_command, CommandSpec, ProcessError};
use crate::workspace::RequestWorkspace;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Positional runtime arguments of the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunArgs {
    pub temperature: f64,
    pub days: u64,
}

impl RunArgs {
    /// `[temperature, days]`; temperature uses the shortest round-trip form.
    pub fn to_argv(&self) -> Vec<String> {
        vec![self.temperature.to_string(), self.days.to_string()]
    }
}

/// Outcome of a simulator run that exited with status zero.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Directory the simulator wrote its datasets into.
    pub output_dir: PathBuf,

    /// Bounded standard output.
    pub stdout: String,

    /// Bounded standard error.
    pub stderr: String,

    /// Run time in milliseconds.
    pub duration_ms: u64,
}

/// How to invoke the simulator.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub timeout: Duration,
    pub capture_limit: usize,
}

/// Run `artifact` inside the request workspace.
pub async fn run(
    artifact: &BuildArtifact,
    args: &RunArgs,
    workspace: &RequestWorkspace,
    settings: &RunSettings,
) -> SimResult<RunOutcome> {
    let spec = CommandSpec {
        name: "simulate".to_string(),
        program: artifact.executable.clone(),
        args: args.to_argv(),
        working_dir: workspace.path().to_path_buf(),
        timeout: settings.timeout,
        capture_limit: settings.capture_limit,
    };

    let output = run_command(&spec).await.map_err(|e| match e {
        ProcessError::Timeout { limit_ms, .. } => {
            SimError::RuntimeFailed(FailureDetail::Timeout { limit_ms })
        }
        ProcessError::Spawn { .. } => {
            SimError::RuntimeFailed(FailureDetail::Diagnostics(e.to_string()))
        }
        ProcessError::Io { .. } => SimError::Unexpected(e.to_string()),
    })?;

    if !output.success() {
        let mut diagnostics = output.stderr.render();
        if diagnostics.trim().is_empty() {
            diagnostics = format!("simulator exited with code {}", output.exit_code());
        }
        return Err(SimError::RuntimeFailed(FailureDetail::Diagnostics(
            diagnostics,
        )));
    }

    let stdout = output.stdout.render();
    debug!(stdout = %stdout.trim_end(), "simulator output");
    info!(
        event = "simulation.finished",
        duration_ms = output.duration_ms,
        temperature = args.temperature,
        days = args.days
    );

    Ok(RunOutcome {
        output_dir: workspace.path().to_path_buf(),
        stdout,
        stderr: output.stderr.render(),
        duration_ms: output.duration_ms,
    })
}
