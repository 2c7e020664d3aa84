//! Compilation of parameterized sources into native simulators.

use crate::config::CompilerConfig;
use crate::error::{FailureDetail, SimError, SimResult};
use crate::process::{run_command, CommandSpec, ProcessError};
use crate::template::ParameterizedSource;
use crate::workspace::RequestWorkspace;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Compiled simulator owned by one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// Path of the executable inside the request workspace.
    pub executable: PathBuf,

    /// Compiler warnings, bounded.
    pub warnings: String,

    /// Compile time in milliseconds.
    pub duration_ms: u64,
}

/// How to invoke the compiler.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub compiler: CompilerConfig,
    pub timeout: Duration,
    pub capture_limit: usize,
}

/// Write `source` into the workspace and compile it.
pub async fn build(
    source: &ParameterizedSource,
    workspace: &RequestWorkspace,
    settings: &BuildSettings,
) -> SimResult<BuildArtifact> {
    let source_path = workspace.source_path();
    let executable = workspace.binary_path();

    tokio::fs::write(&source_path, source.text()).await?;

    let mut args = settings.compiler.args.clone();
    args.push(source_path.display().to_string());
    args.push("-o".to_string());
    args.push(executable.display().to_string());
    args.extend(settings.compiler.link_args.iter().cloned());

    let spec = CommandSpec {
        name: "compile".to_string(),
        program: PathBuf::from(&settings.compiler.program),
        args,
        working_dir: workspace.path().to_path_buf(),
        timeout: settings.timeout,
        capture_limit: settings.capture_limit,
    };

    let output = run_command(&spec).await.map_err(|e| match e {
        ProcessError::Timeout { limit_ms, .. } => {
            SimError::BuildFailed(FailureDetail::Timeout { limit_ms })
        }
        ProcessError::Spawn { .. } => SimError::BuildFailed(FailureDetail::Diagnostics(e.to_string())),
        ProcessError::Io { .. } => SimError::Unexpected(e.to_string()),
    })?;

    if !output.success() {
        debug!(exit_code = output.exit_code(), "compiler rejected source");
        return Err(SimError::BuildFailed(FailureDetail::Diagnostics(
            output.stderr.render(),
        )));
    }

    if !tokio::fs::try_exists(&executable).await? {
        return Err(SimError::BuildFailed(FailureDetail::Diagnostics(format!(
            "compiler exited successfully but produced no executable at {}",
            executable.display()
        ))));
    }

    info!(
        event = "artifact.built",
        duration_ms = output.duration_ms,
        executable = %executable.display()
    );

    Ok(BuildArtifact {
        executable,
        warnings: output.stderr.render(),
        duration_ms: output.duration_ms,
    })
}
