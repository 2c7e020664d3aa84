//! Bounded execution of external processes.

use crate::diagnostics::{capture_bounded, CapturedStream};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use group::ProcessGroup;

/// An external command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Label used in logs.
    pub name: String,

    /// Executable to launch.
    pub program: PathBuf,

    /// Positional arguments.
    pub args: Vec<String>,

    /// Working directory of the child.
    pub working_dir: PathBuf,

    /// Wall-clock ceiling.
    pub timeout: Duration,

    /// Bytes retained per output stream.
    pub capture_limit: usize,
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when the child was terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Failures to obtain a [`ProcessOutput`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} timed out after {limit_ms}ms")]
    Timeout { name: String, limit_ms: u64 },

    #[error("io error while running {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Grace period for output streams to close once the child has exited.
const STREAM_GRACE: Duration = Duration::from_millis(250);

/// Run `spec` to completion or until its timeout.
///
/// The child leads its own process group. Every member of that group is
/// killed when this function returns or its future is dropped (for example
/// on client disconnect), so nothing the child started outlives it.
pub async fn run_command(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    let start = Instant::now();

    debug!(
        command = %spec.name,
        program = %spec.program.display(),
        args = ?spec.args,
        "spawning process"
    );

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.display().to_string(),
        source,
    })?;
    let group = ProcessGroup::of(&child);

    let outcome = tokio::time::timeout(
        spec.timeout,
        collect(&mut child, &group, spec.capture_limit),
    )
    .await;

    match outcome {
        Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
            status,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        }),
        Ok(Err(source)) => Err(ProcessError::Io {
            name: spec.name.clone(),
            source,
        }),
        Err(_elapsed) => {
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(command = %spec.name, error = %e, "failed to kill timed out process");
            }
            Err(ProcessError::Timeout {
                name: spec.name.clone(),
                limit_ms: spec.timeout.as_millis() as u64,
            })
        }
    }
}

/// Wait for the child while draining its streams.
///
/// Descendants may keep the pipes open after the child exits; they get
/// [`STREAM_GRACE`] to finish before the group is killed.
async fn collect(
    child: &mut Child,
    group: &ProcessGroup,
    limit: usize,
) -> std::io::Result<(ExitStatus, CapturedStream, CapturedStream)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let streams = async move {
        tokio::join!(
            capture_bounded(stdout, limit),
            capture_bounded(stderr, limit)
        )
    };
    tokio::pin!(streams);

    let mut drained = None;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            out = &mut streams, if drained.is_none() => drained = Some(out),
        }
    };

    let (stdout, stderr) = match drained {
        Some(out) => out,
        None => match tokio::time::timeout(STREAM_GRACE, &mut streams).await {
            Ok(out) => out,
            Err(_) => {
                debug!("child exited with descendants holding its output open");
                group.kill();
                streams.await
            }
        },
    };
    Ok((status, stdout?, stderr?))
}

#[cfg(unix)]
mod group {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use tokio::process::Child;
    use tracing::warn;

    /// Process group led by a spawned child, killed as a whole on drop.
    #[derive(Debug)]
    pub(super) struct ProcessGroup {
        pgid: Option<Pid>,
    }

    impl ProcessGroup {
        pub(super) fn of(child: &Child) -> Self {
            Self {
                pgid: child.id().map(|id| Pid::from_raw(id as i32)),
            }
        }

        pub(super) fn kill(&self) {
            let Some(pgid) = self.pgid else {
                return;
            };
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid = pgid.as_raw(), error = %e, "failed to kill process group"),
            }
        }
    }

    impl Drop for ProcessGroup {
        fn drop(&mut self) {
            self.kill();
        }
    }
}

#[cfg(not(unix))]
mod group {
    use tokio::process::Child;

    /// Without process groups only the direct child is tracked (`kill_on_drop`).
    #[derive(Debug)]
    pub(super) struct ProcessGroup;

    impl ProcessGroup {
        pub(super) fn of(_child: &Child) -> Self {
            Self
        }

        pub(super) fn kill(&self) {}
    }
}
