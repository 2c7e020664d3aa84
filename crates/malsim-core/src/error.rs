//! Error taxonomy for the simulation pipeline.

use serde::Serialize;
use std::fmt;

/// Why a build or run stage failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    /// The child exited non-zero; carries its bounded diagnostic stream.
    Diagnostics(String),

    /// The child exceeded its wall-clock ceiling and was killed.
    Timeout { limit_ms: u64 },
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::Diagnostics(text) if text.trim().is_empty() => {
                f.write_str("no diagnostics captured")
            }
            FailureDetail::Diagnostics(text) => f.write_str(text.trim_end()),
            FailureDetail::Timeout { limit_ms } => write!(f, "timed out after {limit_ms}ms"),
        }
    }
}

/// Errors produced by any stage of a simulation request.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("simulation template no longer matches expected marker `{marker}`")]
    TemplateMismatch { marker: String },

    #[error("simulation compilation failed: {0}")]
    BuildFailed(FailureDetail),

    #[error("simulation execution failed: {0}")]
    RuntimeFailed(FailureDetail),

    #[error("simulation produced no output file(s): {}", files.join(", "))]
    MissingOutput { files: Vec<String> },

    #[error("simulation produced an empty data file: {file}")]
    EmptyOutput { file: String },

    #[error("malformed simulation output in {file}: {reason}")]
    MalformedOutput { file: String, reason: String },

    #[error("request deadline of {limit_ms}ms exceeded")]
    DeadlineExceeded { limit_ms: u64 },

    #[error("{0}")]
    Unexpected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Classify this error for the response envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::TemplateMismatch { .. } => ErrorKind::TemplateMismatch,
            SimError::BuildFailed(_) => ErrorKind::BuildFailed,
            SimError::RuntimeFailed(_) => ErrorKind::RuntimeFailed,
            SimError::MissingOutput { .. } => ErrorKind::MissingOutput,
            SimError::EmptyOutput { .. } => ErrorKind::EmptyOutput,
            SimError::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            SimError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            SimError::Unexpected(_) | SimError::Io(_) => ErrorKind::UnexpectedFailure,
        }
    }

    /// Whether the failure was caused by a wall-clock ceiling.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SimError::BuildFailed(FailureDetail::Timeout { .. })
                | SimError::RuntimeFailed(FailureDetail::Timeout { .. })
                | SimError::DeadlineExceeded { .. }
        )
    }
}

/// Stable, wire-facing error classes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateMismatch,
    BuildFailed,
    RuntimeFailed,
    MissingOutput,
    EmptyOutput,
    MalformedOutput,
    DeadlineExceeded,
    UnexpectedFailure,
}

/// Result type for pipeline operations.
pub type SimResult<T> = std::result::Result<T, SimError>;
