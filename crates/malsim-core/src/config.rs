//! Service configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Template shipped in this crate's `assets/`, resolved at build time so it
/// does not depend on the working directory. Installed binaries should set
/// an explicit template path.
pub const DEFAULT_TEMPLATE_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets/simulation.c");

/// Compiler toolchain invocation.
///
/// The build runs `program [args..] <source> -o <binary> [link_args..]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Compiler executable.
    pub program: String,

    /// Arguments placed before the source path.
    pub args: Vec<String>,

    /// Arguments placed after the output path (libraries to link).
    pub link_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "gcc".to_string(),
            args: Vec::new(),
            link_args: vec!["-lm".to_string()],
        }
    }
}

/// Upper bounds on request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestLimits {
    pub max_humans: u64,
    pub max_mosquitoes: u64,
    pub max_houses: u64,
    pub max_days: u64,
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_humans: 1_000_000,
            max_mosquitoes: 1_000_000,
            max_houses: 10_000,
            max_days: 3_650,
            min_temperature: -50.0,
            max_temperature: 60.0,
        }
    }
}

/// Configuration for the simulation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Fixed location of the simulation template.
    pub template_path: PathBuf,

    /// Parent directory of request-scoped workspaces.
    pub work_root: PathBuf,

    /// Compiler toolchain.
    pub compiler: CompilerConfig,

    /// Wall-clock ceiling for compilation (milliseconds).
    pub build_timeout_ms: u64,

    /// Wall-clock ceiling for the simulation run (milliseconds).
    pub run_timeout_ms: u64,

    /// Deadline for a whole request, all stages included (milliseconds).
    pub request_timeout_ms: u64,

    /// Bytes retained per captured child stream.
    pub max_diagnostic_bytes: usize,

    /// Requests allowed to build or run at the same time.
    pub max_concurrent_runs: usize,

    /// Derive biting and mortality rates from the request temperature.
    pub adjust_rates_for_temperature: bool,

    /// Request parameter bounds.
    pub limits: RequestLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            work_root: std::env::temp_dir(),
            compiler: CompilerConfig::default(),
            build_timeout_ms: 30_000,
            run_timeout_ms: 60_000,
            request_timeout_ms: 120_000,
            max_diagnostic_bytes: 8 * 1024,
            max_concurrent_runs: 4,
            adjust_rates_for_temperature: false,
            limits: RequestLimits::default(),
        }
    }
}

impl ServiceConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
