//! Build/execute abstraction over the external simulator.
//!
//! The orchestrator only sees [`SimulationToolchain`], so other strategies
//! (a cached artifact per parameter set, a remote runner) can replace the
//! native compiler without touching request sequencing.

use crate::builder::{self, BuildArtifact, BuildSettings};
use crate::config::ServiceConfig;
use crate::error::SimResult;
use crate::runner::{self, RunArgs, RunOutcome, RunSettings};
use crate::template::ParameterizedSource;
use crate::workspace::RequestWorkspace;
use async_trait::async_trait;

/// Something that can turn a parameterized source into simulation output.
#[async_trait]
pub trait SimulationToolchain: Send + Sync {
    /// Produce an executable artifact for `source` inside `workspace`.
    async fn build(
        &self,
        source: &ParameterizedSource,
        workspace: &RequestWorkspace,
    ) -> SimResult<BuildArtifact>;

    /// Run `artifact`, leaving its datasets in the workspace.
    async fn execute(
        &self,
        artifact: &BuildArtifact,
        args: &RunArgs,
        workspace: &RequestWorkspace,
    ) -> SimResult<RunOutcome>;
}

/// Compiles with the system C toolchain and runs the binary directly.
#[derive(Debug, Clone)]
pub struct NativeToolchain {
    build: BuildSettings,
    run: RunSettings,
}

impl NativeToolchain {
    pub fn new(build: BuildSettings, run: RunSettings) -> Self {
        Self { build, run }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            BuildSettings {
                compiler: config.compiler.clone(),
                timeout: config.build_timeout(),
                capture_limit: config.max_diagnostic_bytes,
            },
            RunSettings {
                timeout: config.run_timeout(),
                capture_limit: config.max_diagnostic_bytes,
            },
        )
    }
}

#[async_trait]
impl SimulationToolchain for NativeToolchain {
    async fn build(
        &self,
        source: &ParameterizedSource,
        workspace: &RequestWorkspace,
    ) -> SimResult<BuildArtifact> {
        builder::build(source, workspace, &self.build).await
    }

    async fn execute(
        &self,
        artifact: &BuildArtifact,
        args: &RunArgs,
        workspace: &RequestWorkspace,
    ) -> SimResult<RunOutcome> {
        runner::run(artifact, args, workspace, &self.run).await
    }
}
