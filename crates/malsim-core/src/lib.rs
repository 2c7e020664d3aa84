//! Malsim Core - on-demand malaria simulation runs
//!
//! Turns a set of request parameters into chart-ready series by:
//! - Substituting the parameters into a C simulation template
//! - Compiling and running the simulator in a request-scoped workspace
//! - Validating and aggregating the CSV datasets it writes
//! - Projecting the results into library-neutral chart envelopes

pub mod builder;
pub mod chart;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod obs;
pub mod orchestrator;
pub mod process;
pub mod request;
pub mod runner;
pub mod telemetry;
pub mod template;
pub mod toolchain;
pub mod workspace;

// Re-export key types
pub use builder::{BuildArtifact, BuildSettings};
pub use chart::{ChartEnvelope, ChartSeries, Plots, SeriesKind};
pub use config::{CompilerConfig, RequestLimits, ServiceConfig};
pub use error::{ErrorKind, FailureDetail, SimError, SimResult};
pub use ingest::{AggregatedRow, IngestedResults, RawDataset};
pub use lifecycle::{PipelineStage, RequestLifecycle, RequestState};
pub use orchestrator::{FailureReport, ResponseEnvelope, SimulationService};
pub use request::{Interventions, SimulationRequest};
pub use runner::{RunArgs, RunOutcome, RunSettings};
pub use telemetry::init_tracing;
pub use template::{ParameterizedSource, SimulationTemplate};
pub use toolchain::{NativeToolchain, SimulationToolchain};
pub use workspace::RequestWorkspace;
