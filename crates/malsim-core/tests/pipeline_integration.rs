//! Integration tests for request orchestration with a recording toolchain.

use async_trait::async_trait;
use malsim_core::{
    BuildArtifact, ErrorKind, FailureDetail, ParameterizedSource, PipelineStage, RequestWorkspace,
    ResponseEnvelope, RunArgs, RunOutcome, ServiceConfig, SimError, SimResult,
    SimulationRequest, SimulationService, SimulationToolchain,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Behavior {
    Simulate,
    FailBuild,
    FailRun,
    NoOutput,
    EmptyHouses,
    Hang,
}

/// Toolchain that records invocations and fakes simulator output from the
/// parameterized source it was handed.
struct RecordingToolchain {
    behavior: Behavior,
    delay: Duration,
    builds: AtomicUsize,
    executes: AtomicUsize,
}

impl RecordingToolchain {
    fn new(behavior: Behavior) -> Arc<Self> {
        Self::with_delay(behavior, Duration::ZERO)
    }

    fn with_delay(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            builds: AtomicUsize::new(0),
            executes: AtomicUsize::new(0),
        })
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

fn define_value(source: &str, name: &str) -> u64 {
    source
        .lines()
        .find(|line| line.split_whitespace().nth(1) == Some(name) && line.starts_with("#define"))
        .and_then(|line| line.split_whitespace().nth(2))
        .and_then(|value| value.parse().ok())
        .unwrap_or_else(|| panic!("{name} not defined in source"))
}

#[async_trait]
impl SimulationToolchain for RecordingToolchain {
    async fn build(
        &self,
        source: &ParameterizedSource,
        workspace: &RequestWorkspace,
    ) -> SimResult<BuildArtifact> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailBuild {
            return Err(SimError::BuildFailed(FailureDetail::Diagnostics(
                "simulation.c:12: error: expected ';' before '}' token".to_string(),
            )));
        }
        std::fs::write(workspace.source_path(), source.text())?;
        Ok(BuildArtifact {
            executable: workspace.source_path(),
            warnings: String::new(),
            duration_ms: 0,
        })
    }

    async fn execute(
        &self,
        artifact: &BuildArtifact,
        args: &RunArgs,
        workspace: &RequestWorkspace,
    ) -> SimResult<RunOutcome> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let dir = workspace.path();
        match self.behavior {
            Behavior::FailRun => {
                return Err(SimError::RuntimeFailed(FailureDetail::Diagnostics(
                    "Segmentation fault".to_string(),
                )))
            }
            Behavior::Hang => tokio::time::sleep(Duration::from_secs(30)).await,
            Behavior::NoOutput => {}
            Behavior::EmptyHouses => {
                write_global(dir, 100, args.days);
                std::fs::write(dir.join("house_infected.csv"), "day,houseID,infectedHumans\n")?;
            }
            Behavior::Simulate | Behavior::FailBuild => {
                let source = std::fs::read_to_string(&artifact.executable)?;
                let humans = define_value(&source, "NUM_HUMANS");
                let houses = define_value(&source, "NUM_HOUSES");
                let days = define_value(&source, "DAYS");
                assert_eq!(days, args.days, "runtime days must match compiled days");
                write_global(dir, humans, days);
                write_houses(dir, houses, days);
            }
        }

        Ok(RunOutcome {
            output_dir: dir.to_path_buf(),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}

/// Global stats with I = day so series values are recognisable.
fn write_global(dir: &Path, humans: u64, days: u64) {
    let mut csv = String::from("day,S,I,R,E_mos,I_mos,totalHumans\n");
    for day in 1..=days {
        csv.push_str(&format!("{day},{},{day},0,2,3,{humans}\n", humans - day));
    }
    std::fs::write(dir.join("global_stats.csv"), csv).unwrap();
}

/// Every house reports `houses` infected humans, so the daily mean equals the house count.
fn write_houses(dir: &Path, houses: u64, days: u64) {
    let mut csv = String::from("day,houseID,infectedHumans\n");
    for day in 1..=days {
        for house in 0..houses {
            csv.push_str(&format!("{day},{house},{houses}\n"));
        }
    }
    std::fs::write(dir.join("house_infected.csv"), csv).unwrap();
}

fn template_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/simulation.c")
}

fn config(work_root: &TempDir) -> ServiceConfig {
    ServiceConfig {
        template_path: template_path(),
        work_root: work_root.path().to_path_buf(),
        ..ServiceConfig::default()
    }
}

fn request(houses: u64, days: u64) -> SimulationRequest {
    SimulationRequest::new(1_000, 2_000, houses, days, 27.0)
}

fn failure(response: &ResponseEnvelope) -> (PipelineStage, ErrorKind, String) {
    let report = response.failure().expect("expected failure");
    (report.stage, report.kind, report.message.clone())
}

fn assert_workspaces_removed(root: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "leftover workspaces: {leftovers:?}");
}

/// Test: successful request produces both charts from the parameterized values
#[tokio::test]
async fn test_successful_request() {
    let root = TempDir::new().unwrap();
    let toolchain = RecordingToolchain::new(Behavior::Simulate);
    let service = SimulationService::new(config(&root), toolchain.clone());

    let response = service.handle(request(4, 6)).await;
    let plots = response.plots().expect("expected success");

    assert_eq!(plots.population.series.len(), 5);
    assert_eq!(plots.population.series[1].label, "Infected Humans");
    assert_eq!(
        plots.population.series[1].y_values,
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
    assert_eq!(plots.infection.series.len(), 1);
    assert_eq!(plots.infection.series[0].y_values, vec![4.0; 6]);
    assert_eq!(toolchain.builds(), 1);
    assert_eq!(toolchain.executes(), 1);
    assert_workspaces_removed(&root);
}

/// Test: build failure short-circuits before the runner and ingestor
#[tokio::test]
async fn test_build_failure_short_circuits() {
    let root = TempDir::new().unwrap();
    let toolchain = RecordingToolchain::new(Behavior::FailBuild);
    let service = SimulationService::new(config(&root), toolchain.clone());

    let response = service.handle(request(4, 6)).await;
    let (stage, kind, message) = failure(&response);

    assert_eq!(stage, PipelineStage::Building);
    assert_eq!(kind, ErrorKind::BuildFailed);
    assert!(message.contains("expected ';'"));
    assert_eq!(toolchain.builds(), 1);
    assert_eq!(toolchain.executes(), 0, "runner must not be invoked");
    assert_workspaces_removed(&root);
}

/// Test: runtime failure is reported at the running stage
#[tokio::test]
async fn test_runtime_failure() {
    let root = TempDir::new().unwrap();
    let toolchain = RecordingToolchain::new(Behavior::FailRun);
    let service = SimulationService::new(config(&root), toolchain.clone());

    let response = service.handle(request(4, 6)).await;
    let (stage, kind, message) = failure(&response);

    assert_eq!(stage, PipelineStage::Running);
    assert_eq!(kind, ErrorKind::RuntimeFailed);
    assert!(message.contains("Segmentation fault"));
    assert_workspaces_removed(&root);
}

/// Test: a run that leaves no datasets yields MissingOutput naming both files
#[tokio::test]
async fn test_missing_output() {
    let root = TempDir::new().unwrap();
    let service = SimulationService::new(config(&root), RecordingToolchain::new(Behavior::NoOutput));

    let response = service.handle(request(4, 6)).await;
    let (stage, kind, message) = failure(&response);

    assert_eq!(stage, PipelineStage::Ingesting);
    assert_eq!(kind, ErrorKind::MissingOutput);
    assert!(message.contains("global_stats.csv"));
    assert!(message.contains("house_infected.csv"));
}

/// Test: an empty per-house table is EmptyOutput, never an empty success
#[tokio::test]
async fn test_empty_house_table() {
    let root = TempDir::new().unwrap();
    let service =
        SimulationService::new(config(&root), RecordingToolchain::new(Behavior::EmptyHouses));

    let response = service.handle(request(4, 6)).await;
    let (stage, kind, message) = failure(&response);

    assert_eq!(stage, PipelineStage::Ingesting);
    assert_eq!(kind, ErrorKind::EmptyOutput);
    assert!(message.contains("house_infected.csv"));
}

/// Test: template drift fails loudly before anything is built
#[tokio::test]
async fn test_template_mismatch() {
    let root = TempDir::new().unwrap();
    let drifted = root.path().join("drifted.c");
    let text = std::fs::read_to_string(template_path())
        .unwrap()
        .replace("#define DAYS              50", "#define DAYS              365");
    std::fs::write(&drifted, text).unwrap();

    let toolchain = RecordingToolchain::new(Behavior::Simulate);
    let service = SimulationService::new(
        ServiceConfig {
            template_path: drifted,
            ..config(&root)
        },
        toolchain.clone(),
    );

    let response = service.handle(request(4, 6)).await;
    let (stage, kind, message) = failure(&response);

    assert_eq!(stage, PipelineStage::Parameterizing);
    assert_eq!(kind, ErrorKind::TemplateMismatch);
    assert!(message.contains("DAYS"));
    assert_eq!(toolchain.builds(), 0);
}

/// Test: invalid parameters are rejected in the received state
#[tokio::test]
async fn test_invalid_request_rejected() {
    let root = TempDir::new().unwrap();
    let toolchain = RecordingToolchain::new(Behavior::Simulate);
    let service = SimulationService::new(config(&root), toolchain.clone());

    let response = service.handle(request(0, 6)).await;
    let (stage, kind, _) = failure(&response);

    assert_eq!(stage, PipelineStage::Received);
    assert_eq!(kind, ErrorKind::UnexpectedFailure);
    assert_eq!(toolchain.builds(), 0);
}

/// Test: request deadline cancels a hung run and cleans up
#[tokio::test]
async fn test_request_deadline() {
    let root = TempDir::new().unwrap();
    let service = SimulationService::new(
        ServiceConfig {
            request_timeout_ms: 200,
            ..config(&root)
        },
        RecordingToolchain::new(Behavior::Hang),
    );

    let response = service.handle(request(4, 6)).await;
    let report = response.failure().expect("expected failure");

    assert_eq!(report.stage, PipelineStage::Running);
    assert_eq!(report.kind, ErrorKind::DeadlineExceeded);
    assert!(report.timed_out);
    assert_workspaces_removed(&root);
}

/// Test: identical requests produce structurally identical charts
#[tokio::test]
async fn test_repeated_requests_same_shape() {
    let root = TempDir::new().unwrap();
    let service =
        SimulationService::new(config(&root), RecordingToolchain::new(Behavior::Simulate));

    let first = service.handle(request(3, 5)).await;
    let second = service.handle(request(3, 5)).await;
    let (a, b) = (first.plots().unwrap(), second.plots().unwrap());

    let labels = |p: &malsim_core::Plots| {
        p.population
            .series
            .iter()
            .chain(&p.infection.series)
            .map(|s| s.label.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(labels(a), labels(b));
    assert_eq!(a.population.title, b.population.title);
}

/// Test: concurrent requests never see each other's artifacts
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_isolated() {
    let root = TempDir::new().unwrap();
    let toolchain = RecordingToolchain::with_delay(Behavior::Simulate, Duration::from_millis(100));
    let service = SimulationService::new(config(&root), toolchain.clone());

    let (small, large) = tokio::join!(
        service.handle(request(3, 4)),
        service.handle(request(7, 9))
    );

    let small = small.plots().expect("small request failed");
    let large = large.plots().expect("large request failed");

    assert_eq!(small.infection.series[0].x_values.len(), 4);
    assert_eq!(small.infection.series[0].y_values, vec![3.0; 4]);
    assert_eq!(large.infection.series[0].x_values.len(), 9);
    assert_eq!(large.infection.series[0].y_values, vec![7.0; 9]);
    assert_eq!(small.population.series[0].x_values.len(), 4);
    assert_eq!(large.population.series[0].x_values.len(), 9);
    assert_eq!(toolchain.executes(), 2);
    assert_workspaces_removed(&root);
}

/// Test: the wire envelope for a stage failure
#[tokio::test]
async fn test_failure_serializes_to_wire_envelope() {
    let root = TempDir::new().unwrap();
    let service =
        SimulationService::new(config(&root), RecordingToolchain::new(Behavior::FailBuild));

    let response = service.handle(request(4, 6)).await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["stage"], "building");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("simulation compilation failed"));
}
