//! Command-line and environment configuration of the daemon.

use clap::Parser;
use malsim_core::config::DEFAULT_TEMPLATE_PATH;
use malsim_core::{CompilerConfig, RequestLimits, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "malsimd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run malaria simulations on demand over HTTP", long_about = None)]
pub struct Cli {
    /// TCP address to bind the web server
    #[arg(long, env = "MALSIM_BIND", default_value = "0.0.0.0:3001")]
    pub bind: SocketAddr,

    /// Simulation template to parameterize. Defaults to the copy in the
    /// malsim-core source tree; deployed binaries should point this at an
    /// installed template.
    #[arg(long, env = "MALSIM_TEMPLATE", default_value = DEFAULT_TEMPLATE_PATH)]
    pub template: PathBuf,

    /// Parent directory of per-request workspaces (default: system temp dir)
    #[arg(long, env = "MALSIM_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// C compiler used to build the simulator
    #[arg(long, env = "MALSIM_COMPILER", default_value = "gcc")]
    pub compiler: String,

    /// Compiler arguments placed before the source path (comma separated)
    #[arg(
        long,
        env = "MALSIM_COMPILER_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub compiler_args: Vec<String>,

    /// Arguments placed after the output path, usually libraries (comma separated)
    #[arg(
        long,
        env = "MALSIM_LINK_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "-lm"
    )]
    pub link_args: Vec<String>,

    /// Compilation ceiling in milliseconds
    #[arg(long, env = "MALSIM_BUILD_TIMEOUT_MS", default_value_t = 30_000)]
    pub build_timeout_ms: u64,

    /// Simulation run ceiling in milliseconds
    #[arg(long, env = "MALSIM_RUN_TIMEOUT_MS", default_value_t = 60_000)]
    pub run_timeout_ms: u64,

    /// Whole-request deadline in milliseconds
    #[arg(long, env = "MALSIM_REQUEST_TIMEOUT_MS", default_value_t = 120_000)]
    pub request_timeout_ms: u64,

    /// Bytes of compiler/simulator output kept for error messages
    #[arg(long, env = "MALSIM_MAX_DIAGNOSTIC_BYTES", default_value_t = 8 * 1024)]
    pub max_diagnostic_bytes: usize,

    /// Simulations allowed to build or run at once
    #[arg(long, env = "MALSIM_MAX_CONCURRENT_RUNS", default_value_t = 4)]
    pub max_concurrent_runs: usize,

    /// Scale biting and mosquito mortality rates with temperature
    #[arg(long, env = "MALSIM_ADJUST_RATES_FOR_TEMPERATURE")]
    pub adjust_rates_for_temperature: bool,

    /// Largest accepted human population
    #[arg(long, env = "MALSIM_MAX_HUMANS", default_value_t = 1_000_000)]
    pub max_humans: u64,

    /// Largest accepted mosquito population
    #[arg(long, env = "MALSIM_MAX_MOSQUITOES", default_value_t = 1_000_000)]
    pub max_mosquitoes: u64,

    /// Largest accepted house count
    #[arg(long, env = "MALSIM_MAX_HOUSES", default_value_t = 10_000)]
    pub max_houses: u64,

    /// Largest accepted day count
    #[arg(long, env = "MALSIM_MAX_DAYS", default_value_t = 3_650)]
    pub max_days: u64,

    /// Lowest accepted temperature in degrees Celsius
    #[arg(
        long,
        env = "MALSIM_MIN_TEMPERATURE",
        default_value_t = -50.0,
        allow_negative_numbers = true
    )]
    pub min_temperature: f64,

    /// Highest accepted temperature in degrees Celsius
    #[arg(
        long,
        env = "MALSIM_MAX_TEMPERATURE",
        default_value_t = 60.0,
        allow_negative_numbers = true
    )]
    pub max_temperature: f64,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "MALSIM_LOG_JSON")]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            template_path: self.template,
            work_root: self.work_dir.unwrap_or(defaults.work_root),
            compiler: CompilerConfig {
                program: self.compiler,
                args: self.compiler_args,
                link_args: self.link_args,
            },
            build_timeout_ms: self.build_timeout_ms,
            run_timeout_ms: self.run_timeout_ms,
            request_timeout_ms: self.request_timeout_ms,
            max_diagnostic_bytes: self.max_diagnostic_bytes,
            max_concurrent_runs: self.max_concurrent_runs,
            adjust_rates_for_temperature: self.adjust_rates_for_temperature,
            limits: RequestLimits {
                max_humans: self.max_humans,
                max_mosquitoes: self.max_mosquitoes,
                max_houses: self.max_houses,
                max_days: self.max_days,
                min_temperature: self.min_temperature,
                max_temperature: self.max_temperature,
            },
        }
    }
}
