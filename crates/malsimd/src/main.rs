use anyhow::{Context, Result};
use clap::Parser;
use malsim_core::{init_tracing, SimulationService};
use malsimd::{router, AppState, Cli};
use tokio::net::TcpListener;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let bind = cli.bind;
    let config = cli.into_config();
    info!(
        template = %config.template_path.display(),
        work_root = %config.work_root.display(),
        compiler = %config.compiler.program,
        "starting malsimd"
    );

    let app = router(AppState::new(SimulationService::native(config)));

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("malsimd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
