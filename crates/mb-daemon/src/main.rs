//! mama-bear daemon: monitoring loops plus the HTTP API.

use anyhow::{Context, Result};
use mb_core::config::Config;
use mb_daemon::daemon::Daemon;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = load_config()?;
    mb_telemetry::logging::init_for_format(
        &config.general.service_name,
        &config.general.log_level,
        &config.general.log_format,
    );
    info!(version = env!("CARGO_PKG_VERSION"), "mama-bear daemon starting");

    let addr = format!("{}:{}", config.daemon.host, config.daemon.port);
    let daemon = Daemon::new(config).await?;
    daemon.start();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "API server listening");

    axum::serve(listener, daemon.router())
        .with_graceful_shutdown(ctrl_c())
        .await
        .context("API server error")?;

    let drained = daemon.stop().await;
    if !drained.is_complete() {
        warn!(?drained, "background loops did not stop cleanly");
    }
    info!("mama-bear daemon stopped");
    Ok(())
}

/// `MAMA_BEAR_CONFIG` names an explicit file; otherwise the default path.
fn load_config() -> Result<Config> {
    match std::env::var("MAMA_BEAR_CONFIG") {
        Ok(path) if !path.trim().is_empty() => Config::load_from(&path)
            .with_context(|| format!("failed to load config from {path}")),
        _ => Config::load().context("failed to load config"),
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, shutting down");
}
