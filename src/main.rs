//! Main entry point for the zip-streamer FastCGI service.
//!
//! Loads configuration, binds the FastCGI listener, runs the worker pool
//! and returns once every worker has stopped after SIGTERM or Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use zip_streamer::{Cli, Config, FcgiGateway, HttpTransport, MagicSniffer, Shutdown, WorkerPool};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address,
        workers = config.workers,
        read_wait_secs = config.read_wait_secs,
        "zip-streamer starting"
    );

    let gateway = FcgiGateway::bind(config.bind_address.as_str(), config.request_read_timeout())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(address = %gateway.local_addr()?, "listening for FastCGI connections");

    let connect_timeout = config.connect_timeout();
    let pool = WorkerPool::build(
        config.workers,
        config.read_wait(),
        || HttpTransport::new(connect_timeout),
        MagicSniffer::new,
    )
    .context("failed to build HTTP client")?;

    let shutdown = Shutdown::new();
    let signals = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signals.listen_for_signals().await {
            error!(error = %e, "cannot listen for signals");
        }
    });

    let handled = pool.run(gateway, shutdown.token()).await;
    info!(handled, "zip-streamer stopped");
    Ok(())
}
