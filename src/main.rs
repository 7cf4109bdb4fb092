//! Ops Manager Certificate Exporter - Main Entry Point

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use cert_exporter::cli::Cli;
use cert_exporter::config::Config;
use cert_exporter::observability::{LoggingConfig, init_logging};
use cert_exporter::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_cli(Cli::parse())?;

    init_logging(&LoggingConfig::from_flags(config.debug, config.log_format))
        .context("failed to initialize logging")?;

    info!(
        opsman = %config.opsman_url,
        environment = %config.environment,
        grant = config.credential.grant_type(),
        interval_secs = config.interval.as_secs(),
        "Starting Ops Manager certificate exporter"
    );

    let app = App::from_config(&config)?;

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    app.run(listener).await?;
    Ok(())
}
