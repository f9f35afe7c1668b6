//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use observability::RequestMetrics;
use processing::ProcessorChain;
use server::{AuditHandler, AuditServer};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::setup_shutdown_signal;
use crate::cli::{Cli, RunArgs};

/// Execute the `run` command
pub async fn run_forwarder(cli: &Cli, args: &RunArgs) -> Result<()> {
    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and validate configuration
    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    crate::init_logging(cli, Some(&config.log))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        outputs = config.outputs.len(),
        annotations = config.inject_annotations.len(),
        "Auditlog forwarder starting"
    );

    let metrics_handle = observability::install_metrics_recorder()?;

    let chain = ProcessorChain::new(processing::processors_from_config(&config));
    info!(processors = ?chain.names(), "Processor chain built");

    let outputs = dispatcher::outputs_from_configs(&config.outputs)
        .context("Failed to create outputs")?;

    let requests = CancellationToken::new();
    let metrics = Arc::new(RequestMetrics::new());
    let handler = AuditHandler::new(chain, outputs, Arc::clone(&metrics))
        .context("Failed to create audit handler")?
        .with_shutdown_token(requests.clone());

    let server = AuditServer::bind(&config.server, Arc::new(handler), metrics_handle, requests)
        .await
        .context("Failed to start server")?;

    server
        .serve(setup_shutdown_signal())
        .await
        .context("Server failed")?;

    info!(requests = %metrics.snapshot(), "Auditlog forwarder finished");
    Ok(())
}
