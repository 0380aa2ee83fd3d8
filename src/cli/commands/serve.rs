//! `serve` command: run the REST API until interrupted.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::http::SessionsHttpServer;
use crate::cli::commands::build_service;
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs, config: &Config) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let service = build_service(config).await?;

    if config.connection.restore_on_startup {
        let report = service
            .restore_sessions()
            .await
            .context("Failed to restore sessions on startup")?;
        if report.failed > 0 {
            tracing::warn!(failed = report.failed, "some sessions could not be restored");
        }
    }

    SessionsHttpServer::new(service, server_config)
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
