//! Serve command - run the chart repository over HTTP

use chartstreams_repo::StreamConfig;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::open_provider;
use crate::error::{CliError, Result};
use crate::server::{self, CHART_ROUTE_PREFIX};

pub async fn run(
    mut config: StreamConfig,
    listen_addr: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(addr) = listen_addr {
        config.listen_addr = addr;
    }
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            return Err(CliError::usage_with_help(
                "--timeout-secs must be greater than zero",
                "materializing a chart needs at least one checkout",
            ));
        }
        config.materialize_timeout = Duration::from_secs(secs);
    }
    config.url_prefix = CHART_ROUTE_PREFIX.to_string();

    let addr = config.listen_addr.clone();
    let provider = open_provider(config).await?;

    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;

    eprintln!(
        "{} charts on http://{}/index.yaml",
        style("Serving").green().bold(),
        local
    );
    info!(addr = %local, "listening");

    axum::serve(listener, server::router(Arc::new(provider)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
