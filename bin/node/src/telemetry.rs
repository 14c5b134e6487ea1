//! Tracing and Prometheus setup.

use anyhow::{Context as _, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Maps the `-v` count to the default log level.
pub(crate) const fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global tracing subscriber.
///
/// Directives in `RUST_LOG` take precedence over the level picked by `verbosity`.
pub(crate) fn init_tracing_subscriber(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install tracing subscriber: {err}"))
}

/// Starts a Prometheus metrics server and returns the address it is bound to.
pub(crate) fn init_prometheus_server(addr: IpAddr, port: u16) -> Result<SocketAddr> {
    // Port 0 is resolved up front so the actual address can be reported.
    let socket = if port == 0 {
        TcpListener::bind((addr, 0))
            .and_then(|listener| listener.local_addr())
            .context("Failed to pick a port for the metrics server")?
    } else {
        SocketAddr::from((addr, port))
    };

    PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(target: "prometheus", "Serving metrics at: http://{socket}");
    Ok(socket)
}
