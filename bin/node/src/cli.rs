//! Contains the node CLI.

use crate::{
    flags::{IndexerArgs, MetricsArgs},
    telemetry,
};
use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser};
use ethscribe_indexer::{Metrics, Scheduler};
use ethscribe_providers_alloy::AlloyChainClient;
use ethscribe_storage::SqliteLedger;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Indexes ethscriptions and their marketplace from an Ethereum JSON-RPC endpoint.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbosity level (0-2). `RUST_LOG` takes precedence.
    #[arg(long, short, action = ArgAction::Count)]
    pub(crate) v: u8,
    /// Indexer arguments.
    #[command(flatten)]
    pub(crate) indexer: IndexerArgs,
    /// Prometheus arguments.
    #[command(flatten)]
    pub(crate) metrics: MetricsArgs,
}

impl Cli {
    /// Runs the CLI.
    pub(crate) fn run(self) -> Result<()> {
        self.init_stack()?;
        Self::run_until_ctrl_c(|cancellation| self.start(cancellation))
    }

    /// Initializes tracing and, when enabled, the Prometheus exporter.
    fn init_stack(&self) -> Result<()> {
        telemetry::init_tracing_subscriber(self.v)?;

        if self.metrics.enabled {
            telemetry::init_prometheus_server(self.metrics.addr, self.metrics.port)?;
            Metrics::init();
        }
        Ok(())
    }

    /// Opens the ledger, connects to the node and indexes until cancelled.
    async fn start(self, cancellation: CancellationToken) -> Result<()> {
        let args = self.indexer;

        std::fs::create_dir_all(&args.datadir).with_context(|| {
            format!("Failed to create data directory '{}'", args.datadir.display())
        })?;
        let ledger_path = args.ledger_path();
        let ledger = SqliteLedger::open(&ledger_path)
            .with_context(|| format!("Failed to open ledger '{}'", ledger_path.display()))?;

        let client = AlloyChainClient::new_http(args.rpc_url.clone(), args.poll_interval());
        let config = args.indexer_config();
        info!(
            target: "ethscribe",
            chain_id = config.chain_id,
            rpc_url = %args.rpc_url,
            ledger = %ledger_path.display(),
            "Starting ethscribe"
        );

        let scheduler =
            Scheduler::new(config, Arc::new(client), Arc::new(ledger), cancellation)
                .context("Failed to load the block cursor")?;
        scheduler.run().await.context("Indexer stopped")
    }

    /// Runs the future produced by `start` until it returns or ctrl-c is pressed.
    ///
    /// Ctrl-c cancels the token handed to `start`, which lets the block in flight complete.
    fn run_until_ctrl_c<F, Fut>(start: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime().context("Failed to build tokio runtime")?;
        let cancellation = CancellationToken::new();

        let signal = cancellation.clone();
        rt.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!(target: "ethscribe", "Received ctrl-c, shutting down"),
                Err(err) => error!(target: "ethscribe", ?err, "Failed to listen for ctrl-c"),
            }
            signal.cancel();
        });

        rt.block_on(start(cancellation))
    }

    /// Creates a new default tokio multi-thread [Runtime](tokio::runtime::Runtime) with all
    /// features enabled.
    fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["ethscribe", "-vv", "--rpc-url", "http://localhost:8545"])
            .unwrap();
        assert_eq!(cli.v, 2);
        assert!(!cli.metrics.enabled);
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_unwritable_datadir_fails_startup() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let cli = Cli::try_parse_from([
            "ethscribe",
            "--rpc-url",
            "http://127.0.0.1:1",
            "--datadir",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let err = cli.start(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to create data directory"));
    }
}
