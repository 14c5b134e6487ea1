//! Indexer configuration flags.

use alloy_primitives::Address;
use clap::Args;
use ethscribe_indexer::{IndexerConfig, RetryPolicy};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// The ledger file name inside the data directory.
pub(crate) const LEDGER_FILE_NAME: &str = "ledger.sqlite";

/// Indexer configuration arguments.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexerArgs {
    /// URL of the Ethereum execution client RPC API.
    #[arg(long, env = "ETHSCRIBE_RPC_URL")]
    pub(crate) rpc_url: Url,

    /// The chain ID. Keys the persisted cursor.
    #[arg(long, env = "ETHSCRIBE_CHAIN_ID", default_value_t = 1)]
    pub(crate) chain_id: u64,

    /// Directory to store the ledger in.
    #[arg(long, env = "ETHSCRIBE_DATADIR", default_value = "./data")]
    pub(crate) datadir: PathBuf,

    /// The first block to index when the ledger has no cursor yet.
    #[arg(long, env = "ETHSCRIBE_START_BLOCK", default_value_t = 0)]
    pub(crate) start_block: u64,

    /// How many blocks live indexing stays behind the chain head.
    #[arg(long, env = "ETHSCRIBE_CONFIRMATION_LAG", default_value_t = 16)]
    pub(crate) confirmation_lag: u64,

    /// How many blocks backfill processes before fetching the head again.
    #[arg(long, env = "ETHSCRIBE_HEAD_REFRESH_INTERVAL", default_value_t = 100)]
    pub(crate) head_refresh_interval: u64,

    /// Address of the marketplace contract. Marketplace events are ignored when unset.
    #[arg(long, env = "ETHSCRIBE_MARKETPLACE_ADDRESS")]
    pub(crate) marketplace_address: Option<Address>,

    /// Delay between two attempts of a failed unit of work, in milliseconds.
    #[arg(long, env = "ETHSCRIBE_RETRY_DELAY_MS", default_value_t = 1000)]
    pub(crate) retry_delay_ms: u64,

    /// Maximum number of retries of a failed unit of work. Unbounded when unset.
    #[arg(long, env = "ETHSCRIBE_MAX_RETRIES")]
    pub(crate) max_retries: Option<usize>,

    /// Interval between two chain head polls, in seconds.
    #[arg(long, env = "ETHSCRIBE_POLL_INTERVAL_SECS", default_value_t = 12)]
    pub(crate) poll_interval_secs: u64,
}

impl IndexerArgs {
    /// Returns the path of the ledger database.
    pub(crate) fn ledger_path(&self) -> PathBuf {
        self.datadir.join(LEDGER_FILE_NAME)
    }

    /// Returns the interval between two head polls.
    pub(crate) const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Builds the [`IndexerConfig`] described by the flags.
    pub(crate) const fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chain_id: self.chain_id,
            start_block: self.start_block,
            confirmation_lag: self.confirmation_lag,
            head_refresh_interval: self.head_refresh_interval,
            marketplace_address: self.marketplace_address,
            retry: RetryPolicy::new(Duration::from_millis(self.retry_delay_ms), self.max_retries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use clap::Parser;
    use rstest::rstest;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        indexer: IndexerArgs,
    }

    fn parse(args: &[&str]) -> IndexerArgs {
        let base = ["ethscribe", "--rpc-url", "http://localhost:8545"];
        TestCli::try_parse_from(base.iter().chain(args)).unwrap().indexer
    }

    #[test]
    fn test_defaults_match_indexer_config() {
        let args = parse(&[]);
        assert_eq!(args.indexer_config(), IndexerConfig::default());
        assert_eq!(args.poll_interval(), Duration::from_secs(12));
        assert_eq!(args.ledger_path(), PathBuf::from("./data/ledger.sqlite"));
    }

    #[test]
    fn test_rpc_url_is_required() {
        assert!(TestCli::try_parse_from(["ethscribe"]).is_err());
    }

    #[test]
    fn test_full_config() {
        let args = parse(&[
            "--chain-id",
            "11155111",
            "--datadir",
            "/var/lib/ethscribe",
            "--start-block",
            "17478950",
            "--confirmation-lag",
            "0",
            "--head-refresh-interval",
            "10",
            "--marketplace-address",
            "0xd729a94d6366a4feac4a6869c8b3573cee4701a9",
            "--retry-delay-ms",
            "250",
            "--max-retries",
            "5",
            "--poll-interval-secs",
            "3",
        ]);

        let config = args.indexer_config();
        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.start_block, 17478950);
        assert_eq!(config.confirmation_lag, 0);
        assert_eq!(config.head_refresh_interval, 10);
        assert_eq!(
            config.marketplace_address,
            Some(address!("d729a94d6366a4feac4a6869c8b3573cee4701a9"))
        );
        assert_eq!(config.retry, RetryPolicy::new(Duration::from_millis(250), Some(5)));
        assert_eq!(args.poll_interval(), Duration::from_secs(3));
        assert_eq!(args.ledger_path(), PathBuf::from("/var/lib/ethscribe/ledger.sqlite"));
    }

    #[rstest]
    #[case::bad_url(&["ethscribe", "--rpc-url", "not a url"])]
    #[case::bad_address(&[
        "ethscribe",
        "--rpc-url",
        "http://localhost:8545",
        "--marketplace-address",
        "0x1234",
    ])]
    #[case::negative_block(&[
        "ethscribe",
        "--rpc-url",
        "http://localhost:8545",
        "--start-block",
        "-1",
    ])]
    fn test_invalid_values_rejected(#[case] args: &[&str]) {
        assert!(TestCli::try_parse_from(args).is_err());
    }
}
