//! Metrics for the indexing pipeline.

/// Container for the indexer's metric names.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Identifier for the counter of fully processed blocks.
    pub const BLOCKS_PROCESSED_TOTAL: &'static str = "ethscribe_blocks_processed_total";
    /// Identifier for the counter of non-empty transactions handed to the classifier.
    pub const TRANSACTIONS_PROCESSED_TOTAL: &'static str = "ethscribe_transactions_processed_total";
    /// Identifier for the counter of actions that mutated the ledger.
    pub const ACTIONS_APPLIED_TOTAL: &'static str = "ethscribe_actions_applied_total";
    /// Identifier for the counter of actions whose preconditions failed.
    pub const ACTIONS_SKIPPED_TOTAL: &'static str = "ethscribe_actions_skipped_total";
    /// Identifier for the counter of retried units of work.
    pub const RETRIES_TOTAL: &'static str = "ethscribe_retries_total";
    /// Identifier for the gauge holding the last fully processed block.
    pub const CURSOR_BLOCK: &'static str = "ethscribe_cursor_block";
    /// Identifier for the histogram of block processing latency.
    pub const BLOCK_DURATION_SECONDS: &'static str = "ethscribe_block_duration_seconds";

    /// Action kinds used as the `kind` label.
    pub const ACTION_KINDS: [&'static str; 4] =
        ["creation", "transfer", "contract_transfer", "marketplace"];

    /// Initializes metrics for the indexer.
    ///
    /// This does two things:
    /// * Describes various metrics.
    /// * Initializes metrics to 0 so they can be queried immediately.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::BLOCKS_PROCESSED_TOTAL,
            metrics::Unit::Count,
            "Total number of blocks fully applied to the ledger",
        );
        metrics::describe_counter!(
            Self::TRANSACTIONS_PROCESSED_TOTAL,
            metrics::Unit::Count,
            "Total number of non-empty transactions classified",
        );
        metrics::describe_counter!(
            Self::ACTIONS_APPLIED_TOTAL,
            metrics::Unit::Count,
            "Total number of actions applied to the ledger, by kind",
        );
        metrics::describe_counter!(
            Self::ACTIONS_SKIPPED_TOTAL,
            metrics::Unit::Count,
            "Total number of actions skipped on a failed precondition, by kind",
        );
        metrics::describe_counter!(
            Self::RETRIES_TOTAL,
            metrics::Unit::Count,
            "Total number of retries after a transient failure",
        );
        metrics::describe_gauge!(Self::CURSOR_BLOCK, "Last fully processed block number");
        metrics::describe_histogram!(
            Self::BLOCK_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Latency for processing a single block",
        );
    }

    fn zero() {
        metrics::counter!(Self::BLOCKS_PROCESSED_TOTAL).increment(0);
        metrics::counter!(Self::TRANSACTIONS_PROCESSED_TOTAL).increment(0);
        metrics::counter!(Self::RETRIES_TOTAL).increment(0);
        for kind in Self::ACTION_KINDS {
            metrics::counter!(Self::ACTIONS_APPLIED_TOTAL, "kind" => kind).increment(0);
            metrics::counter!(Self::ACTIONS_SKIPPED_TOTAL, "kind" => kind).increment(0);
        }
        metrics::gauge!(Self::CURSOR_BLOCK).set(0.0);
    }
}
