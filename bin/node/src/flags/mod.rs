//! CLI flags.

mod indexer;
pub(crate) use indexer::IndexerArgs;

mod metrics;
pub(crate) use metrics::MetricsArgs;
