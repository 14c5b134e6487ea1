//! Decides which blocks to index and drives the [`BlockProcessor`] over them.

use crate::{BlockCursor, BlockProcessor, BlockSummary, ChainClient, IndexerError, RetryPolicy};
use alloy_primitives::Address;
use ethscribe_storage::LedgerStore;
use futures::{StreamExt, future};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration of the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// The chain being indexed. Keys the persisted cursor.
    pub chain_id: u64,
    /// The first block to index on a fresh ledger.
    pub start_block: u64,
    /// How many blocks live indexing stays behind the head.
    pub confirmation_lag: u64,
    /// How many blocks backfill processes between two head refreshes.
    pub head_refresh_interval: u64,
    /// The marketplace contract, if its events should be indexed.
    pub marketplace_address: Option<Address>,
    /// The retry policy applied to every unit of work.
    pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            start_block: 0,
            confirmation_lag: 16,
            head_refresh_interval: 100,
            marketplace_address: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs historical backfill, then follows the chain head.
///
/// Both phases run sequentially in the same task and share one [`BlockCursor`]. Cancellation is
/// only observed between blocks; a block that started processing always completes.
#[derive(Debug)]
pub struct Scheduler<C, S> {
    config: IndexerConfig,
    client: Arc<C>,
    processor: BlockProcessor<C, S>,
    cursor: BlockCursor<S>,
    cancellation: CancellationToken,
}

impl<C, S> Scheduler<C, S>
where
    C: ChainClient,
    S: LedgerStore,
{
    /// Creates a new [`Scheduler`], loading the persisted cursor of the configured chain.
    pub fn new(
        config: IndexerConfig,
        client: Arc<C>,
        ledger: Arc<S>,
        cancellation: CancellationToken,
    ) -> Result<Self, IndexerError> {
        let cursor = BlockCursor::load(config.chain_id, Arc::clone(&ledger))?;
        let processor = BlockProcessor::new(
            config.chain_id,
            Arc::clone(&client),
            ledger,
            config.marketplace_address,
            config.retry,
        );
        Ok(Self { config, client, processor, cursor, cancellation })
    }

    /// Returns the block cursor.
    pub const fn cursor(&self) -> &BlockCursor<S> {
        &self.cursor
    }

    /// Indexes until cancelled or until a fatal error occurs.
    pub async fn run(mut self) -> Result<(), IndexerError> {
        info!(
            target: "scheduler",
            chain_id = self.config.chain_id,
            cursor = ?self.cursor.position(),
            start_block = self.config.start_block,
            "Starting indexer"
        );

        self.backfill().await?;
        if self.cancellation.is_cancelled() {
            info!(target: "scheduler", "Indexer cancelled during backfill");
            return Ok(());
        }
        self.follow().await
    }

    /// Processes every block from the cursor up to, but excluding, the chain head.
    ///
    /// The head is refreshed every `head_refresh_interval` blocks and once more when the range is
    /// exhausted. Returns the number of processed blocks.
    pub async fn backfill(&mut self) -> Result<u64, IndexerError> {
        let refresh_interval = self.config.head_refresh_interval.max(1);
        let mut next = self.cursor.next_block(self.config.start_block);
        let mut head = self.head().await?;
        let mut processed = 0;

        info!(target: "scheduler", from = next, head, "Starting backfill");
        loop {
            while next < head {
                if self.cancellation.is_cancelled() {
                    return Ok(processed);
                }
                self.process(next).await?;
                next += 1;
                processed += 1;

                if processed % refresh_interval == 0 {
                    head = self.head().await?;
                    debug!(target: "scheduler", head, next, "Refreshed head");
                }
            }

            let latest = self.head().await?;
            if next >= latest {
                break;
            }
            head = latest;
        }

        info!(
            target: "scheduler",
            processed,
            cursor = ?self.cursor.position(),
            "Backfill complete"
        );
        Ok(processed)
    }

    /// Follows new heads, processing every block up to `head - confirmation_lag`.
    ///
    /// Returns `Ok(())` when cancelled and [`IndexerError::HeadStreamClosed`] if the head stream
    /// ends.
    pub async fn follow(&mut self) -> Result<(), IndexerError> {
        let mut heads = self.client.watch_heads();
        let cancellation = self.cancellation.clone();

        info!(
            target: "scheduler",
            confirmation_lag = self.config.confirmation_lag,
            "Following chain head"
        );
        loop {
            let head = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!(target: "scheduler", "Indexer cancelled");
                    return Ok(());
                }
                head = heads.next() => head.ok_or(IndexerError::HeadStreamClosed)?,
            };

            let target = head.saturating_sub(self.config.confirmation_lag);
            let mut next = self.cursor.next_block(self.config.start_block);
            debug!(target: "scheduler", head, target, next, "New head");

            while next <= target {
                if cancellation.is_cancelled() {
                    return Ok(());
                }
                self.process(next).await?;
                next += 1;
            }
        }
    }

    async fn head(&self) -> Result<u64, IndexerError> {
        let client = &self.client;
        self.config
            .retry
            .retry("fetch_head", || async move {
                client.head_number().await.map_err(IndexerError::from)
            })
            .await
    }

    async fn process(&mut self, number: u64) -> Result<BlockSummary, IndexerError> {
        let summary = self.processor.process_block(number).await?;

        let cursor = &mut self.cursor;
        self.config
            .retry
            .retry("advance_cursor", || {
                future::ready(cursor.advance(number).map_err(IndexerError::from))
            })
            .await?;
        Ok(summary)
    }
}
