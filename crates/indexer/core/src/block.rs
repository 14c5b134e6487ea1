//! Processes one block, transaction by transaction.

use crate::{
    ActionProcessor, ActionReport, ChainBlock, ChainClient, IndexerError, Metrics, RetryPolicy,
    TransactionClassifier,
};
use alloy_primitives::Address;
use ethscribe_protocol::TransactionContext;
use ethscribe_storage::LedgerStore;
use std::{sync::Arc, time::Instant};
use tracing::debug;

/// What happened while processing a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSummary {
    /// The block number.
    pub number: u64,
    /// The number of non-empty transactions.
    pub transactions: usize,
    /// The number of actions that updated the ledger.
    pub applied: usize,
    /// The number of actions skipped on a failed precondition.
    pub skipped: usize,
}

/// Applies every transaction of a block to the ledger, in transaction index order.
///
/// Each transaction is classified and applied as one unit under the [`RetryPolicy`]. A transient
/// failure retries the same transaction, so no transaction is ever skipped.
#[derive(Debug)]
pub struct BlockProcessor<C, S> {
    chain_id: u64,
    client: Arc<C>,
    classifier: TransactionClassifier<C, S>,
    actions: ActionProcessor<S>,
    retry: RetryPolicy,
}

impl<C, S> BlockProcessor<C, S>
where
    C: ChainClient,
    S: LedgerStore,
{
    /// Creates a new [`BlockProcessor`].
    pub fn new(
        chain_id: u64,
        client: Arc<C>,
        ledger: Arc<S>,
        marketplace: Option<Address>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain_id,
            classifier: TransactionClassifier::new(
                Arc::clone(&client),
                Arc::clone(&ledger),
                marketplace,
            ),
            actions: ActionProcessor::new(ledger),
            client,
            retry,
        }
    }

    /// Fetches block `number` and applies all of its transactions.
    pub async fn process_block(&self, number: u64) -> Result<BlockSummary, IndexerError> {
        let started = Instant::now();
        let client = &self.client;
        let block: ChainBlock = self
            .retry
            .retry("fetch_block", || async move {
                client.block_with_transactions(number).await.map_err(IndexerError::from)
            })
            .await?;

        let mut transactions: Vec<_> =
            block.transactions.into_iter().filter(|tx| !tx.input.is_empty()).collect();
        transactions.sort_by_key(|tx| tx.index);

        let mut summary = BlockSummary {
            number: block.number,
            transactions: transactions.len(),
            ..Default::default()
        };

        for tx in transactions {
            let tx = tx.into_context(self.chain_id, block.number, block.timestamp);
            let reports =
                self.retry.retry("process_transaction", || self.process_transaction(&tx)).await?;
            for report in reports {
                if report.outcome.is_applied() {
                    summary.applied += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }

        metrics::counter!(Metrics::BLOCKS_PROCESSED_TOTAL).increment(1);
        metrics::counter!(Metrics::TRANSACTIONS_PROCESSED_TOTAL)
            .increment(summary.transactions as u64);
        metrics::histogram!(Metrics::BLOCK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        debug!(
            target: "block_processor",
            block = number,
            transactions = summary.transactions,
            applied = summary.applied,
            skipped = summary.skipped,
            "Processed block"
        );
        Ok(summary)
    }

    /// Classifies a single transaction and applies the resulting actions.
    pub async fn process_transaction(
        &self,
        tx: &TransactionContext,
    ) -> Result<Vec<ActionReport>, IndexerError> {
        let action = self.classifier.classify(tx).await?;
        self.actions.process(tx, action)
    }
}
