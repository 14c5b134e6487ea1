//! Persisted position of the indexer.

use crate::Metrics;
use ethscribe_storage::{LedgerStore, StorageError};
use std::sync::Arc;
use tracing::warn;

/// The last fully processed block of a chain.
///
/// The cursor is the single writer of the persisted position and only ever moves forward.
#[derive(Debug)]
pub struct BlockCursor<S> {
    chain_id: u64,
    position: Option<u64>,
    ledger: Arc<S>,
}

impl<S: LedgerStore> BlockCursor<S> {
    /// Loads the persisted cursor of `chain_id`.
    pub fn load(chain_id: u64, ledger: Arc<S>) -> Result<Self, StorageError> {
        let position = ledger.cursor(chain_id)?;
        if let Some(number) = position {
            metrics::gauge!(Metrics::CURSOR_BLOCK).set(number as f64);
        }
        Ok(Self { chain_id, position, ledger })
    }

    /// Returns the chain the cursor belongs to.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Returns the last fully processed block, if any.
    pub const fn position(&self) -> Option<u64> {
        self.position
    }

    /// Returns the next block to process, never earlier than `start_block`.
    pub fn next_block(&self, start_block: u64) -> u64 {
        self.position.map_or(start_block, |position| start_block.max(position.saturating_add(1)))
    }

    /// Records `number` as fully processed.
    ///
    /// Returns `false` without writing anything if `number` does not move the cursor forward.
    pub fn advance(&mut self, number: u64) -> Result<bool, StorageError> {
        if let Some(current) = self.position.filter(|current| number <= *current) {
            warn!(target: "cursor", current, number, "Refusing to move cursor backward");
            return Ok(false);
        }

        self.ledger.set_cursor(self.chain_id, number)?;
        self.position = Some(number);
        metrics::gauge!(Metrics::CURSOR_BLOCK).set(number as f64);
        Ok(true)
    }
}
