//! The chain client interface the pipeline reads blocks and receipts through.

use crate::ChainClientError;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use ethscribe_protocol::{ReceiptLog, TransactionContext};
use futures::stream::BoxStream;
use std::fmt::Debug;

/// A block together with the fields of its transactions the indexer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainBlock {
    /// The block number.
    pub number: u64,
    /// The block timestamp, in seconds.
    pub timestamp: u64,
    /// The transactions, in whatever order the node returned them.
    pub transactions: Vec<ChainTransaction>,
}

/// A transaction as returned by the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainTransaction {
    /// The transaction hash.
    pub hash: B256,
    /// The position within the block.
    pub index: u64,
    /// The sender.
    pub from: Address,
    /// The recipient, `None` for contract creations.
    pub to: Option<Address>,
    /// The calldata.
    pub input: Bytes,
    /// The native value.
    pub value: U256,
}

impl ChainTransaction {
    /// Builds the [`TransactionContext`] for this transaction within the given block.
    pub fn into_context(
        self,
        chain_id: u64,
        block_number: u64,
        block_timestamp: u64,
    ) -> TransactionContext {
        TransactionContext {
            chain_id,
            block_number,
            block_timestamp,
            hash: self.hash,
            index: self.index,
            from: self.from,
            to: self.to,
            input: self.input,
            value: self.value,
        }
    }
}

/// Read access to the chain being indexed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Debug + Send + Sync {
    /// Returns the number of the latest block known to the node.
    async fn head_number(&self) -> Result<u64, ChainClientError>;

    /// Fetches a block with its full transactions.
    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError>;

    /// Fetches the receipt logs of a transaction.
    async fn transaction_logs(&self, tx_hash: B256) -> Result<Vec<ReceiptLog>, ChainClientError>;

    /// Returns a stream of new head block numbers.
    fn watch_heads(&self) -> BoxStream<'static, u64>;
}
