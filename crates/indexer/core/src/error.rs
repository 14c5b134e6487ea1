//! Error types for the indexing pipeline.

use alloy_primitives::B256;
use ethscribe_storage::StorageError;
use thiserror::Error;

/// Errors returned by a [`crate::ChainClient`].
#[derive(Error, Debug)]
pub enum ChainClientError {
    /// The RPC request failed or timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node does not know the requested block yet.
    #[error("Block {0} not found")]
    BlockNotFound(u64),

    /// The node returned no receipt for the transaction.
    #[error("Receipt for transaction {0} not found")]
    ReceiptNotFound(B256),

    /// The node returned data that cannot be interpreted.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ChainClientError {
    /// Returns `true` if retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }
}

/// Error type for the indexing pipeline.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Failed to fetch data from the chain.
    #[error(transparent)]
    Chain(#[from] ChainClientError),

    /// Failed to read from or write to the ledger.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The new head subscription ended.
    #[error("New head stream closed")]
    HeadStreamClosed,
}

impl IndexerError {
    /// Returns `true` if the failed unit of work should be retried in place.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Chain(err) => err.is_transient(),
            Self::Storage(err) => err.is_transient(),
            Self::HeadStreamClosed => false,
        }
    }
}
