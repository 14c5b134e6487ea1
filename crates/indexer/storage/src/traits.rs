//! Read and write interfaces of the ledger.

use crate::StorageError;
use alloy_primitives::{Address, B256};
use ethscribe_protocol::{Bid, Ethscription, EventId, LedgerEvent, Listing};
use std::fmt::Debug;

/// Provides read access to the ledger.
///
/// Implementations are expected to provide thread-safe access; readers may run concurrently
/// with the indexing pipeline.
pub trait LedgerReader: Debug + Send + Sync {
    /// Gets an [`Ethscription`] by the hash of its creating transaction.
    ///
    /// # Returns
    /// * `Ok(Some(Ethscription))` if it exists.
    /// * `Ok(None)` if no ethscription was created by that transaction.
    /// * `Err(StorageError)` if the lookup failed.
    fn ethscription_by_hash_id(&self, hash_id: B256) -> Result<Option<Ethscription>, StorageError>;

    /// Gets the [`Ethscription`] that claimed the given content digest, if any.
    fn ethscription_by_sha(&self, sha: B256) -> Result<Option<Ethscription>, StorageError>;

    /// Gets the active [`Listing`] for an ethscription.
    fn listing(&self, hash_id: B256) -> Result<Option<Listing>, StorageError>;

    /// Gets the active [`Bid`] for an ethscription.
    fn bid(&self, hash_id: B256) -> Result<Option<Bid>, StorageError>;

    /// Gets a single [`LedgerEvent`] by id.
    fn event(&self, id: EventId) -> Result<Option<LedgerEvent>, StorageError>;

    /// Gets every [`LedgerEvent`] recorded for an ethscription, in chain order.
    fn events_for(&self, hash_id: B256) -> Result<Vec<LedgerEvent>, StorageError>;

    /// Gets the last fully processed block for a chain.
    ///
    /// # Returns
    /// * `Ok(None)` if the chain was never indexed.
    fn cursor(&self, chain_id: u64) -> Result<Option<u64>, StorageError>;
}

/// Provides write access to the ledger.
///
/// Every write is atomic on its own key. Callers are expected to order writes so that replaying
/// a partially applied action converges to the fully applied state.
pub trait LedgerWriter: Debug + Send + Sync {
    /// Inserts a new [`Ethscription`].
    ///
    /// # Returns
    /// * `Ok(())` if the ethscription was inserted.
    /// * `Err(StorageError::ConflictError)` if its hash id or content digest is already present.
    fn insert_ethscription(&self, ethscription: &Ethscription) -> Result<(), StorageError>;

    /// Sets the owner and previous owner of an ethscription.
    fn update_owner(
        &self,
        hash_id: B256,
        owner: Address,
        prev_owner: Address,
    ) -> Result<(), StorageError>;

    /// Creates or replaces the [`Listing`] of an ethscription.
    fn upsert_listing(&self, listing: &Listing) -> Result<(), StorageError>;

    /// Removes the listing of an ethscription. Removing a missing listing is not an error.
    fn delete_listing(&self, hash_id: B256) -> Result<(), StorageError>;

    /// Creates or replaces the [`Bid`] on an ethscription.
    fn upsert_bid(&self, bid: &Bid) -> Result<(), StorageError>;

    /// Removes the bid on an ethscription. Removing a missing bid is not an error.
    fn delete_bid(&self, hash_id: B256) -> Result<(), StorageError>;

    /// Appends a [`LedgerEvent`], ignoring it if an event with the same id exists.
    ///
    /// # Returns
    /// * `Ok(true)` if the event was inserted.
    /// * `Ok(false)` if it was already present.
    fn append_event(&self, event: &LedgerEvent) -> Result<bool, StorageError>;

    /// Persists the last fully processed block for a chain.
    fn set_cursor(&self, chain_id: u64, block_number: u64) -> Result<(), StorageError>;
}

/// Combines [`LedgerReader`] and [`LedgerWriter`].
pub trait LedgerStore: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter> LedgerStore for T {}
