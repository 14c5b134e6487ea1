//! Ledger storage for the ethscriptions indexer.
//!
//! The ledger holds ethscriptions (by hash id and by content digest), ownership, marketplace
//! listings and bids, the append-only event log and the per-chain block cursor.
//!
//! - [`LedgerReader`] / [`LedgerWriter`]: the storage contract the indexer depends on.
//! - [`SqliteLedger`]: the SQLite implementation.
//! - [`StorageError`]: errors shared by all implementations.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::StorageError;

mod traits;
pub use traits::{LedgerReader, LedgerStore, LedgerWriter};

mod ledger;
pub use ledger::SqliteLedger;
