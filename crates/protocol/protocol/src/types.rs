//! Domain types shared between the indexer pipeline and the ledger.

use alloy_primitives::{Address, B256, Bytes, Log, U256};
use core::{fmt, str::FromStr};

/// Immutable per-transaction record passed through the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    /// The chain the transaction was included on.
    pub chain_id: u64,
    /// The number of the including block.
    pub block_number: u64,
    /// The timestamp of the including block, in seconds.
    pub block_timestamp: u64,
    /// The transaction hash.
    pub hash: B256,
    /// The position of the transaction within its block.
    pub index: u64,
    /// The sender.
    pub from: Address,
    /// The recipient. `None` for contract creations.
    pub to: Option<Address>,
    /// The raw calldata.
    pub input: Bytes,
    /// The native value carried by the transaction, in wei.
    pub value: U256,
}

impl TransactionContext {
    /// Builds the [`EventId`] for the given log index within this transaction.
    pub const fn event_id(&self, log_index: u64) -> EventId {
        EventId { tx_hash: self.hash, log_index }
    }
}

/// A log taken from a transaction receipt, together with its block-level index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    /// The log itself.
    pub inner: Log,
    /// The index of the log within the block.
    pub log_index: u64,
}

impl ReceiptLog {
    /// Returns the address of the contract that emitted the log.
    pub const fn address(&self) -> Address {
        self.inner.address
    }

    /// Returns the log topics.
    pub fn topics(&self) -> &[B256] {
        self.inner.data.topics()
    }

    /// Returns the first topic, the event signature for non-anonymous events.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics().first()
    }
}

/// A unique content inscription.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Ethscription {
    /// The hash of the creating transaction.
    pub hash_id: B256,
    /// SHA-256 digest of the cleaned payload.
    pub sha: B256,
    /// The sender of the creating transaction.
    pub creator: Address,
    /// The current owner.
    pub owner: Address,
    /// The owner before the last accepted transfer.
    pub prev_owner: Option<Address>,
    /// The timestamp of the creating block.
    pub created_at: u64,
    /// The number of the creating block.
    pub block_number: u64,
    /// The cleaned payload.
    pub content: String,
}

/// An active sale offer for an ethscription on the marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Listing {
    /// The listed ethscription.
    pub hash_id: B256,
    /// The minimum accepted sale value, in wei.
    pub min_value: U256,
    /// The account that created the listing.
    pub listed_by: Address,
    /// When set, only this account may buy.
    pub to_address: Option<Address>,
    /// The transaction that created the listing.
    pub tx_hash: B256,
}

/// An active bid for an ethscription on the marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Bid {
    /// The ethscription bid on.
    pub hash_id: B256,
    /// The bidder.
    pub from_address: Address,
    /// The bid value, in wei.
    pub value: U256,
    /// The transaction that placed the bid.
    pub tx_hash: B256,
}

/// The kind of a [`LedgerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKind {
    /// An ethscription was created.
    Created,
    /// Ownership changed hands.
    Transfer,
    /// A listing was created or replaced.
    Offered,
    /// A bid was created or replaced.
    BidEntered,
    /// A bid was withdrawn.
    BidWithdrawn,
    /// A listing was bought.
    Bought,
    /// A listing was cancelled.
    Delisted,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::Transfer,
        Self::Offered,
        Self::BidEntered,
        Self::BidWithdrawn,
        Self::Bought,
        Self::Delisted,
    ];

    /// Returns the stable string form used in storage and metrics labels.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Transfer => "transfer",
            Self::Offered => "offered",
            Self::BidEntered => "bid_entered",
            Self::BidWithdrawn => "bid_withdrawn",
            Self::Bought => "bought",
            Self::Delisted => "delisted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

/// The identifier of a [`LedgerEvent`]: `{txHash}-{logIndex}`.
///
/// Re-inserting an event with an existing id is a no-op, which makes replays safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    /// The transaction that produced the event.
    pub tx_hash: B256,
    /// The log index, real or synthesized.
    pub log_index: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{}", self.tx_hash, self.log_index)
    }
}

impl FromStr for EventId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) =
            s.rsplit_once('-').ok_or_else(|| format!("malformed event id: {s}"))?;
        let tx_hash = hash.parse::<B256>().map_err(|err| format!("malformed event id: {err}"))?;
        let log_index = index.parse::<u64>().map_err(|err| format!("malformed event id: {err}"))?;
        Ok(Self { tx_hash, log_index })
    }
}

/// An append-only record of a state-changing action.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LedgerEvent {
    /// The event id, `{txHash}-{logIndex}`.
    #[cfg_attr(feature = "serde", serde(with = "event_id_string"))]
    pub id: EventId,
    /// What happened.
    pub kind: EventKind,
    /// The ethscription concerned.
    pub hash_id: B256,
    /// The account the action originates from.
    pub from: Address,
    /// The account the action targets.
    pub to: Address,
    /// The value attributed to the action, in wei.
    pub value: U256,
    /// The number of the including block.
    pub block_number: u64,
    /// The timestamp of the including block.
    pub block_timestamp: u64,
    /// The position of the transaction within its block.
    pub tx_index: u64,
}

#[cfg(feature = "serde")]
mod event_id_string {
    use super::EventId;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(id: &EventId, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EventId, D::Error> {
        String::deserialize(d)?.parse().map_err(D::Error::custom)
    }
}
