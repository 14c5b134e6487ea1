//! ABI bindings for the contract events the indexer understands.
//!
//! Two families of events are decoded:
//! - the protocol transfer events any contract may emit to move an ethscription it custodies
//!   (ESIP-1, and ESIP-2 which additionally names the expected previous owner), and
//! - the events of the marketplace contract.
//!
//! Marketplace events are decoded once into the closed [`MarketplaceEvent`] enum. A log from the
//! marketplace address with an unknown signature becomes [`MarketplaceEvent::Unrecognized`].

use crate::ReceiptLog;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolEvent, sol};
use thiserror::Error;

sol! {
    /// Transfer events emitted by contracts that hold ethscriptions on behalf of users.
    interface IEthscriptionsProtocol {
        /// ESIP-1: the emitting contract transfers `id` to `recipient`.
        event ethscriptions_protocol_TransferEthscription(
            address indexed recipient,
            bytes32 indexed id
        );

        /// ESIP-2: like ESIP-1, but only valid while `previousOwner` is the recorded previous
        /// owner of `id`.
        event ethscriptions_protocol_TransferEthscriptionForPreviousOwner(
            address indexed previousOwner,
            address indexed recipient,
            bytes32 indexed id
        );
    }
}

sol! {
    /// Events emitted by the ethscriptions marketplace contract.
    interface IEthscriptionsMarket {
        /// A listing was created or replaced. A zero `toAddress` means anyone may buy.
        event EthscriptionOffered(
            bytes32 indexed ethscriptionId,
            uint256 minValue,
            address indexed toAddress
        );

        /// A bid was placed.
        event EthscriptionBidEntered(
            bytes32 indexed ethscriptionId,
            uint256 value,
            address indexed fromAddress
        );

        /// A bid was withdrawn by its bidder.
        event EthscriptionBidWithdrawn(
            bytes32 indexed ethscriptionId,
            uint256 value,
            address indexed fromAddress
        );

        /// A sale happened, either by buying a listing or by accepting a bid.
        event EthscriptionBought(
            bytes32 indexed ethscriptionId,
            uint256 value,
            address indexed fromAddress,
            address indexed toAddress
        );

        /// A listing was cancelled.
        event EthscriptionNoLongerForSale(bytes32 indexed ethscriptionId);
    }
}

use IEthscriptionsMarket::{
    EthscriptionBidEntered, EthscriptionBidWithdrawn, EthscriptionBought,
    EthscriptionNoLongerForSale, EthscriptionOffered,
};
use IEthscriptionsProtocol::{
    ethscriptions_protocol_TransferEthscription as Esip1Transfer,
    ethscriptions_protocol_TransferEthscriptionForPreviousOwner as Esip2Transfer,
};

/// Topic-0 of the ESIP-1 transfer event.
pub const ESIP1_TRANSFER_TOPIC: B256 = Esip1Transfer::SIGNATURE_HASH;

/// Topic-0 of the ESIP-2 transfer event.
pub const ESIP2_TRANSFER_TOPIC: B256 = Esip2Transfer::SIGNATURE_HASH;

/// Errors returned while decoding a log against a known ABI.
#[derive(Debug, Error)]
pub enum AbiDecodeError {
    /// The log signature does not belong to the ABI it was decoded against.
    #[error("log does not match the expected ABI")]
    NoMatch,
    /// The log signature matched but its topics or data are malformed.
    #[error("malformed log: {0}")]
    Malformed(#[from] alloy_sol_types::Error),
}

/// A decoded protocol transfer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTransfer {
    /// The new owner.
    pub recipient: Address,
    /// The transferred ethscription.
    pub hash_id: B256,
    /// The required previous owner, present for ESIP-2 transfers only.
    pub previous_owner: Option<Address>,
}

/// Decodes a protocol transfer event.
///
/// Returns [`AbiDecodeError::NoMatch`] when topic-0 is neither of the transfer signatures.
pub fn decode_protocol_transfer(log: &ReceiptLog) -> Result<ProtocolTransfer, AbiDecodeError> {
    match log.topic0().copied() {
        Some(topic) if topic == ESIP1_TRANSFER_TOPIC => {
            let event = Esip1Transfer::decode_log_data(&log.inner.data)?;
            Ok(ProtocolTransfer {
                recipient: event.recipient,
                hash_id: event.id,
                previous_owner: None,
            })
        }
        Some(topic) if topic == ESIP2_TRANSFER_TOPIC => {
            let event = Esip2Transfer::decode_log_data(&log.inner.data)?;
            Ok(ProtocolTransfer {
                recipient: event.recipient,
                hash_id: event.id,
                previous_owner: Some(event.previousOwner),
            })
        }
        _ => Err(AbiDecodeError::NoMatch),
    }
}

/// A decoded marketplace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketplaceEvent {
    /// A listing was created or replaced.
    Offered {
        /// The listed ethscription.
        hash_id: B256,
        /// The minimum sale value.
        min_value: U256,
        /// The only account allowed to buy, if restricted.
        to_address: Option<Address>,
    },
    /// A bid was placed.
    BidEntered {
        /// The ethscription bid on.
        hash_id: B256,
        /// The bid value.
        value: U256,
        /// The bidder.
        from_address: Address,
    },
    /// A bid was withdrawn.
    BidWithdrawn {
        /// The ethscription the bid was on.
        hash_id: B256,
        /// The withdrawn value.
        value: U256,
        /// The bidder.
        from_address: Address,
    },
    /// An ethscription was sold.
    Bought {
        /// The sold ethscription.
        hash_id: B256,
        /// The sale value.
        value: U256,
        /// The seller.
        from_address: Address,
        /// The buyer.
        to_address: Address,
    },
    /// A listing was cancelled.
    NoLongerForSale {
        /// The delisted ethscription.
        hash_id: B256,
    },
    /// A log from the marketplace contract with a signature outside the known ABI.
    Unrecognized {
        /// The unknown signature, if the log had any topic.
        topic0: Option<B256>,
    },
}

impl MarketplaceEvent {
    /// Returns the ethscription referenced by the event.
    pub const fn hash_id(&self) -> Option<B256> {
        match self {
            Self::Offered { hash_id, .. } |
            Self::BidEntered { hash_id, .. } |
            Self::BidWithdrawn { hash_id, .. } |
            Self::Bought { hash_id, .. } |
            Self::NoLongerForSale { hash_id } => Some(*hash_id),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Returns a short, stable name for logs and metrics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Offered { .. } => "offered",
            Self::BidEntered { .. } => "bid_entered",
            Self::BidWithdrawn { .. } => "bid_withdrawn",
            Self::Bought { .. } => "bought",
            Self::NoLongerForSale { .. } => "no_longer_for_sale",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Decodes a log emitted by the marketplace contract.
pub fn decode_marketplace_log(log: &ReceiptLog) -> Result<MarketplaceEvent, AbiDecodeError> {
    let data = &log.inner.data;
    let event = match log.topic0().copied() {
        Some(topic) if topic == EthscriptionOffered::SIGNATURE_HASH => {
            let e = EthscriptionOffered::decode_log_data(data)?;
            MarketplaceEvent::Offered {
                hash_id: e.ethscriptionId,
                min_value: e.minValue,
                to_address: (!e.toAddress.is_zero()).then_some(e.toAddress),
            }
        }
        Some(topic) if topic == EthscriptionBidEntered::SIGNATURE_HASH => {
            let e = EthscriptionBidEntered::decode_log_data(data)?;
            MarketplaceEvent::BidEntered {
                hash_id: e.ethscriptionId,
                value: e.value,
                from_address: e.fromAddress,
            }
        }
        Some(topic) if topic == EthscriptionBidWithdrawn::SIGNATURE_HASH => {
            let e = EthscriptionBidWithdrawn::decode_log_data(data)?;
            MarketplaceEvent::BidWithdrawn {
                hash_id: e.ethscriptionId,
                value: e.value,
                from_address: e.fromAddress,
            }
        }
        Some(topic) if topic == EthscriptionBought::SIGNATURE_HASH => {
            let e = EthscriptionBought::decode_log_data(data)?;
            MarketplaceEvent::Bought {
                hash_id: e.ethscriptionId,
                value: e.value,
                from_address: e.fromAddress,
                to_address: e.toAddress,
            }
        }
        Some(topic) if topic == EthscriptionNoLongerForSale::SIGNATURE_HASH => {
            let e = EthscriptionNoLongerForSale::decode_log_data(data)?;
            MarketplaceEvent::NoLongerForSale { hash_id: e.ethscriptionId }
        }
        topic0 => MarketplaceEvent::Unrecognized { topic0 },
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Log, LogData, address};

    fn receipt_log(address: Address, data: LogData) -> ReceiptLog {
        ReceiptLog { inner: Log { address, data }, log_index: 0 }
    }

    #[test]
    fn test_transfer_topics_are_distinct() {
        assert_ne!(ESIP1_TRANSFER_TOPIC, ESIP2_TRANSFER_TOPIC);
        assert_eq!(
            Esip1Transfer::SIGNATURE,
            "ethscriptions_protocol_TransferEthscription(address,bytes32)"
        );
        assert_eq!(
            Esip2Transfer::SIGNATURE,
            "ethscriptions_protocol_TransferEthscriptionForPreviousOwner(address,address,bytes32)"
        );
    }

    #[test]
    fn test_decode_esip1_transfer() {
        let event = Esip1Transfer {
            recipient: address!("0x0000000000000000000000000000000000000002"),
            id: B256::repeat_byte(0xaa),
        };
        let log = receipt_log(Address::repeat_byte(0xcc), event.encode_log_data());

        let transfer = decode_protocol_transfer(&log).unwrap();
        assert_eq!(transfer.recipient, event.recipient);
        assert_eq!(transfer.hash_id, event.id);
        assert_eq!(transfer.previous_owner, None);
    }

    #[test]
    fn test_decode_esip2_transfer_carries_previous_owner() {
        let event = Esip2Transfer {
            previousOwner: Address::repeat_byte(0x01),
            recipient: Address::repeat_byte(0x02),
            id: B256::repeat_byte(0xaa),
        };
        let log = receipt_log(Address::repeat_byte(0xcc), event.encode_log_data());

        let transfer = decode_protocol_transfer(&log).unwrap();
        assert_eq!(transfer.previous_owner, Some(Address::repeat_byte(0x01)));
    }

    #[test]
    fn test_decode_protocol_transfer_no_match() {
        let log = receipt_log(
            Address::ZERO,
            LogData::new_unchecked(vec![B256::repeat_byte(0x99)], Default::default()),
        );
        assert!(matches!(decode_protocol_transfer(&log), Err(AbiDecodeError::NoMatch)));
    }

    #[test]
    fn test_decode_protocol_transfer_malformed_topics() {
        // Right signature, missing the indexed arguments.
        let log = receipt_log(
            Address::ZERO,
            LogData::new_unchecked(vec![ESIP1_TRANSFER_TOPIC], Default::default()),
        );
        assert!(matches!(decode_protocol_transfer(&log), Err(AbiDecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_offer_without_restriction() {
        let event = EthscriptionOffered {
            ethscriptionId: B256::repeat_byte(0xaa),
            minValue: U256::from(5),
            toAddress: Address::ZERO,
        };
        let log = receipt_log(Address::repeat_byte(0xee), event.encode_log_data());

        assert_eq!(
            decode_marketplace_log(&log).unwrap(),
            MarketplaceEvent::Offered {
                hash_id: B256::repeat_byte(0xaa),
                min_value: U256::from(5),
                to_address: None,
            }
        );
    }

    #[test]
    fn test_decode_bought() {
        let event = EthscriptionBought {
            ethscriptionId: B256::repeat_byte(0xaa),
            value: U256::from(7),
            fromAddress: Address::repeat_byte(0x01),
            toAddress: Address::repeat_byte(0x02),
        };
        let log = receipt_log(Address::repeat_byte(0xee), event.encode_log_data());
        let decoded = decode_marketplace_log(&log).unwrap();

        assert_eq!(decoded.hash_id(), Some(B256::repeat_byte(0xaa)));
        assert_eq!(decoded.name(), "bought");
    }

    #[test]
    fn test_decode_unknown_marketplace_signature() {
        let log = receipt_log(
            Address::repeat_byte(0xee),
            LogData::new_unchecked(vec![B256::repeat_byte(0x42)], Default::default()),
        );
        assert_eq!(
            decode_marketplace_log(&log).unwrap(),
            MarketplaceEvent::Unrecognized { topic0: Some(B256::repeat_byte(0x42)) }
        );
    }
}
