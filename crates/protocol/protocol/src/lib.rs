#![doc = "Ethscriptions protocol types, constants and ABI bindings shared by the indexer crates."]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod constants;
pub use constants::{HASH_ID_LEN, SVG_DATA_URI_PREFIX};

mod abi;
pub use abi::{
    AbiDecodeError, ESIP1_TRANSFER_TOPIC, ESIP2_TRANSFER_TOPIC, IEthscriptionsMarket,
    IEthscriptionsProtocol, MarketplaceEvent, ProtocolTransfer, decode_marketplace_log,
    decode_protocol_transfer,
};

mod input;
pub use input::{InputShape, clean_payload, sniff_input};

mod digest;
pub use digest::content_sha;

mod types;
pub use types::{
    Bid, Ethscription, EventId, EventKind, Listing, LedgerEvent, ReceiptLog, TransactionContext,
};
