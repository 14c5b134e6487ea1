#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod chain_client;
pub use chain_client::{AlloyChainClient, DEFAULT_POLL_INTERVAL};
