#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::{ChainClientError, IndexerError};

mod traits;
pub use traits::{ChainBlock, ChainClient, ChainTransaction};

mod metrics;
pub use metrics::Metrics;

mod classifier;
pub use classifier::{ClassifiedAction, ContractAction, TransactionClassifier};

mod actions;
pub use actions::{ActionKind, ActionOutcome, ActionProcessor, ActionReport, SkipReason};

mod retry;
pub use retry::RetryPolicy;

mod block;
pub use block::{BlockProcessor, BlockSummary};

mod cursor;
pub use cursor::BlockCursor;

mod scheduler;
pub use scheduler::{IndexerConfig, Scheduler};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
