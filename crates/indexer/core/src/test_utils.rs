//! Test utilities for the indexing pipeline.

use crate::{ChainBlock, ChainClient, ChainClientError, ChainTransaction};
use alloy_primitives::{Address, B256, Bytes, Log, LogData, U256};
use async_trait::async_trait;
use ethscribe_protocol::ReceiptLog;
use futures::{
    StreamExt,
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
    stream::{self, BoxStream},
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

/// Mutable state behind a [`TestChainClient`].
#[derive(Debug, Default)]
pub struct TestChainState {
    /// The head returned by [`ChainClient::head_number`].
    pub head: u64,
    /// Blocks by number.
    pub blocks: HashMap<u64, ChainBlock>,
    /// Receipt logs by transaction hash. Missing entries return no logs.
    pub logs: HashMap<B256, Vec<ReceiptLog>>,
    /// Errors returned, in order, by the next fetch calls.
    pub failures: VecDeque<ChainClientError>,
    /// Block numbers fetched so far, in call order.
    pub block_fetches: Vec<u64>,
    /// Transaction hashes whose logs were fetched so far, in call order.
    pub log_fetches: Vec<B256>,
}

/// An in-memory [`ChainClient`].
#[derive(Debug)]
pub struct TestChainClient {
    state: Mutex<TestChainState>,
    head_tx: UnboundedSender<u64>,
    head_rx: Mutex<Option<UnboundedReceiver<u64>>>,
}

impl Default for TestChainClient {
    fn default() -> Self {
        let (head_tx, head_rx) = unbounded();
        Self {
            state: Mutex::new(TestChainState::default()),
            head_tx,
            head_rx: Mutex::new(Some(head_rx)),
        }
    }
}

impl TestChainClient {
    /// Runs `f` against the mutable state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut TestChainState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Inserts a block and raises the head to it if needed.
    pub fn insert_block(&self, block: ChainBlock) {
        self.with_state(|state| {
            state.head = state.head.max(block.number);
            state.blocks.insert(block.number, block);
        });
    }

    /// Inserts empty blocks for every number in `range`.
    pub fn insert_empty_blocks(&self, range: impl IntoIterator<Item = u64>) {
        for number in range {
            self.insert_block(ChainBlock { number, timestamp: number * 12, transactions: vec![] });
        }
    }

    /// Sets the receipt logs of a transaction.
    pub fn insert_logs(&self, tx_hash: B256, logs: Vec<ReceiptLog>) {
        self.with_state(|state| {
            state.logs.insert(tx_hash, logs);
        });
    }

    /// Sets the head without inserting a block.
    pub fn set_head(&self, head: u64) {
        self.with_state(|state| state.head = head);
    }

    /// Queues an error returned by the next fetch call.
    pub fn fail_next(&self, err: ChainClientError) {
        self.with_state(|state| state.failures.push_back(err));
    }

    /// Publishes a new head on the stream returned by [`ChainClient::watch_heads`].
    pub fn announce_head(&self, head: u64) {
        self.set_head(head);
        let _ = self.head_tx.unbounded_send(head);
    }

    /// Closes the head stream.
    pub fn close_heads(&self) {
        self.head_tx.close_channel();
    }

    /// Returns the block numbers fetched so far.
    pub fn block_fetches(&self) -> Vec<u64> {
        self.with_state(|state| state.block_fetches.clone())
    }

    /// Returns the transaction hashes whose logs were fetched so far.
    pub fn log_fetches(&self) -> Vec<B256> {
        self.with_state(|state| state.log_fetches.clone())
    }

    fn take_failure(&self) -> Result<(), ChainClientError> {
        self.with_state(|state| state.failures.pop_front()).map_or(Ok(()), Err)
    }
}

#[async_trait]
impl ChainClient for TestChainClient {
    async fn head_number(&self) -> Result<u64, ChainClientError> {
        self.take_failure()?;
        Ok(self.with_state(|state| state.head))
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError> {
        self.take_failure()?;
        self.with_state(|state| {
            state.block_fetches.push(number);
            state.blocks.get(&number).cloned().ok_or(ChainClientError::BlockNotFound(number))
        })
    }

    async fn transaction_logs(&self, tx_hash: B256) -> Result<Vec<ReceiptLog>, ChainClientError> {
        self.take_failure()?;
        Ok(self.with_state(|state| {
            state.log_fetches.push(tx_hash);
            state.logs.get(&tx_hash).cloned().unwrap_or_default()
        }))
    }

    fn watch_heads(&self) -> BoxStream<'static, u64> {
        self.head_rx
            .lock()
            .unwrap()
            .take()
            .map_or_else(|| stream::empty::<u64>().boxed(), StreamExt::boxed)
    }
}

/// Builds a transaction with the given index, sender, recipient and calldata.
pub fn transaction(
    hash: B256,
    index: u64,
    from: Address,
    to: Address,
    input: impl Into<Bytes>,
) -> ChainTransaction {
    ChainTransaction { hash, index, from, to: Some(to), input: input.into(), value: U256::ZERO }
}

/// Wraps raw log data emitted by `address` into a [`ReceiptLog`].
pub fn receipt_log(address: Address, data: LogData, log_index: u64) -> ReceiptLog {
    ReceiptLog { inner: Log { address, data }, log_index }
}
