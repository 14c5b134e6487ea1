//! Contains an alloy-backed [`ChainClient`].

use alloy_consensus::Transaction as _;
use alloy_eips::BlockNumberOrTag;
use alloy_network::TransactionResponse;
use alloy_primitives::{B256, U64};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Log, Transaction};
use alloy_transport::{RpcError, TransportError};
use async_trait::async_trait;
use ethscribe_indexer::{ChainBlock, ChainClient, ChainClientError, ChainTransaction};
use ethscribe_protocol::ReceiptLog;
use futures::{StreamExt, stream::BoxStream};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// The default interval between two `eth_blockNumber` polls, about one mainnet slot.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);

/// A [`ChainClient`] that reads from an Ethereum JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct AlloyChainClient {
    /// The provider used for block and receipt queries.
    provider: RootProvider,
    /// The raw client, used to build the head poller.
    rpc_client: RpcClient,
    /// The interval between two head polls.
    poll_interval: Duration,
}

impl AlloyChainClient {
    /// Creates a new [`AlloyChainClient`] from an [`RpcClient`].
    pub fn new(rpc_client: RpcClient, poll_interval: Duration) -> Self {
        Self { provider: RootProvider::new(rpc_client.clone()), rpc_client, poll_interval }
    }

    /// Creates a new [`AlloyChainClient`] over HTTP.
    pub fn new_http(url: Url, poll_interval: Duration) -> Self {
        Self::new(RpcClient::new_http(url), poll_interval)
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn head_number(&self) -> Result<u64, ChainClientError> {
        self.provider.get_block_number().await.map_err(transport_error)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(transport_error)?
            .ok_or(ChainClientError::BlockNotFound(number))?;

        let Some(transactions) = block.transactions.as_transactions() else {
            return Err(ChainClientError::Malformed(format!(
                "block {number} returned without transaction bodies"
            )));
        };
        let transactions =
            transactions.iter().map(chain_transaction).collect::<Result<Vec<_>, _>>()?;

        trace!(
            target: "chain_client",
            number,
            transactions = transactions.len(),
            "Fetched block"
        );
        Ok(ChainBlock {
            number: block.header.number,
            timestamp: block.header.timestamp,
            transactions,
        })
    }

    async fn transaction_logs(&self, tx_hash: B256) -> Result<Vec<ReceiptLog>, ChainClientError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(transport_error)?
            .ok_or(ChainClientError::ReceiptNotFound(tx_hash))?;

        receipt.inner.logs().iter().map(receipt_log).collect()
    }

    fn watch_heads(&self) -> BoxStream<'static, u64> {
        debug!(
            target: "chain_client",
            interval_secs = self.poll_interval.as_secs(),
            "Polling for new heads"
        );
        self.rpc_client
            .prepare_static_poller::<_, U64>("eth_blockNumber", ())
            .with_poll_interval(self.poll_interval)
            .into_stream()
            .map(|head| head.to::<u64>())
            .boxed()
    }
}

fn chain_transaction(tx: &Transaction) -> Result<ChainTransaction, ChainClientError> {
    let hash = tx.tx_hash();
    let index = tx.transaction_index().ok_or_else(|| {
        ChainClientError::Malformed(format!("transaction {hash} has no index"))
    })?;

    Ok(ChainTransaction {
        hash,
        index,
        from: tx.from(),
        to: tx.to(),
        input: tx.input().clone(),
        value: tx.value(),
    })
}

fn receipt_log(log: &Log) -> Result<ReceiptLog, ChainClientError> {
    let log_index = log.log_index.ok_or_else(|| {
        ChainClientError::Malformed(format!(
            "log of transaction {:?} has no index",
            log.transaction_hash
        ))
    })?;
    Ok(ReceiptLog { inner: log.inner.clone(), log_index })
}

/// Responses the node sent but that do not decode are fatal. Everything else is worth a retry.
fn transport_error(err: TransportError) -> ChainClientError {
    match err {
        RpcError::DeserError { err, .. } => ChainClientError::Malformed(err.to_string()),
        err => ChainClientError::Transport(err.to_string()),
    }
}
