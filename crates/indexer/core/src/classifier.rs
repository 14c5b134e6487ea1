//! Turns a transaction into the ethscription action it performs.

use crate::{ChainClient, IndexerError};
use alloy_primitives::{Address, B256};
use ethscribe_protocol::{
    AbiDecodeError, InputShape, MarketplaceEvent, ReceiptLog, TransactionContext,
    decode_marketplace_log, decode_protocol_transfer, sniff_input,
};
use ethscribe_storage::LedgerReader;
use std::sync::Arc;
use tracing::{debug, warn};

/// The action a transaction performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedAction {
    /// The transaction is not an ethscription action.
    Ignore,
    /// Creates an ethscription from the cleaned payload.
    Creation(String),
    /// Transfers one ethscription from the sender to the recipient.
    DirectTransfer(B256),
    /// Transfers several ethscriptions from the sender to the recipient.
    BatchTransfer(Vec<B256>),
    /// Actions taken from the receipt logs, in log order.
    ContractEvents(Vec<ContractAction>),
}

/// An action emitted by a contract in a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractAction {
    /// A protocol transfer emitted by the contract holding the ethscription.
    Transfer {
        /// The emitting contract, which must own the ethscription.
        sender: Address,
        /// The new owner.
        recipient: Address,
        /// The transferred ethscription.
        hash_id: B256,
        /// The previous owner the transfer is conditional on.
        previous_owner: Option<Address>,
        /// The block-level index of the log.
        log_index: u64,
    },
    /// An event of the marketplace contract.
    Marketplace {
        /// The decoded event.
        event: MarketplaceEvent,
        /// The block-level index of the log.
        log_index: u64,
    },
}

/// Classifies transactions by calldata shape, falling back to their receipt logs.
///
/// Calldata rules take precedence. A batch candidate is accepted only when its first id is
/// already indexed; later ids are left for the action processor to check one by one. Receipts are
/// only fetched when no calldata rule matched.
#[derive(Debug)]
pub struct TransactionClassifier<C, S> {
    client: Arc<C>,
    ledger: Arc<S>,
    marketplace: Option<Address>,
}

impl<C, S> TransactionClassifier<C, S>
where
    C: ChainClient,
    S: LedgerReader,
{
    /// Creates a new [`TransactionClassifier`]. Marketplace logs are only decoded when
    /// `marketplace` is set.
    pub const fn new(client: Arc<C>, ledger: Arc<S>, marketplace: Option<Address>) -> Self {
        Self { client, ledger, marketplace }
    }

    /// Classifies a transaction.
    pub async fn classify(
        &self,
        tx: &TransactionContext,
    ) -> Result<ClassifiedAction, IndexerError> {
        match sniff_input(&tx.input) {
            InputShape::Empty => return Ok(ClassifiedAction::Ignore),
            // Calldata actions need a recipient; contract deployments can only act through logs.
            _ if tx.to.is_none() => {}
            InputShape::Creation(payload) => return Ok(ClassifiedAction::Creation(payload)),
            InputShape::DirectTransfer(hash_id) => {
                return Ok(ClassifiedAction::DirectTransfer(hash_id));
            }
            InputShape::BatchCandidate(ids) => {
                if self.ledger.ethscription_by_hash_id(ids[0])?.is_some() {
                    return Ok(ClassifiedAction::BatchTransfer(ids));
                }
                debug!(
                    target: "classifier",
                    tx = %tx.hash,
                    first = %ids[0],
                    "Batch candidate starts with an unknown id, inspecting receipt"
                );
            }
            InputShape::Opaque => {}
        }

        let logs = self.client.transaction_logs(tx.hash).await?;
        let actions: Vec<_> = logs.iter().filter_map(|log| self.contract_action(tx, log)).collect();

        if actions.is_empty() {
            Ok(ClassifiedAction::Ignore)
        } else {
            Ok(ClassifiedAction::ContractEvents(actions))
        }
    }

    fn contract_action(&self, tx: &TransactionContext, log: &ReceiptLog) -> Option<ContractAction> {
        match decode_protocol_transfer(log) {
            Ok(transfer) => {
                return Some(ContractAction::Transfer {
                    sender: log.address(),
                    recipient: transfer.recipient,
                    hash_id: transfer.hash_id,
                    previous_owner: transfer.previous_owner,
                    log_index: log.log_index,
                });
            }
            Err(AbiDecodeError::Malformed(err)) => {
                warn!(
                    target: "classifier",
                    tx = %tx.hash,
                    log_index = log.log_index,
                    %err,
                    "Skipping malformed protocol transfer log"
                );
                return None;
            }
            Err(AbiDecodeError::NoMatch) => {}
        }

        if self.marketplace != Some(log.address()) {
            return None;
        }

        match decode_marketplace_log(log) {
            Ok(event) => Some(ContractAction::Marketplace { event, log_index: log.log_index }),
            Err(err) => {
                warn!(
                    target: "classifier",
                    tx = %tx.hash,
                    log_index = log.log_index,
                    %err,
                    "Skipping malformed marketplace log"
                );
                None
            }
        }
    }
}
