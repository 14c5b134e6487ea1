//! Applies classified actions to the ledger.
//!
//! Every handler checks its preconditions against the ledger before mutating it, and appends its
//! event before the guarded mutation. Replaying a transaction that was only partially applied
//! therefore finishes the missing writes without duplicating the event.

use crate::{ClassifiedAction, ContractAction, IndexerError, Metrics};
use alloy_primitives::{Address, B256, U256};
use ethscribe_protocol::{
    Bid, Ethscription, EventKind, LedgerEvent, Listing, MarketplaceEvent, TransactionContext,
    content_sha,
};
use ethscribe_storage::{LedgerStore, StorageError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The result of applying a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The ledger was updated.
    Applied,
    /// A precondition failed and the ledger was left untouched.
    Skipped(SkipReason),
}

impl ActionOutcome {
    /// Returns `true` if the action updated the ledger.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Why an action was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another ethscription already claimed the content digest.
    DuplicateContent,
    /// The action was applied by an earlier run.
    AlreadyIndexed,
    /// The referenced ethscription does not exist.
    UnknownEthscription,
    /// The sender does not own the ethscription.
    NotOwner,
    /// The recorded previous owner differs from the one the transfer requires.
    PreviousOwnerMismatch,
    /// The marketplace event has an unknown signature.
    Unrecognized,
    /// The transaction has no recipient.
    MissingRecipient,
}

/// The kind of action, used to label reports and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// An ethscription creation.
    Creation,
    /// A calldata transfer, direct or batched.
    Transfer,
    /// A protocol transfer emitted by a contract.
    ContractTransfer,
    /// A marketplace event.
    Marketplace,
}

impl ActionKind {
    /// Returns the metric label of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Transfer => "transfer",
            Self::ContractTransfer => "contract_transfer",
            Self::Marketplace => "marketplace",
        }
    }
}

/// The outcome of one action of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReport {
    /// The kind of action.
    pub kind: ActionKind,
    /// What happened.
    pub outcome: ActionOutcome,
}

/// A transfer of one ethscription, from calldata or from a contract log.
#[derive(Debug, Clone, Copy)]
struct Transfer {
    hash_id: B256,
    from: Address,
    to: Address,
    previous_owner: Option<Address>,
    value: U256,
    log_index: u64,
}

/// Applies [`ClassifiedAction`]s to a [`LedgerStore`].
#[derive(Debug)]
pub struct ActionProcessor<S> {
    ledger: Arc<S>,
}

impl<S: LedgerStore> ActionProcessor<S> {
    /// Creates a new [`ActionProcessor`].
    pub const fn new(ledger: Arc<S>) -> Self {
        Self { ledger }
    }

    /// Applies every action of a classified transaction, in order.
    pub fn process(
        &self,
        tx: &TransactionContext,
        action: ClassifiedAction,
    ) -> Result<Vec<ActionReport>, IndexerError> {
        let reports: Vec<ActionReport> = match action {
            ClassifiedAction::Ignore => vec![],
            ClassifiedAction::Creation(payload) => {
                vec![report(ActionKind::Creation, self.create(tx, payload)?)]
            }
            ClassifiedAction::DirectTransfer(hash_id) => {
                vec![report(ActionKind::Transfer, self.calldata_transfer(tx, hash_id, 0)?)]
            }
            ClassifiedAction::BatchTransfer(ids) => ids
                .into_iter()
                .zip(0u64..)
                .map(|(hash_id, i)| {
                    Ok(report(ActionKind::Transfer, self.calldata_transfer(tx, hash_id, i)?))
                })
                .collect::<Result<_, IndexerError>>()?,
            ClassifiedAction::ContractEvents(actions) => actions
                .into_iter()
                .map(|action| self.contract_action(tx, action))
                .collect::<Result<_, IndexerError>>()?,
        };

        for report in &reports {
            let name = if report.outcome.is_applied() {
                Metrics::ACTIONS_APPLIED_TOTAL
            } else {
                Metrics::ACTIONS_SKIPPED_TOTAL
            };
            metrics::counter!(name, "kind" => report.kind.as_str()).increment(1);
        }

        Ok(reports)
    }

    fn contract_action(
        &self,
        tx: &TransactionContext,
        action: ContractAction,
    ) -> Result<ActionReport, IndexerError> {
        match action {
            ContractAction::Transfer { sender, recipient, hash_id, previous_owner, log_index } => {
                let transfer = Transfer {
                    hash_id,
                    from: sender,
                    to: recipient,
                    previous_owner,
                    value: U256::ZERO,
                    log_index,
                };
                Ok(report(ActionKind::ContractTransfer, self.transfer(tx, transfer)?))
            }
            ContractAction::Marketplace { event, log_index } => {
                Ok(report(ActionKind::Marketplace, self.marketplace(tx, event, log_index)?))
            }
        }
    }

    fn create(
        &self,
        tx: &TransactionContext,
        payload: String,
    ) -> Result<ActionOutcome, IndexerError> {
        let Some(recipient) = tx.to else {
            return Ok(ActionOutcome::Skipped(SkipReason::MissingRecipient));
        };

        let sha = content_sha(&payload);
        if let Some(existing) = self.ledger.ethscription_by_sha(sha)? {
            if existing.hash_id == tx.hash {
                return Ok(ActionOutcome::Skipped(SkipReason::AlreadyIndexed));
            }
            warn!(
                target: "actions",
                tx = %tx.hash,
                %sha,
                existing = %existing.hash_id,
                "Content already ethscribed, ignoring creation"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::DuplicateContent));
        }

        self.ledger.append_event(&LedgerEvent {
            to: recipient,
            ..event(tx, 0, EventKind::Created, tx.hash)
        })?;

        let ethscription = Ethscription {
            hash_id: tx.hash,
            sha,
            creator: tx.from,
            owner: recipient,
            prev_owner: None,
            created_at: tx.block_timestamp,
            block_number: tx.block_number,
            content: payload,
        };
        match self.ledger.insert_ethscription(&ethscription) {
            Ok(()) => {}
            Err(StorageError::ConflictError(reason)) => {
                debug!(target: "actions", tx = %tx.hash, %reason, "Creation already indexed");
                return Ok(ActionOutcome::Skipped(SkipReason::AlreadyIndexed));
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            target: "actions",
            hash_id = %tx.hash,
            creator = %tx.from,
            owner = %recipient,
            "Ethscription created"
        );
        Ok(ActionOutcome::Applied)
    }

    fn calldata_transfer(
        &self,
        tx: &TransactionContext,
        hash_id: B256,
        log_index: u64,
    ) -> Result<ActionOutcome, IndexerError> {
        let Some(to) = tx.to else {
            return Ok(ActionOutcome::Skipped(SkipReason::MissingRecipient));
        };
        // Only the first ethscription of a batch carries the transaction value.
        let value = if log_index == 0 { tx.value } else { U256::ZERO };
        self.transfer(
            tx,
            Transfer { hash_id, from: tx.from, to, previous_owner: None, value, log_index },
        )
    }

    fn transfer(
        &self,
        tx: &TransactionContext,
        transfer: Transfer,
    ) -> Result<ActionOutcome, IndexerError> {
        let Some(ethscription) = self.ledger.ethscription_by_hash_id(transfer.hash_id)? else {
            debug!(
                target: "actions",
                tx = %tx.hash,
                hash_id = %transfer.hash_id,
                "Transfer of unknown ethscription"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::UnknownEthscription));
        };

        let id = tx.event_id(transfer.log_index);
        if ethscription.owner != transfer.from {
            if self.ledger.event(id)?.is_some() {
                return Ok(ActionOutcome::Skipped(SkipReason::AlreadyIndexed));
            }
            debug!(
                target: "actions",
                tx = %tx.hash,
                hash_id = %transfer.hash_id,
                sender = %transfer.from,
                owner = %ethscription.owner,
                "Transfer from non-owner"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::NotOwner));
        }

        if transfer.previous_owner.is_some_and(|expected| ethscription.prev_owner != Some(expected))
        {
            debug!(
                target: "actions",
                tx = %tx.hash,
                hash_id = %transfer.hash_id,
                expected = ?transfer.previous_owner,
                recorded = ?ethscription.prev_owner,
                "Previous owner mismatch"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::PreviousOwnerMismatch));
        }

        self.ledger.append_event(&LedgerEvent {
            from: transfer.from,
            to: transfer.to,
            value: transfer.value,
            ..event(tx, transfer.log_index, EventKind::Transfer, transfer.hash_id)
        })?;
        self.ledger.update_owner(transfer.hash_id, transfer.to, ethscription.owner)?;

        info!(
            target: "actions",
            hash_id = %transfer.hash_id,
            from = %transfer.from,
            to = %transfer.to,
            "Ethscription transferred"
        );
        Ok(ActionOutcome::Applied)
    }

    fn marketplace(
        &self,
        tx: &TransactionContext,
        market_event: MarketplaceEvent,
        log_index: u64,
    ) -> Result<ActionOutcome, IndexerError> {
        let Some(hash_id) = market_event.hash_id() else {
            debug!(target: "actions", tx = %tx.hash, log_index, "Unrecognized marketplace event");
            return Ok(ActionOutcome::Skipped(SkipReason::Unrecognized));
        };
        if self.ledger.ethscription_by_hash_id(hash_id)?.is_none() {
            warn!(
                target: "actions",
                tx = %tx.hash,
                %hash_id,
                event = market_event.name(),
                "Marketplace event for unknown ethscription"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::UnknownEthscription));
        }

        // The mutations are idempotent, so a replay re-applies them after finding its event.
        let appended = match market_event {
            MarketplaceEvent::Offered { min_value, to_address, .. } => {
                let appended = self.ledger.append_event(&LedgerEvent {
                    to: to_address.unwrap_or_default(),
                    value: min_value,
                    ..event(tx, log_index, EventKind::Offered, hash_id)
                })?;
                self.ledger.upsert_listing(&Listing {
                    hash_id,
                    min_value,
                    listed_by: tx.from,
                    to_address,
                    tx_hash: tx.hash,
                })?;
                appended
            }
            MarketplaceEvent::BidEntered { value, from_address, .. } => {
                let appended = self.ledger.append_event(&LedgerEvent {
                    from: from_address,
                    value,
                    ..event(tx, log_index, EventKind::BidEntered, hash_id)
                })?;
                self.ledger.upsert_bid(&Bid { hash_id, from_address, value, tx_hash: tx.hash })?;
                appended
            }
            MarketplaceEvent::BidWithdrawn { from_address, .. } => {
                let appended = self.ledger.append_event(&LedgerEvent {
                    from: from_address,
                    ..event(tx, log_index, EventKind::BidWithdrawn, hash_id)
                })?;
                self.ledger.delete_bid(hash_id)?;
                appended
            }
            // A sale only settles the buyer's own bid. A bid by anyone else stays open.
            MarketplaceEvent::Bought { value, from_address, to_address, .. } => {
                let appended = self.ledger.append_event(&LedgerEvent {
                    from: from_address,
                    to: to_address,
                    value,
                    ..event(tx, log_index, EventKind::Bought, hash_id)
                })?;
                self.ledger.delete_listing(hash_id)?;
                if self.ledger.bid(hash_id)?.is_some_and(|bid| bid.from_address == to_address) {
                    self.ledger.delete_bid(hash_id)?;
                }
                appended
            }
            MarketplaceEvent::NoLongerForSale { .. } => {
                let appended =
                    self.ledger.append_event(&event(tx, log_index, EventKind::Delisted, hash_id))?;
                self.ledger.delete_listing(hash_id)?;
                appended
            }
            MarketplaceEvent::Unrecognized { .. } => {
                return Ok(ActionOutcome::Skipped(SkipReason::Unrecognized));
            }
        };

        if !appended {
            debug!(
                target: "actions",
                tx = %tx.hash,
                %hash_id,
                event = market_event.name(),
                "Marketplace event already indexed"
            );
            return Ok(ActionOutcome::Skipped(SkipReason::AlreadyIndexed));
        }

        info!(
            target: "actions",
            %hash_id,
            event = market_event.name(),
            "Marketplace event applied"
        );
        Ok(ActionOutcome::Applied)
    }
}

const fn report(kind: ActionKind, outcome: ActionOutcome) -> ActionReport {
    ActionReport { kind, outcome }
}

/// An event sent by the transaction sender with no counterparty and no value.
const fn event(
    tx: &TransactionContext,
    log_index: u64,
    kind: EventKind,
    hash_id: B256,
) -> LedgerEvent {
    LedgerEvent {
        id: tx.event_id(log_index),
        kind,
        hash_id,
        from: tx.from,
        to: Address::ZERO,
        value: U256::ZERO,
        block_number: tx.block_number,
        block_timestamp: tx.block_timestamp,
        tx_index: tx.index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethscribe_protocol::EventId;
    use ethscribe_storage::{LedgerReader, LedgerWriter, SqliteLedger};
    use rstest::rstest;

    const ALICE: Address = Address::repeat_byte(0x01);
    const BOB: Address = Address::repeat_byte(0x02);
    const CAROL: Address = Address::repeat_byte(0x03);
    const CUSTODIAN: Address = Address::repeat_byte(0xcc);
    const PAYLOAD: &str = "data:image/svg+xml,<svg/>";

    fn tx(hash: u8, from: Address, to: Address, value: u64) -> TransactionContext {
        TransactionContext {
            chain_id: 1,
            block_number: 10,
            block_timestamp: 120,
            hash: B256::repeat_byte(hash),
            index: 0,
            from,
            to: Some(to),
            input: Default::default(),
            value: U256::from(value),
        }
    }

    fn processor() -> (ActionProcessor<SqliteLedger>, Arc<SqliteLedger>) {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        (ActionProcessor::new(Arc::clone(&ledger)), ledger)
    }

    fn outcomes(reports: Vec<ActionReport>) -> Vec<ActionOutcome> {
        reports.into_iter().map(|report| report.outcome).collect()
    }

    /// Creates an ethscription with hash id `0xaa..` owned by `owner`.
    fn seed(processor: &ActionProcessor<SqliteLedger>, owner: Address) -> B256 {
        let creation = tx(0xaa, ALICE, owner, 0);
        let reports =
            processor.process(&creation, ClassifiedAction::Creation(PAYLOAD.into())).unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Applied]);
        creation.hash
    }

    #[test]
    fn test_creation() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, BOB);

        let ethscription = ledger.ethscription_by_hash_id(hash_id).unwrap().unwrap();
        assert_eq!(ethscription.creator, ALICE);
        assert_eq!(ethscription.owner, BOB);
        assert_eq!(ethscription.prev_owner, None);
        assert_eq!(ethscription.created_at, 120);
        assert_eq!(ethscription.sha, content_sha(PAYLOAD));

        let events = ledger.events_for(hash_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Created);
        assert_eq!((events[0].from, events[0].to), (ALICE, BOB));
    }

    #[test]
    fn test_duplicate_content_keeps_first() {
        let (processor, ledger) = processor();
        let first = seed(&processor, BOB);

        let second = tx(0xbb, CAROL, CAROL, 0);
        let reports =
            processor.process(&second, ClassifiedAction::Creation(PAYLOAD.into())).unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Skipped(SkipReason::DuplicateContent)]);

        assert!(ledger.ethscription_by_hash_id(second.hash).unwrap().is_none());
        let claimed = ledger.ethscription_by_sha(content_sha(PAYLOAD)).unwrap().unwrap();
        assert_eq!(claimed.hash_id, first);
        assert!(ledger.events_for(second.hash).unwrap().is_empty());
    }

    #[test]
    fn test_creation_replay_is_idempotent() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, BOB);

        let reports = processor
            .process(&tx(0xaa, ALICE, BOB, 0), ClassifiedAction::Creation(PAYLOAD.into()))
            .unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Skipped(SkipReason::AlreadyIndexed)]);
        assert_eq!(ledger.events_for(hash_id).unwrap().len(), 1);
    }

    #[test]
    fn test_creation_resumes_after_event_only() {
        let (processor, ledger) = processor();
        let creation = tx(0xaa, ALICE, BOB, 0);
        // A crash after the event append left the ethscription missing.
        let created = event(&creation, 0, EventKind::Created, creation.hash);
        ledger.append_event(&LedgerEvent { to: BOB, ..created }).unwrap();

        let reports =
            processor.process(&creation, ClassifiedAction::Creation(PAYLOAD.into())).unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Applied]);
        assert!(ledger.ethscription_by_hash_id(creation.hash).unwrap().is_some());
        assert_eq!(ledger.events_for(creation.hash).unwrap().len(), 1);
    }

    #[test]
    fn test_direct_transfer_by_owner() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);

        let transfer = tx(0x11, ALICE, BOB, 7);
        let reports =
            processor.process(&transfer, ClassifiedAction::DirectTransfer(hash_id)).unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Applied]);

        let ethscription = ledger.ethscription_by_hash_id(hash_id).unwrap().unwrap();
        assert_eq!(ethscription.owner, BOB);
        assert_eq!(ethscription.prev_owner, Some(ALICE));

        let id = EventId { tx_hash: transfer.hash, log_index: 0 };
        let recorded = ledger.event(id).unwrap().unwrap();
        assert_eq!(recorded.kind, EventKind::Transfer);
        assert_eq!((recorded.from, recorded.to, recorded.value), (ALICE, BOB, U256::from(7)));
    }

    #[test]
    fn test_transfer_from_non_owner_changes_nothing() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);

        let reports = processor
            .process(&tx(0x11, CAROL, BOB, 0), ClassifiedAction::DirectTransfer(hash_id))
            .unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Skipped(SkipReason::NotOwner)]);

        let ethscription = ledger.ethscription_by_hash_id(hash_id).unwrap().unwrap();
        assert_eq!((ethscription.owner, ethscription.prev_owner), (ALICE, None));
        assert_eq!(ledger.events_for(hash_id).unwrap().len(), 1);
    }

    #[test]
    fn test_transfer_replay_is_idempotent() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);
        let transfer = tx(0x11, ALICE, BOB, 0);

        processor.process(&transfer, ClassifiedAction::DirectTransfer(hash_id)).unwrap();
        let reports =
            processor.process(&transfer, ClassifiedAction::DirectTransfer(hash_id)).unwrap();

        assert_eq!(outcomes(reports), vec![ActionOutcome::Skipped(SkipReason::AlreadyIndexed)]);
        let ethscription = ledger.ethscription_by_hash_id(hash_id).unwrap().unwrap();
        assert_eq!((ethscription.owner, ethscription.prev_owner), (BOB, Some(ALICE)));
        assert_eq!(ledger.events_for(hash_id).unwrap().len(), 2);
    }

    #[test]
    fn test_transfer_of_unknown_ethscription() {
        let (processor, ledger) = processor();
        let reports = processor
            .process(&tx(0x11, ALICE, BOB, 0), ClassifiedAction::DirectTransfer(B256::ZERO))
            .unwrap();
        assert_eq!(
            outcomes(reports),
            vec![ActionOutcome::Skipped(SkipReason::UnknownEthscription)]
        );
        assert!(ledger.events_for(B256::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_batch_transfer_checks_each_member() {
        let (processor, ledger) = processor();
        let owned = seed(&processor, ALICE);
        let foreign = B256::repeat_byte(0xbb);
        processor
            .process(
                &tx(0xbb, CAROL, CAROL, 0),
                ClassifiedAction::Creation("data:image/svg+xml,<svg id='b'/>".into()),
            )
            .unwrap();

        let batch = tx(0x11, ALICE, BOB, 9);
        let reports = processor
            .process(&batch, ClassifiedAction::BatchTransfer(vec![foreign, owned]))
            .unwrap();
        assert_eq!(
            outcomes(reports),
            vec![ActionOutcome::Skipped(SkipReason::NotOwner), ActionOutcome::Applied]
        );

        let recorded =
            ledger.event(EventId { tx_hash: batch.hash, log_index: 1 }).unwrap().unwrap();
        assert_eq!(recorded.hash_id, owned);
        // The value belongs to the first member only.
        assert_eq!(recorded.value, U256::ZERO);
        assert_eq!(ledger.ethscription_by_hash_id(foreign).unwrap().unwrap().owner, CAROL);
    }

    #[rstest]
    #[case::esip1(None, ActionOutcome::Applied)]
    #[case::esip2_match(Some(ALICE), ActionOutcome::Applied)]
    #[case::esip2_mismatch(Some(CAROL), ActionOutcome::Skipped(SkipReason::PreviousOwnerMismatch))]
    fn test_contract_transfer(
        #[case] previous_owner: Option<Address>,
        #[case] expected: ActionOutcome,
    ) {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);
        processor
            .process(&tx(0x11, ALICE, CUSTODIAN, 0), ClassifiedAction::DirectTransfer(hash_id))
            .unwrap();

        let action = ContractAction::Transfer {
            sender: CUSTODIAN,
            recipient: BOB,
            hash_id,
            previous_owner,
            log_index: 4,
        };
        let withdraw = tx(0x22, BOB, CUSTODIAN, 0);
        let reports =
            processor.process(&withdraw, ClassifiedAction::ContractEvents(vec![action])).unwrap();
        assert_eq!(outcomes(reports), vec![expected]);

        let owner = ledger.ethscription_by_hash_id(hash_id).unwrap().unwrap().owner;
        let recorded = ledger.event(EventId { tx_hash: withdraw.hash, log_index: 4 }).unwrap();
        if expected.is_applied() {
            assert_eq!(owner, BOB);
            assert_eq!(recorded.unwrap().from, CUSTODIAN);
        } else {
            assert_eq!(owner, CUSTODIAN);
            assert!(recorded.is_none());
        }
    }

    fn market(event: MarketplaceEvent, log_index: u64) -> ClassifiedAction {
        ClassifiedAction::ContractEvents(vec![ContractAction::Marketplace { event, log_index }])
    }

    #[test]
    fn test_listing_lifecycle() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);

        let offer = tx(0x11, ALICE, CUSTODIAN, 0);
        processor
            .process(
                &offer,
                market(
                    MarketplaceEvent::Offered {
                        hash_id,
                        min_value: U256::from(5),
                        to_address: None,
                    },
                    0,
                ),
            )
            .unwrap();
        let listing = ledger.listing(hash_id).unwrap().unwrap();
        assert_eq!((listing.listed_by, listing.min_value), (ALICE, U256::from(5)));

        let buy = tx(0x22, BOB, CUSTODIAN, 5);
        let reports = processor
            .process(
                &buy,
                market(
                    MarketplaceEvent::Bought {
                        hash_id,
                        value: U256::from(5),
                        from_address: ALICE,
                        to_address: BOB,
                    },
                    1,
                ),
            )
            .unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Applied]);

        assert!(ledger.listing(hash_id).unwrap().is_none());
        let kinds: Vec<_> = ledger.events_for(hash_id).unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Created, EventKind::Offered, EventKind::Bought]);
    }

    #[rstest]
    #[case::buyer_was_bidder(BOB, false)]
    #[case::other_bidder(CAROL, true)]
    fn test_bought_clears_buyer_bid_only(#[case] bidder: Address, #[case] bid_remains: bool) {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);
        processor
            .process(
                &tx(0x11, bidder, CUSTODIAN, 3),
                market(
                    MarketplaceEvent::BidEntered {
                        hash_id,
                        value: U256::from(3),
                        from_address: bidder,
                    },
                    0,
                ),
            )
            .unwrap();

        processor
            .process(
                &tx(0x22, ALICE, CUSTODIAN, 0),
                market(
                    MarketplaceEvent::Bought {
                        hash_id,
                        value: U256::from(3),
                        from_address: ALICE,
                        to_address: BOB,
                    },
                    0,
                ),
            )
            .unwrap();

        assert_eq!(ledger.bid(hash_id).unwrap().is_some(), bid_remains);
    }

    #[test]
    fn test_bid_withdrawn_and_delisted() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);
        processor
            .process(
                &tx(0x11, BOB, CUSTODIAN, 0),
                market(
                    MarketplaceEvent::BidEntered {
                        hash_id,
                        value: U256::from(3),
                        from_address: BOB,
                    },
                    0,
                ),
            )
            .unwrap();
        processor
            .process(
                &tx(0x12, ALICE, CUSTODIAN, 0),
                market(
                    MarketplaceEvent::Offered {
                        hash_id,
                        min_value: U256::from(9),
                        to_address: Some(BOB),
                    },
                    0,
                ),
            )
            .unwrap();
        assert_eq!(ledger.listing(hash_id).unwrap().unwrap().to_address, Some(BOB));

        processor
            .process(
                &tx(0x13, BOB, CUSTODIAN, 0),
                market(
                    MarketplaceEvent::BidWithdrawn {
                        hash_id,
                        value: U256::from(3),
                        from_address: BOB,
                    },
                    0,
                ),
            )
            .unwrap();
        let delist = market(MarketplaceEvent::NoLongerForSale { hash_id }, 0);
        processor.process(&tx(0x14, ALICE, CUSTODIAN, 0), delist).unwrap();

        assert!(ledger.bid(hash_id).unwrap().is_none());
        assert!(ledger.listing(hash_id).unwrap().is_none());
        let events = ledger.events_for(hash_id).unwrap();
        let withdrawn = events.iter().find(|e| e.kind == EventKind::BidWithdrawn).unwrap();
        assert_eq!((withdrawn.from, withdrawn.value), (BOB, U256::ZERO));
        assert!(events.iter().any(|e| e.kind == EventKind::Delisted));
    }

    #[test]
    fn test_marketplace_replay_is_already_indexed() {
        let (processor, ledger) = processor();
        let hash_id = seed(&processor, ALICE);
        let offer = tx(0x11, ALICE, CUSTODIAN, 0);
        let offered = || {
            market(
                MarketplaceEvent::Offered {
                    hash_id,
                    min_value: U256::from(5),
                    to_address: Some(BOB),
                },
                0,
            )
        };

        let first = processor.process(&offer, offered()).unwrap();
        assert_eq!(outcomes(first), vec![ActionOutcome::Applied]);
        let listing = ledger.listing(hash_id).unwrap();
        let events = ledger.events_for(hash_id).unwrap();

        let replay = processor.process(&offer, offered()).unwrap();
        assert_eq!(outcomes(replay), vec![ActionOutcome::Skipped(SkipReason::AlreadyIndexed)]);
        assert_eq!(ledger.listing(hash_id).unwrap(), listing);
        assert_eq!(ledger.events_for(hash_id).unwrap(), events);
    }

    #[rstest]
    #[case::unknown_ethscription(
        MarketplaceEvent::NoLongerForSale { hash_id: B256::ZERO },
        SkipReason::UnknownEthscription
    )]
    #[case::unrecognized(MarketplaceEvent::Unrecognized { topic0: None }, SkipReason::Unrecognized)]
    fn test_marketplace_skips(#[case] event: MarketplaceEvent, #[case] reason: SkipReason) {
        let (processor, _) = processor();
        let reports = processor.process(&tx(0x11, ALICE, CUSTODIAN, 0), market(event, 0)).unwrap();
        assert_eq!(outcomes(reports), vec![ActionOutcome::Skipped(reason)]);
    }
}
