//! Synchronous workflow service over a [`SupplyStore`] and an [`EventBus`].
//!
//! Each public operation is one unit of work:
//!
//! 1. **Authorize** the principal for the operation's permission
//! 2. **Lock** the affected item (operations touching stock, requests or ledger)
//! 3. **Decide** on clones of the loaded aggregates (`handle` + `apply`)
//! 4. **Reconcile** linked requests after every ledger mutation
//! 5. **Commit** every staged aggregate in one atomic store write
//! 6. **Publish** the committed events (best-effort)
//!
//! Any failure before step 5 leaves the store untouched.

mod catalog;
mod parties;
mod unit_of_work;
mod workflow;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use supplyline_catalog::{SupplyItem, SupplyItemId};
use supplyline_events::{EventBus, EventEnvelope};
use supplyline_ledger::{SupplyItemTransaction, TransactionId};
use supplyline_parties::{Party, PartyId};
use supplyline_requests::{Reconciliation, SupplyItemRequest, on_transaction_status_changed};

use crate::config::SupplyConfig;
use crate::error::WorkflowError;
use crate::locks::ItemLocks;
use crate::store::SupplyStore;

pub use catalog::NewItem;
pub use parties::NewParty;

use unit_of_work::UnitOfWork;

/// Supply workflow service.
///
/// Generic over the store and bus so tests run against the in-memory
/// implementations.
#[derive(Debug)]
pub struct SupplyService<S, B> {
    store: S,
    bus: B,
    locks: ItemLocks,
    config: SupplyConfig,
}

impl<S, B> SupplyService<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_config(store, bus, SupplyConfig::default())
    }

    pub fn with_config(store: S, bus: B, config: SupplyConfig) -> Self {
        Self {
            store,
            bus,
            locks: ItemLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SupplyConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> SupplyService<S, B>
where
    S: SupplyStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn load_item(&self, id: SupplyItemId) -> Result<SupplyItem, WorkflowError> {
        self.store
            .load_item(id)?
            .ok_or_else(|| WorkflowError::not_found(format!("supply item {id}")))
    }

    fn load_party(&self, id: PartyId) -> Result<Party, WorkflowError> {
        self.store
            .load_party(id)?
            .ok_or_else(|| WorkflowError::not_found(format!("party {id}")))
    }

    fn load_transaction(&self, id: TransactionId) -> Result<SupplyItemTransaction, WorkflowError> {
        self.store
            .load_transaction(id)?
            .ok_or_else(|| WorkflowError::not_found(format!("transaction {id}")))
    }

    /// Push `transaction`'s status onto its linked requests inside `uow`.
    ///
    /// Requests already staged in this unit of work are seen in their staged
    /// state, including ones created by it.
    fn reconcile(
        &self,
        uow: &mut UnitOfWork,
        transaction: &SupplyItemTransaction,
        at: DateTime<Utc>,
    ) -> Result<Reconciliation, WorkflowError> {
        let transaction_id = transaction.id_typed();

        let mut linked: Vec<SupplyItemRequest> = self
            .store
            .requests_for_transaction(transaction_id)?
            .into_iter()
            .map(|stored| {
                uow.staged_request(stored.id_typed())
                    .cloned()
                    .unwrap_or(stored)
            })
            .collect();
        let fresh: Vec<SupplyItemRequest> = uow
            .staged_requests_for(transaction_id)
            .filter(|staged| !linked.iter().any(|r| r.id_typed() == staged.id_typed()))
            .cloned()
            .collect();
        linked.extend(fresh);

        let outcome = on_transaction_status_changed(transaction, linked.iter_mut(), at);

        for request in linked {
            let request_id = request.id_typed();
            if !outcome.updated.contains(&request_id) {
                continue;
            }
            let events = outcome
                .events
                .iter()
                .filter(|(id, _)| *id == request_id)
                .map(|(_, event)| event.clone())
                .collect();
            uow.stage_request(request, events)?;
        }

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                transaction_id = %transaction_id,
                skipped = outcome.skipped.len(),
                "reconciliation left linked requests unchanged"
            );
        }

        Ok(outcome)
    }

    /// Commit the unit of work, then publish its events.
    fn commit(&self, uow: UnitOfWork) -> Result<(), WorkflowError> {
        let correlation_id = uow.correlation_id();
        let (changes, envelopes) = uow.into_change_set();
        if changes.is_empty() {
            return Ok(());
        }

        self.store.commit(changes)?;
        tracing::debug!(
            correlation_id = %correlation_id,
            events = envelopes.len(),
            "unit of work committed"
        );

        if !self.config.publish_events {
            return Ok(());
        }

        // The commit stands even if publication fails; consumers re-read the store.
        for envelope in envelopes {
            let event_type = envelope.event_type().to_string();
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    event_type = %event_type,
                    error = ?err,
                    "event publication failed"
                );
            }
        }

        Ok(())
    }
}
