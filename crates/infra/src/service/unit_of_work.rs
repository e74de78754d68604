//! Staging area for one workflow operation.
//!
//! Aggregates are decided on clones and staged here together with the events
//! that produced them. Re-staging an aggregate replaces its value but keeps
//! the version it was first loaded at, so the commit checks against what the
//! operation actually read.

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use supplyline_catalog::{SupplyItem, SupplyItemEvent};
use supplyline_core::{AggregateId, AggregateRoot, ExpectedVersion, UserId};
use supplyline_events::{Event, EventEnvelope};
use supplyline_ledger::{SupplyItemTransaction, TransactionEvent, TransactionId};
use supplyline_parties::{Party, PartyEvent};
use supplyline_requests::{RequestEvent, RequestId, SupplyItemRequest};

use crate::error::WorkflowError;
use crate::store::{ChangeSet, Staged};

#[derive(Debug)]
struct StagedSet<A> {
    entries: Vec<Staged<A>>,
}

impl<A> Default for StagedSet<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: AggregateRoot> StagedSet<A> {
    fn put(&mut self, value: A, applied: usize) {
        if let Some(existing) = self.entries.iter_mut().find(|s| s.value.id() == value.id()) {
            existing.value = value;
            return;
        }

        let loaded = value.version().saturating_sub(applied as u64);
        self.entries.push(Staged {
            expected: ExpectedVersion::from_loaded(loaded),
            value,
        });
    }

    fn get(&self, id: &A::Id) -> Option<&A> {
        self.entries
            .iter()
            .find(|s| s.value.id() == id)
            .map(|s| &s.value)
    }

    fn values(&self) -> impl Iterator<Item = &A> {
        self.entries.iter().map(|s| &s.value)
    }
}

#[derive(Debug)]
pub(crate) struct UnitOfWork {
    correlation_id: Uuid,
    actor: Option<UserId>,
    items: StagedSet<SupplyItem>,
    parties: StagedSet<Party>,
    transactions: StagedSet<SupplyItemTransaction>,
    requests: StagedSet<SupplyItemRequest>,
    events: Vec<EventEnvelope<JsonValue>>,
}

impl UnitOfWork {
    pub(crate) fn new(actor: Option<UserId>) -> Self {
        Self {
            correlation_id: Uuid::now_v7(),
            actor,
            items: StagedSet::default(),
            parties: StagedSet::default(),
            transactions: StagedSet::default(),
            requests: StagedSet::default(),
            events: Vec::new(),
        }
    }

    pub(crate) fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub(crate) fn stage_item(
        &mut self,
        item: SupplyItem,
        events: Vec<SupplyItemEvent>,
    ) -> Result<(), WorkflowError> {
        if events.is_empty() {
            return Ok(());
        }
        self.record(&item, &events)?;
        self.items.put(item, events.len());
        Ok(())
    }

    pub(crate) fn stage_party(
        &mut self,
        party: Party,
        events: Vec<PartyEvent>,
    ) -> Result<(), WorkflowError> {
        if events.is_empty() {
            return Ok(());
        }
        self.record(&party, &events)?;
        self.parties.put(party, events.len());
        Ok(())
    }

    /// Stage `party` unchanged so the commit fails if it moved since it was
    /// read. Used for parties whose state a decision depends on.
    pub(crate) fn guard_party(&mut self, party: Party) {
        if self.parties.get(party.id()).is_none() {
            self.parties.put(party, 0);
        }
    }

    pub(crate) fn stage_transaction(
        &mut self,
        transaction: SupplyItemTransaction,
        events: Vec<TransactionEvent>,
    ) -> Result<(), WorkflowError> {
        if events.is_empty() {
            return Ok(());
        }
        self.record(&transaction, &events)?;
        self.transactions.put(transaction, events.len());
        Ok(())
    }

    pub(crate) fn stage_request(
        &mut self,
        request: SupplyItemRequest,
        events: Vec<RequestEvent>,
    ) -> Result<(), WorkflowError> {
        if events.is_empty() {
            return Ok(());
        }
        self.record(&request, &events)?;
        self.requests.put(request, events.len());
        Ok(())
    }

    pub(crate) fn staged_request(&self, id: RequestId) -> Option<&SupplyItemRequest> {
        self.requests.get(&id)
    }

    /// Staged requests linked to `transaction_id`.
    pub(crate) fn staged_requests_for(
        &self,
        transaction_id: TransactionId,
    ) -> impl Iterator<Item = &SupplyItemRequest> {
        self.requests
            .values()
            .filter(move |r| r.transaction_id() == transaction_id)
    }

    /// Wrap `events` (already applied to `aggregate`) into envelopes.
    ///
    /// Sequence numbers are the versions the aggregate reached by each event.
    fn record<A>(&mut self, aggregate: &A, events: &[A::Event]) -> Result<(), WorkflowError>
    where
        A: supplyline_core::Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let aggregate_id: AggregateId = (*aggregate.id()).into();
        let first = aggregate.version() + 1 - events.len() as u64;

        for (offset, event) in events.iter().enumerate() {
            let payload = serde_json::to_value(event)?;
            self.events.push(EventEnvelope::new(
                self.correlation_id,
                aggregate_id,
                A::AGGREGATE_TYPE,
                first + offset as u64,
                event.event_type(),
                event.version(),
                event.occurred_at(),
                self.actor,
                payload,
            ));
        }
        Ok(())
    }

    /// Split into the store change set and the envelopes to publish.
    pub(crate) fn into_change_set(self) -> (ChangeSet, Vec<EventEnvelope<JsonValue>>) {
        let published = self.events.clone();
        let changes = ChangeSet {
            items: self.items.entries,
            parties: self.parties.entries,
            transactions: self.transactions.entries,
            requests: self.requests.entries,
            events: self.events,
        };
        (changes, published)
    }
}
