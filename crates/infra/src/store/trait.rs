use serde_json::Value as JsonValue;
use thiserror::Error;

use supplyline_catalog::{SupplyItem, SupplyItemId};
use supplyline_core::{AggregateRoot, ExpectedVersion};
use supplyline_events::EventEnvelope;
use supplyline_ledger::{SupplyItemTransaction, TransactionId, TransactionStatus, TransactionType};
use supplyline_parties::{Party, PartyId, PartyKind};
use supplyline_requests::{RequestId, RequestStatus, SupplyItemRequest};

/// Store operation error.
///
/// Infrastructure failures, as opposed to domain errors (validation,
/// invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency check failed for a staged aggregate.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// An aggregate staged for commit, with the version it was loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged<A> {
    pub expected: ExpectedVersion,
    pub value: A,
}

/// Everything one workflow operation writes, committed all-or-nothing.
///
/// `events` are appended to the store's journal in the same write.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub items: Vec<Staged<SupplyItem>>,
    pub parties: Vec<Staged<Party>>,
    pub transactions: Vec<Staged<SupplyItemTransaction>>,
    pub requests: Vec<Staged<SupplyItemRequest>>,
    pub events: Vec<EventEnvelope<JsonValue>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.parties.is_empty()
            && self.transactions.is_empty()
            && self.requests.is_empty()
    }
}

/// Request listing filter. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub customer: Option<PartyId>,
    pub supply_item: Option<SupplyItemId>,
}

impl RequestFilter {
    pub fn matches(&self, request: &SupplyItemRequest) -> bool {
        self.status.is_none_or(|s| request.status() == s)
            && self.customer.is_none_or(|c| request.customer() == c)
            && self.supply_item.is_none_or(|i| request.supply_item() == i)
    }
}

/// Ledger listing filter. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub supply_item: Option<SupplyItemId>,
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &SupplyItemTransaction) -> bool {
        self.supply_item.is_none_or(|i| transaction.supply_item() == i)
            && self.status.is_none_or(|s| transaction.status() == s)
            && self
                .transaction_type
                .is_none_or(|t| transaction.transaction_type() == t)
    }
}

/// Persistence contract for the supply aggregates.
///
/// Implementations must make [`SupplyStore::commit`] atomic: either every
/// staged aggregate (and journal event) is written or none is. They must
/// reject a commit whose staged versions are stale, and enforce SKU
/// uniqueness across items.
///
/// Listings return aggregates ordered by id (ids are time-ordered).
pub trait SupplyStore: Send + Sync {
    fn load_item(&self, id: SupplyItemId) -> Result<Option<SupplyItem>, StoreError>;

    fn find_item_by_sku(&self, sku: &str) -> Result<Option<SupplyItem>, StoreError>;

    fn list_items(&self) -> Result<Vec<SupplyItem>, StoreError>;

    fn load_party(&self, id: PartyId) -> Result<Option<Party>, StoreError>;

    fn list_parties(&self, kind: Option<PartyKind>) -> Result<Vec<Party>, StoreError>;

    fn load_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<SupplyItemTransaction>, StoreError>;

    fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<SupplyItemTransaction>, StoreError>;

    fn load_request(&self, id: RequestId) -> Result<Option<SupplyItemRequest>, StoreError>;

    /// Requests linked to the given ledger entry.
    fn requests_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<SupplyItemRequest>, StoreError>;

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<SupplyItemRequest>, StoreError>;

    /// Atomically write a change set.
    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;

    /// Every committed event, in commit order.
    fn journal(&self) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError>;
}

impl<S: SupplyStore + ?Sized> SupplyStore for std::sync::Arc<S> {
    fn load_item(&self, id: SupplyItemId) -> Result<Option<SupplyItem>, StoreError> {
        (**self).load_item(id)
    }

    fn find_item_by_sku(&self, sku: &str) -> Result<Option<SupplyItem>, StoreError> {
        (**self).find_item_by_sku(sku)
    }

    fn list_items(&self) -> Result<Vec<SupplyItem>, StoreError> {
        (**self).list_items()
    }

    fn load_party(&self, id: PartyId) -> Result<Option<Party>, StoreError> {
        (**self).load_party(id)
    }

    fn list_parties(&self, kind: Option<PartyKind>) -> Result<Vec<Party>, StoreError> {
        (**self).list_parties(kind)
    }

    fn load_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<SupplyItemTransaction>, StoreError> {
        (**self).load_transaction(id)
    }

    fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<SupplyItemTransaction>, StoreError> {
        (**self).list_transactions(filter)
    }

    fn load_request(&self, id: RequestId) -> Result<Option<SupplyItemRequest>, StoreError> {
        (**self).load_request(id)
    }

    fn requests_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<SupplyItemRequest>, StoreError> {
        (**self).requests_for_transaction(transaction_id)
    }

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<SupplyItemRequest>, StoreError> {
        (**self).list_requests(filter)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        (**self).commit(changes)
    }

    fn journal(&self) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError> {
        (**self).journal()
    }
}

/// Check a staged aggregate's expectation against the stored version.
pub(crate) fn check_version<A: AggregateRoot>(
    staged: &Staged<A>,
    stored: Option<u64>,
) -> Result<(), StoreError> {
    if staged.expected.matches(stored) {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "{} {:?}: expected {:?}, found {:?}",
            A::AGGREGATE_TYPE,
            staged.value.id(),
            staged.expected,
            stored
        )))
    }
}
