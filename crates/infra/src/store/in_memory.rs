use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use supplyline_catalog::{SupplyItem, SupplyItemId};
use supplyline_core::AggregateRoot;
use supplyline_events::EventEnvelope;
use supplyline_ledger::{SupplyItemTransaction, TransactionId};
use supplyline_parties::{Party, PartyId, PartyKind};
use supplyline_requests::{RequestId, SupplyItemRequest};

use super::r#trait::{
    ChangeSet, RequestFilter, StoreError, SupplyStore, TransactionFilter, check_version,
};

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<SupplyItemId, SupplyItem>,
    parties: BTreeMap<PartyId, Party>,
    transactions: BTreeMap<TransactionId, SupplyItemTransaction>,
    requests: BTreeMap<RequestId, SupplyItemRequest>,
    journal: Vec<EventEnvelope<JsonValue>>,
}

/// In-memory supply store.
///
/// Intended for tests/dev. One lock guards every table, so a commit is
/// atomic with respect to all readers.
#[derive(Debug, Default)]
pub struct InMemorySupplyStore {
    tables: RwLock<Tables>,
}

impl InMemorySupplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn validate(tables: &Tables, changes: &ChangeSet) -> Result<(), StoreError> {
        for staged in &changes.items {
            let stored = tables.items.get(staged.value.id()).map(|i| i.version());
            check_version(staged, stored)?;
        }
        for staged in &changes.parties {
            let stored = tables.parties.get(staged.value.id()).map(|p| p.version());
            check_version(staged, stored)?;
        }
        for staged in &changes.transactions {
            let stored = tables
                .transactions
                .get(staged.value.id())
                .map(|t| t.version());
            check_version(staged, stored)?;
        }
        for staged in &changes.requests {
            let stored = tables.requests.get(staged.value.id()).map(|r| r.version());
            check_version(staged, stored)?;
        }

        // SKU uniqueness across stored items and the change set itself.
        let mut skus: BTreeMap<&str, SupplyItemId> = tables
            .items
            .values()
            .map(|item| (item.sku(), item.id_typed()))
            .collect();
        for staged in &changes.items {
            let item = &staged.value;
            skus.retain(|_, id| *id != item.id_typed());
        }
        for staged in &changes.items {
            let item = &staged.value;
            if let Some(owner) = skus.insert(item.sku(), item.id_typed()) {
                if owner != item.id_typed() {
                    return Err(StoreError::UniqueViolation(format!(
                        "sku '{}' already used by item {owner}",
                        item.sku()
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SupplyStore for InMemorySupplyStore {
    fn load_item(&self, id: SupplyItemId) -> Result<Option<SupplyItem>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    fn find_item_by_sku(&self, sku: &str) -> Result<Option<SupplyItem>, StoreError> {
        Ok(self
            .read()?
            .items
            .values()
            .find(|item| item.sku() == sku)
            .cloned())
    }

    fn list_items(&self) -> Result<Vec<SupplyItem>, StoreError> {
        Ok(self.read()?.items.values().cloned().collect())
    }

    fn load_party(&self, id: PartyId) -> Result<Option<Party>, StoreError> {
        Ok(self.read()?.parties.get(&id).cloned())
    }

    fn list_parties(&self, kind: Option<PartyKind>) -> Result<Vec<Party>, StoreError> {
        Ok(self
            .read()?
            .parties
            .values()
            .filter(|party| kind.is_none_or(|k| party.kind() == k))
            .cloned()
            .collect())
    }

    fn load_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<SupplyItemTransaction>, StoreError> {
        Ok(self.read()?.transactions.get(&id).cloned())
    }

    fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<SupplyItemTransaction>, StoreError> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    fn load_request(&self, id: RequestId) -> Result<Option<SupplyItemRequest>, StoreError> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    fn requests_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<SupplyItemRequest>, StoreError> {
        Ok(self
            .read()?
            .requests
            .values()
            .filter(|request| request.transaction_id() == transaction_id)
            .cloned()
            .collect())
    }

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<SupplyItemRequest>, StoreError> {
        Ok(self
            .read()?
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect())
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;

        // Validate everything before touching any table.
        Self::validate(&tables, &changes)?;

        for staged in changes.items {
            tables.items.insert(staged.value.id_typed(), staged.value);
        }
        for staged in changes.parties {
            tables.parties.insert(staged.value.id_typed(), staged.value);
        }
        for staged in changes.transactions {
            tables
                .transactions
                .insert(staged.value.id_typed(), staged.value);
        }
        for staged in changes.requests {
            tables.requests.insert(staged.value.id_typed(), staged.value);
        }
        tables.journal.extend(changes.events);

        Ok(())
    }

    fn journal(&self) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError> {
        Ok(self.read()?.journal.clone())
    }
}
