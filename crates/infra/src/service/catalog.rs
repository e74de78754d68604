//! Catalog maintenance and manual stock movements.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use supplyline_auth::{AuthzError, Permission, Principal, Role, authorize};
use supplyline_catalog::{
    ChangeStatus, CreateItem, ItemDetails, ItemStatus, MoveStock, StockMovement, SupplyItem,
    SupplyItemCommand, SupplyItemId, UpdateDetails,
};
use supplyline_events::{EventBus, EventEnvelope, execute};
use supplyline_ledger::{
    RecordTransaction, SupplyItemTransaction, TransactionCommand, TransactionId, TransactionType,
};
use supplyline_parties::PartyId;

use super::{SupplyService, UnitOfWork};
use crate::error::WorkflowError;
use crate::store::SupplyStore;

/// Input of [`SupplyService::create_item`].
///
/// Omitted reorder level and lead time take the configured defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub unit_of_measure: String,
    pub reorder_level: Option<i64>,
    /// Cost in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
    pub lead_time_days: Option<u32>,
    pub expiration_date: Option<NaiveDate>,
}

impl<S, B> SupplyService<S, B>
where
    S: SupplyStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Define a new item. It starts active with quantity 0.
    pub fn create_item(
        &self,
        principal: &Principal,
        new_item: NewItem,
    ) -> Result<SupplyItemId, WorkflowError> {
        authorize(principal, Permission::CatalogManage)?;

        let sku = new_item.sku.trim().to_string();
        if self.store.find_item_by_sku(&sku)?.is_some() {
            return Err(WorkflowError::Conflict(format!("sku '{sku}' already exists")));
        }

        let item_id = SupplyItemId::generate();
        let mut item = SupplyItem::empty(item_id);
        let events = execute(
            &mut item,
            &SupplyItemCommand::CreateItem(CreateItem {
                item_id,
                sku: sku.clone(),
                details: ItemDetails {
                    name: new_item.name,
                    description: new_item.description,
                    category: new_item.category,
                    unit_of_measure: new_item.unit_of_measure,
                    reorder_level: new_item
                        .reorder_level
                        .unwrap_or(self.config.default_reorder_level),
                    unit_cost: new_item.unit_cost,
                    lead_time_days: new_item
                        .lead_time_days
                        .unwrap_or(self.config.default_lead_time_days),
                    expiration_date: new_item.expiration_date,
                },
                occurred_at: Utc::now(),
            }),
        )?;

        let mut uow = UnitOfWork::new(Some(principal.user_id));
        uow.stage_item(item, events)?;
        self.commit(uow)?;

        tracing::info!(item_id = %item_id, sku = %sku, "supply item created");
        Ok(item_id)
    }

    pub fn update_item_details(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        details: ItemDetails,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::CatalogManage)?;

        self.locks.with_item(item_id, || {
            let mut item = self.load_item(item_id)?;
            let events = execute(
                &mut item,
                &SupplyItemCommand::UpdateDetails(UpdateDetails {
                    item_id,
                    details,
                    occurred_at: Utc::now(),
                }),
            )?;

            let mut uow = UnitOfWork::new(Some(principal.user_id));
            uow.stage_item(item, events)?;
            self.commit(uow)
        })?;

        tracing::info!(item_id = %item_id, "supply item details updated");
        Ok(())
    }

    pub fn change_item_status(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        status: ItemStatus,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::CatalogManage)?;

        self.locks.with_item(item_id, || {
            let mut item = self.load_item(item_id)?;
            let events = execute(
                &mut item,
                &SupplyItemCommand::ChangeStatus(ChangeStatus {
                    item_id,
                    status,
                    occurred_at: Utc::now(),
                }),
            )?;

            let mut uow = UnitOfWork::new(Some(principal.user_id));
            uow.stage_item(item, events)?;
            self.commit(uow)
        })?;

        tracing::info!(item_id = %item_id, status = ?status, "supply item status changed");
        Ok(())
    }

    /// Book incoming stock. Suppliers may only deliver items assigned to them,
    /// and only once approved.
    pub fn receive_stock(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        quantity: i64,
    ) -> Result<TransactionId, WorkflowError> {
        authorize(principal, Permission::StockReceive)?;

        if principal.is(Role::Supplier) {
            let profile = principal.profile.ok_or(AuthzError::MissingProfile)?;
            let supplier = self.load_party(PartyId::new(profile))?;
            if !supplier.supplies(item_id) {
                return Err(WorkflowError::Unauthorized(format!(
                    "supplier {} may not deliver item {item_id}",
                    supplier.id_typed()
                )));
            }
        }

        self.manual_movement(
            principal,
            item_id,
            quantity,
            StockMovement::Receipt,
            TransactionType::Received,
        )
    }

    /// Book outgoing stock outside the request flow.
    pub fn issue_stock(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        quantity: i64,
    ) -> Result<TransactionId, WorkflowError> {
        authorize(principal, Permission::StockIssue)?;

        self.manual_movement(
            principal,
            item_id,
            quantity,
            StockMovement::Issue,
            TransactionType::Issued,
        )
    }

    fn manual_movement(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        quantity: i64,
        movement: StockMovement,
        transaction_type: TransactionType,
    ) -> Result<TransactionId, WorkflowError> {
        let transaction_id = self.locks.with_item(item_id, || {
            let now = Utc::now();
            let mut uow = UnitOfWork::new(Some(principal.user_id));

            let mut item = self.load_item(item_id)?;
            let item_events = execute(
                &mut item,
                &SupplyItemCommand::MoveStock(MoveStock {
                    item_id,
                    movement,
                    quantity,
                    occurred_at: now,
                }),
            )?;
            uow.stage_item(item, item_events)?;

            let transaction_id = TransactionId::generate();
            let mut transaction = SupplyItemTransaction::empty(transaction_id);
            let tx_events = execute(
                &mut transaction,
                &TransactionCommand::RecordTransaction(RecordTransaction {
                    transaction_id,
                    supply_item: item_id,
                    customer: None,
                    quantity,
                    transaction_type,
                    initiated_by: Some(principal.user_id),
                    occurred_at: now,
                }),
            )?;
            uow.stage_transaction(transaction.clone(), tx_events)?;
            self.reconcile(&mut uow, &transaction, now)?;

            self.commit(uow)?;
            Ok::<_, WorkflowError>(transaction_id)
        })?;

        tracing::info!(
            item_id = %item_id,
            transaction_id = %transaction_id,
            movement = ?movement,
            quantity,
            "stock moved"
        );
        Ok(transaction_id)
    }

    pub fn get_item(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
    ) -> Result<SupplyItem, WorkflowError> {
        authorize(principal, Permission::CatalogView)?;
        self.load_item(item_id)
    }

    pub fn list_items(&self, principal: &Principal) -> Result<Vec<SupplyItem>, WorkflowError> {
        authorize(principal, Permission::CatalogView)?;
        Ok(self.store.list_items()?)
    }

    /// Active items at or below their reorder level.
    pub fn low_stock_items(&self, principal: &Principal) -> Result<Vec<SupplyItem>, WorkflowError> {
        authorize(principal, Permission::CatalogView)?;
        Ok(self
            .store
            .list_items()?
            .into_iter()
            .filter(|item| item.status() == ItemStatus::Active && item.needs_reorder())
            .collect())
    }
}
