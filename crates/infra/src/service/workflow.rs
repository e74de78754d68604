//! Customer request workflow and ledger processing.

use chrono::Utc;
use serde_json::Value as JsonValue;

use supplyline_auth::{AuthzError, Permission, Principal, Role, authorize, ensure_own_profile};
use supplyline_catalog::{MoveStock, StockMovement, SupplyItemCommand, SupplyItemId};
use supplyline_core::AggregateId;
use supplyline_events::{EventBus, EventEnvelope, execute};
use supplyline_ledger::{
    BeginProcessing, CancelTransaction, CompleteTransaction, RecordTransaction,
    ScheduleTransaction, SupplyItemTransaction, TransactionCommand, TransactionId,
    TransactionType,
};
use supplyline_parties::{PartyId, PartyKind};
use supplyline_requests::{
    ApproveRequest, Reconciliation, RejectRequest, RequestCommand, RequestId, SubmitRequest,
    SupplyItemRequest,
};

use super::{SupplyService, UnitOfWork};
use crate::error::WorkflowError;
use crate::store::{RequestFilter, SupplyStore, TransactionFilter};

impl<S, B> SupplyService<S, B>
where
    S: SupplyStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a pending request, reserving `quantity` from the item and
    /// recording the matching ledger entry, all in one commit.
    pub fn create_request(
        &self,
        principal: &Principal,
        item_id: SupplyItemId,
        customer_id: PartyId,
        quantity: i64,
    ) -> Result<RequestId, WorkflowError> {
        authorize(principal, Permission::RequestCreate)?;
        ensure_own_profile(principal, customer_id.into())?;

        if quantity <= 0 {
            return Err(WorkflowError::validation("quantity must be positive"));
        }

        let customer = self.load_party(customer_id)?;
        if customer.kind() != PartyKind::Customer {
            return Err(WorkflowError::validation(format!(
                "party {customer_id} is not a customer"
            )));
        }
        if !customer.can_transact() {
            return Err(WorkflowError::InvalidState(format!(
                "customer {customer_id} is suspended"
            )));
        }

        let (request_id, transaction_id) = self.locks.with_item(item_id, || {
            let now = Utc::now();
            let mut uow = UnitOfWork::new(Some(principal.user_id));
            uow.guard_party(customer.clone());

            let mut item = self.load_item(item_id)?;
            let item_events = execute(
                &mut item,
                &SupplyItemCommand::MoveStock(MoveStock {
                    item_id,
                    movement: StockMovement::RequestReservation,
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
                    customer: Some(customer_id),
                    quantity,
                    transaction_type: TransactionType::Requested,
                    initiated_by: Some(principal.user_id),
                    occurred_at: now,
                }),
            )?;
            uow.stage_transaction(transaction.clone(), tx_events)?;

            let request_id = RequestId::generate();
            let mut request = SupplyItemRequest::empty(request_id);
            let request_events = execute(
                &mut request,
                &RequestCommand::SubmitRequest(SubmitRequest {
                    request_id,
                    supply_item: item_id,
                    customer: customer_id,
                    quantity,
                    transaction_id,
                    occurred_at: now,
                }),
            )?;
            uow.stage_request(request, request_events)?;
            self.reconcile(&mut uow, &transaction, now)?;

            self.commit(uow)?;
            Ok::<_, WorkflowError>((request_id, transaction_id))
        })?;

        tracing::info!(
            request_id = %request_id,
            transaction_id = %transaction_id,
            item_id = %item_id,
            customer_id = %customer_id,
            quantity,
            "supply request created"
        );
        Ok(request_id)
    }

    /// Approve a pending request; its ledger entry starts processing.
    pub fn approve_request(
        &self,
        principal: &Principal,
        request_id: RequestId,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::RequestReview)?;
        let item_id = self.load_request(request_id)?.supply_item();

        self.locks.with_item(item_id, || {
            let now = Utc::now();
            let mut uow = UnitOfWork::new(Some(principal.user_id));

            let mut request = self.load_request(request_id)?;
            let request_events = execute(
                &mut request,
                &RequestCommand::ApproveRequest(ApproveRequest {
                    request_id,
                    reviewed_by: principal.user_id,
                    occurred_at: now,
                }),
            )?;

            let mut transaction = self.linked_transaction(&request)?;
            let transaction_id = transaction.id_typed();
            uow.stage_request(request, request_events)?;

            let tx_events = execute(
                &mut transaction,
                &TransactionCommand::BeginProcessing(BeginProcessing {
                    transaction_id,
                    approved_by: principal.user_id,
                    occurred_at: now,
                }),
            )?;
            uow.stage_transaction(transaction.clone(), tx_events)?;
            self.reconcile(&mut uow, &transaction, now)?;

            self.commit(uow)
        })?;

        tracing::info!(request_id = %request_id, reviewer = %principal.user_id, "supply request approved");
        Ok(())
    }

    /// Reject a pending request; its ledger entry is cancelled and the
    /// reserved quantity returns to the item.
    pub fn reject_request(
        &self,
        principal: &Principal,
        request_id: RequestId,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::RequestReview)?;
        let item_id = self.load_request(request_id)?.supply_item();

        self.locks.with_item(item_id, || {
            let now = Utc::now();
            let mut uow = UnitOfWork::new(Some(principal.user_id));

            let mut request = self.load_request(request_id)?;
            let request_events = execute(
                &mut request,
                &RequestCommand::RejectRequest(RejectRequest {
                    request_id,
                    reviewed_by: principal.user_id,
                    reason,
                    occurred_at: now,
                }),
            )?;

            let mut transaction = self.linked_transaction(&request)?;
            let transaction_id = transaction.id_typed();
            let quantity = request.quantity();
            uow.stage_request(request, request_events)?;

            let tx_events = execute(
                &mut transaction,
                &TransactionCommand::CancelTransaction(CancelTransaction {
                    transaction_id,
                    occurred_at: now,
                }),
            )?;
            uow.stage_transaction(transaction.clone(), tx_events)?;

            let mut item = self.store.load_item(item_id)?.ok_or_else(|| {
                WorkflowError::consistency(format!(
                    "request {request_id} references missing item {item_id}"
                ))
            })?;
            let item_events = execute(
                &mut item,
                &SupplyItemCommand::MoveStock(MoveStock {
                    item_id,
                    movement: StockMovement::RequestRelease,
                    quantity,
                    occurred_at: now,
                }),
            )?;
            uow.stage_item(item, item_events)?;
            self.reconcile(&mut uow, &transaction, now)?;

            self.commit(uow)
        })?;

        tracing::info!(request_id = %request_id, reviewer = %principal.user_id, "supply request rejected");
        Ok(())
    }

    /// Complete a processing ledger entry. Stock is not touched.
    pub fn complete_transaction(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::TransactionProcess)?;
        self.process_transaction(principal, transaction_id, |now| {
            TransactionCommand::CompleteTransaction(CompleteTransaction {
                transaction_id,
                occurred_at: now,
            })
        })?;

        tracing::info!(transaction_id = %transaction_id, "transaction completed");
        Ok(())
    }

    /// Turn a processing REQUESTED entry into a DELIVERY or RETURN.
    pub fn schedule_transaction(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        kind: TransactionType,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::TransactionProcess)?;
        self.process_transaction(principal, transaction_id, |now| {
            TransactionCommand::ScheduleTransaction(ScheduleTransaction {
                transaction_id,
                kind,
                occurred_at: now,
            })
        })?;

        tracing::info!(transaction_id = %transaction_id, kind = %kind, "transaction scheduled");
        Ok(())
    }

    /// Re-run reconciliation for a ledger entry in its own unit of work.
    ///
    /// Workflow operations already reconcile after every ledger mutation; this
    /// entry point repairs requests whose propagation was skipped.
    pub fn on_transaction_status_changed(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
    ) -> Result<Reconciliation, WorkflowError> {
        authorize(principal, Permission::TransactionProcess)?;
        let item_id = self.load_transaction(transaction_id)?.supply_item();

        self.locks.with_item(item_id, || {
            let transaction = self.load_transaction(transaction_id)?;
            let mut uow = UnitOfWork::new(Some(principal.user_id));
            let outcome = self.reconcile(&mut uow, &transaction, Utc::now())?;
            self.commit(uow)?;
            Ok::<_, WorkflowError>(outcome)
        })
    }

    pub fn get_request(
        &self,
        principal: &Principal,
        request_id: RequestId,
    ) -> Result<SupplyItemRequest, WorkflowError> {
        authorize(principal, Permission::RequestView)?;
        let request = self.load_request(request_id)?;
        if principal.is(Role::Customer) {
            ensure_own_profile(principal, request.customer().into())?;
        }
        Ok(request)
    }

    /// List requests. Customers only ever see their own.
    pub fn list_requests(
        &self,
        principal: &Principal,
        filter: RequestFilter,
    ) -> Result<Vec<SupplyItemRequest>, WorkflowError> {
        authorize(principal, Permission::RequestView)?;

        let mut filter = filter;
        if principal.is(Role::Customer) {
            let own = PartyId::new(principal.profile.ok_or(AuthzError::MissingProfile)?);
            if let Some(requested) = filter.customer {
                ensure_own_profile(principal, AggregateId::from(requested))?;
            }
            filter.customer = Some(own);
        }

        Ok(self.store.list_requests(&filter)?)
    }

    pub fn get_transaction(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
    ) -> Result<SupplyItemTransaction, WorkflowError> {
        authorize(principal, Permission::LedgerView)?;
        self.load_transaction(transaction_id)
    }

    pub fn list_transactions(
        &self,
        principal: &Principal,
        filter: TransactionFilter,
    ) -> Result<Vec<SupplyItemTransaction>, WorkflowError> {
        authorize(principal, Permission::LedgerView)?;
        Ok(self.store.list_transactions(&filter)?)
    }

    fn load_request(&self, id: RequestId) -> Result<SupplyItemRequest, WorkflowError> {
        self.store
            .load_request(id)?
            .ok_or_else(|| WorkflowError::not_found(format!("request {id}")))
    }

    /// The ledger entry linked to `request`, cross-checked against its triple.
    fn linked_transaction(
        &self,
        request: &SupplyItemRequest,
    ) -> Result<SupplyItemTransaction, WorkflowError> {
        let transaction_id = request.transaction_id();
        let transaction = self.store.load_transaction(transaction_id)?.ok_or_else(|| {
            WorkflowError::consistency(format!(
                "request {} has no ledger entry {transaction_id}",
                request.id_typed()
            ))
        })?;

        if !transaction.matches(request.supply_item(), request.customer(), request.quantity()) {
            return Err(WorkflowError::consistency(format!(
                "ledger entry {transaction_id} does not match request {}",
                request.id_typed()
            )));
        }
        Ok(transaction)
    }

    fn process_transaction(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        command: impl FnOnce(chrono::DateTime<Utc>) -> TransactionCommand,
    ) -> Result<(), WorkflowError> {
        let item_id = self.load_transaction(transaction_id)?.supply_item();

        self.locks.with_item(item_id, || {
            let now = Utc::now();
            let mut uow = UnitOfWork::new(Some(principal.user_id));

            let mut transaction = self.load_transaction(transaction_id)?;
            let events = execute(&mut transaction, &command(now))?;
            uow.stage_transaction(transaction.clone(), events)?;
            self.reconcile(&mut uow, &transaction, now)?;

            self.commit(uow)
        })
    }
}
