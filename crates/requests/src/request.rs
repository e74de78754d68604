use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplyline_catalog::SupplyItemId;
use supplyline_core::{Aggregate, AggregateRoot, DomainError, UserId, aggregate_id};
use supplyline_events::Event;
use supplyline_ledger::TransactionId;
use supplyline_parties::PartyId;

aggregate_id!(
    /// Supply request identifier.
    RequestId
);

/// Request status lifecycle.
///
/// `Pending` moves by review (approve/reject); everything after `Approved` is
/// driven by the linked ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    ForDelivery,
    ForReturn,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::ForDelivery => "for_delivery",
            RequestStatus::ForReturn => "for_return",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }

    /// Transitions the ledger may push onto a request.
    pub fn can_reconcile_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, ForDelivery)
                | (Approved, ForReturn)
                | (Approved, Completed)
                | (ForDelivery, Completed)
                | (ForReturn, Completed)
        )
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: SupplyItemRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyItemRequest {
    id: RequestId,
    supply_item: SupplyItemId,
    customer: PartyId,
    quantity: i64,
    transaction_id: TransactionId,
    request_date: DateTime<Utc>,
    status: RequestStatus,
    reviewed_by: Option<UserId>,
    rejection_reason: Option<String>,
    version: u64,
    created: bool,
}

impl SupplyItemRequest {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            supply_item: SupplyItemId::nil(),
            customer: PartyId::nil(),
            quantity: 0,
            transaction_id: TransactionId::nil(),
            request_date: DateTime::<Utc>::UNIX_EPOCH,
            status: RequestStatus::Pending,
            reviewed_by: None,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn supply_item(&self) -> SupplyItemId {
        self.supply_item
    }

    pub fn customer(&self) -> PartyId {
        self.customer
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// The ledger entry created together with this request.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn request_date(&self) -> DateTime<Utc> {
        self.request_date
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for SupplyItemRequest {
    type Id = RequestId;

    const AGGREGATE_TYPE: &'static str = "requests.request";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub supply_item: SupplyItemId,
    pub customer: PartyId,
    pub quantity: i64,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub request_id: RequestId,
    pub reviewed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub request_id: RequestId,
    pub reviewed_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReconcileStatus.
///
/// Issued on behalf of the linked ledger entry. Already being in `status` is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStatus {
    pub request_id: RequestId,
    pub transaction_id: TransactionId,
    pub status: RequestStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    SubmitRequest(SubmitRequest),
    ApproveRequest(ApproveRequest),
    RejectRequest(RejectRequest),
    ReconcileStatus(ReconcileStatus),
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub request_id: RequestId,
    pub supply_item: SupplyItemId,
    pub customer: PartyId,
    pub quantity: i64,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub request_id: RequestId,
    pub reviewed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: RequestId,
    pub reviewed_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestStatusReconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatusReconciled {
    pub request_id: RequestId,
    pub transaction_id: TransactionId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestSubmitted(RequestSubmitted),
    RequestApproved(RequestApproved),
    RequestRejected(RequestRejected),
    RequestStatusReconciled(RequestStatusReconciled),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestSubmitted(_) => "requests.request.submitted",
            RequestEvent::RequestApproved(_) => "requests.request.approved",
            RequestEvent::RequestRejected(_) => "requests.request.rejected",
            RequestEvent::RequestStatusReconciled(_) => "requests.request.status_reconciled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestApproved(e) => e.occurred_at,
            RequestEvent::RequestRejected(e) => e.occurred_at,
            RequestEvent::RequestStatusReconciled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupplyItemRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestSubmitted(e) => {
                self.id = e.request_id;
                self.supply_item = e.supply_item;
                self.customer = e.customer;
                self.quantity = e.quantity;
                self.transaction_id = e.transaction_id;
                self.request_date = e.occurred_at;
                self.status = RequestStatus::Pending;
                self.created = true;
            }
            RequestEvent::RequestApproved(e) => {
                self.status = RequestStatus::Approved;
                self.reviewed_by = Some(e.reviewed_by);
            }
            RequestEvent::RequestRejected(e) => {
                self.status = RequestStatus::Rejected;
                self.reviewed_by = Some(e.reviewed_by);
                self.rejection_reason = e.reason.clone();
            }
            RequestEvent::RequestStatusReconciled(e) => {
                self.status = e.to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::ApproveRequest(cmd) => self.handle_approve(cmd),
            RequestCommand::RejectRequest(cmd) => self.handle_reject(cmd),
            RequestCommand::ReconcileStatus(cmd) => self.handle_reconcile(cmd),
        }
    }
}

impl SupplyItemRequest {
    fn ensure_existing(&self, request_id: RequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("request {request_id}")));
        }
        if self.id != request_id {
            return Err(DomainError::consistency("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status != RequestStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "request {} is {}, only pending requests can be reviewed",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("request already exists"));
        }

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            request_id: cmd.request_id,
            supply_item: cmd.supply_item,
            customer: cmd.customer,
            quantity: cmd.quantity,
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.request_id)?;
        self.ensure_pending()?;

        Ok(vec![RequestEvent::RequestApproved(RequestApproved {
            request_id: cmd.request_id,
            reviewed_by: cmd.reviewed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.request_id)?;
        self.ensure_pending()?;

        Ok(vec![RequestEvent::RequestRejected(RequestRejected {
            request_id: cmd.request_id,
            reviewed_by: cmd.reviewed_by,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reconcile(&self, cmd: &ReconcileStatus) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.request_id)?;

        if self.transaction_id != cmd.transaction_id {
            return Err(DomainError::consistency(format!(
                "request {} is not linked to transaction {}",
                self.id, cmd.transaction_id
            )));
        }

        if self.status == cmd.status {
            return Ok(vec![]);
        }

        if !self.status.can_reconcile_to(cmd.status) {
            return Err(DomainError::invalid_state(format!(
                "request {} cannot move from {} to {}",
                self.id, self.status, cmd.status
            )));
        }

        Ok(vec![RequestEvent::RequestStatusReconciled(RequestStatusReconciled {
            request_id: cmd.request_id,
            transaction_id: cmd.transaction_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(
        request: &mut SupplyItemRequest,
        cmd: RequestCommand,
    ) -> Result<Vec<RequestEvent>, DomainError> {
        let events = request.handle(&cmd)?;
        for e in &events {
            request.apply(e);
        }
        Ok(events)
    }

    fn submitted(quantity: i64) -> SupplyItemRequest {
        let request_id = RequestId::generate();
        let mut request = SupplyItemRequest::empty(request_id);
        run(
            &mut request,
            RequestCommand::SubmitRequest(SubmitRequest {
                request_id,
                supply_item: SupplyItemId::generate(),
                customer: PartyId::generate(),
                quantity,
                transaction_id: TransactionId::generate(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        request
    }

    fn approve(request: &mut SupplyItemRequest) -> Result<Vec<RequestEvent>, DomainError> {
        let request_id = request.id_typed();
        run(
            request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id,
                reviewed_by: UserId::new(),
                occurred_at: test_time(),
            }),
        )
    }

    fn reject(request: &mut SupplyItemRequest) -> Result<Vec<RequestEvent>, DomainError> {
        let request_id = request.id_typed();
        run(
            request,
            RequestCommand::RejectRequest(RejectRequest {
                request_id,
                reviewed_by: UserId::new(),
                reason: Some("out of budget".to_string()),
                occurred_at: test_time(),
            }),
        )
    }

    fn reconcile(
        request: &mut SupplyItemRequest,
        status: RequestStatus,
    ) -> Result<Vec<RequestEvent>, DomainError> {
        let request_id = request.id_typed();
        let transaction_id = request.transaction_id();
        run(
            request,
            RequestCommand::ReconcileStatus(ReconcileStatus {
                request_id,
                transaction_id,
                status,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn empty_request_links_nothing() {
        let request = SupplyItemRequest::empty(RequestId::generate());
        assert!(!request.is_created());
        assert!(request.transaction_id().is_nil());
        assert!(request.supply_item().is_nil());
        assert!(request.customer().is_nil());
        assert_eq!(request, SupplyItemRequest::empty(request.id_typed()));
    }

    #[test]
    fn submit_starts_pending() {
        let request = submitted(20);
        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(request.quantity(), 20);
        assert!(request.reviewed_by().is_none());
    }

    #[test]
    fn submit_rejects_non_positive_quantity() {
        let request = SupplyItemRequest::empty(RequestId::generate());
        for quantity in [0, -3] {
            let err = request
                .handle(&RequestCommand::SubmitRequest(SubmitRequest {
                    request_id: request.id_typed(),
                    supply_item: SupplyItemId::generate(),
                    customer: PartyId::generate(),
                    quantity,
                    transaction_id: TransactionId::generate(),
                    occurred_at: test_time(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn approve_only_once() {
        let mut request = submitted(5);
        approve(&mut request).unwrap();
        assert_eq!(request.status(), RequestStatus::Approved);
        let version = request.version();

        assert!(matches!(approve(&mut request), Err(DomainError::InvalidState(_))));
        assert!(matches!(reject(&mut request), Err(DomainError::InvalidState(_))));
        assert_eq!(request.version(), version);
    }

    #[test]
    fn reject_records_reason() {
        let mut request = submitted(5);
        reject(&mut request).unwrap();
        assert_eq!(request.status(), RequestStatus::Rejected);
        assert_eq!(request.rejection_reason(), Some("out of budget"));
        assert!(matches!(approve(&mut request), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn reconcile_to_current_status_is_a_noop() {
        let mut request = submitted(5);
        approve(&mut request).unwrap();
        let events = reconcile(&mut request, RequestStatus::Approved).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reconcile_follows_delivery_path() {
        let mut request = submitted(5);
        approve(&mut request).unwrap();
        reconcile(&mut request, RequestStatus::ForDelivery).unwrap();
        reconcile(&mut request, RequestStatus::Completed).unwrap();
        assert_eq!(request.status(), RequestStatus::Completed);
    }

    #[test]
    fn terminal_requests_do_not_reconcile() {
        let mut request = submitted(5);
        reject(&mut request).unwrap();
        let err = reconcile(&mut request, RequestStatus::Completed).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(request.status(), RequestStatus::Rejected);
    }

    #[test]
    fn reconcile_requires_the_linked_transaction() {
        let request = submitted(5);
        let err = request
            .handle(&RequestCommand::ReconcileStatus(ReconcileStatus {
                request_id: request.id_typed(),
                transaction_id: TransactionId::generate(),
                status: RequestStatus::Approved,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Consistency(_)));
    }

    #[test]
    fn reconcile_transition_table() {
        use RequestStatus::*;
        assert!(Pending.can_reconcile_to(Approved));
        assert!(Approved.can_reconcile_to(ForReturn));
        assert!(ForReturn.can_reconcile_to(Completed));
        assert!(!ForDelivery.can_reconcile_to(ForReturn));
        assert!(!Pending.can_reconcile_to(Completed));
        assert!(!Completed.can_reconcile_to(Rejected));
        assert!(!Rejected.can_reconcile_to(Approved));
    }
}
