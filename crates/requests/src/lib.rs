//! Customer supply requests and their reconciliation with the ledger.

pub mod reconcile;
pub mod request;

pub use reconcile::{Reconciliation, SkippedRequest, on_transaction_status_changed, request_status_for};
pub use request::{
    ApproveRequest, ReconcileStatus, RejectRequest, RequestApproved, RequestCommand, RequestEvent,
    RequestId, RequestRejected, RequestStatus, RequestStatusReconciled, RequestSubmitted,
    SubmitRequest, SupplyItemRequest,
};
