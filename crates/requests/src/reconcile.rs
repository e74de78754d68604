//! Ledger-to-request status propagation.
//!
//! Every ledger mutation is followed, in the same unit of work, by
//! [`on_transaction_status_changed`], which pushes the status implied by the
//! entry onto the request(s) linked to it. Propagation is best-effort: a
//! request that cannot legally move is left alone and reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplyline_core::DomainError;
use supplyline_events::execute;
use supplyline_ledger::{SupplyItemTransaction, TransactionId, TransactionStatus, TransactionType};

use crate::request::{
    ReconcileStatus, RequestCommand, RequestEvent, RequestId, RequestStatus, SupplyItemRequest,
};

/// Request status implied by a ledger entry's `(type, status)`.
///
/// `None` means the entry does not propagate (freshly recorded entries).
pub fn request_status_for(
    transaction_type: TransactionType,
    status: TransactionStatus,
) -> Option<RequestStatus> {
    match (transaction_type, status) {
        (_, TransactionStatus::New) => None,
        (TransactionType::Delivery, TransactionStatus::Processing) => {
            Some(RequestStatus::ForDelivery)
        }
        (TransactionType::Return, TransactionStatus::Processing) => Some(RequestStatus::ForReturn),
        (_, TransactionStatus::Processing) => Some(RequestStatus::Approved),
        (_, TransactionStatus::Completed) => Some(RequestStatus::Completed),
        (_, TransactionStatus::Cancelled) => Some(RequestStatus::Rejected),
    }
}

/// A linked request the ledger could not move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRequest {
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub reason: String,
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub target: Option<RequestStatus>,
    /// Requests whose status changed.
    pub updated: Vec<RequestId>,
    pub skipped: Vec<SkippedRequest>,
    /// Events produced by the updated requests, in order.
    pub events: Vec<(RequestId, RequestEvent)>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Propagate `transaction`'s current status onto its linked requests.
///
/// Requests not linked to `transaction` are ignored. Matching requests are
/// mutated in place; callers persist the ones listed in `updated`.
pub fn on_transaction_status_changed<'a, I>(
    transaction: &SupplyItemTransaction,
    linked: I,
    occurred_at: DateTime<Utc>,
) -> Reconciliation
where
    I: IntoIterator<Item = &'a mut SupplyItemRequest>,
{
    let transaction_id: TransactionId = transaction.id_typed();
    let target = request_status_for(transaction.transaction_type(), transaction.status());

    let mut outcome = Reconciliation {
        target,
        ..Reconciliation::default()
    };

    let Some(target) = target else {
        return outcome;
    };

    for request in linked {
        if request.transaction_id() != transaction_id || request.status() == target {
            continue;
        }

        let request_id = request.id_typed();
        let from = request.status();
        let command = RequestCommand::ReconcileStatus(ReconcileStatus {
            request_id,
            transaction_id,
            status: target,
            occurred_at,
        });

        match execute(request, &command) {
            Ok(events) => {
                outcome.updated.push(request_id);
                outcome
                    .events
                    .extend(events.into_iter().map(|event| (request_id, event)));
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %request_id,
                    transaction_id = %transaction_id,
                    from = %from,
                    to = %target,
                    error = %err,
                    "skipping request reconciliation"
                );
                outcome.skipped.push(SkippedRequest {
                    request_id,
                    from,
                    to: target,
                    reason: describe(&err),
                });
            }
        }
    }

    outcome
}

fn describe(err: &DomainError) -> String {
    match err {
        DomainError::InvalidState(msg) | DomainError::Consistency(msg) => msg.clone(),
        other => other.to_string(),
    }
}
