use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplyline_catalog::SupplyItemId;
use supplyline_core::{Aggregate, AggregateRoot, DomainError, UserId, aggregate_id};
use supplyline_events::Event;
use supplyline_parties::PartyId;

aggregate_id!(
    /// Ledger entry identifier.
    TransactionId
);

/// Kind of quantity movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Stock reserved by a customer request.
    Requested,
    /// A requested entry scheduled for delivery to the customer.
    Delivery,
    /// A requested entry scheduled for return.
    Return,
    /// Manual receipt of stock.
    Received,
    /// Manual issue of stock.
    Issued,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Requested => "requested",
            TransactionType::Delivery => "delivery",
            TransactionType::Return => "return",
            TransactionType::Received => "received",
            TransactionType::Issued => "issued",
        }
    }

    /// Manual movements are booked as already completed and carry no customer.
    pub fn is_manual(&self) -> bool {
        matches!(self, TransactionType::Received | TransactionType::Issued)
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry status. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    New,
    Processing,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::New => "new",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (New, Processing) | (New, Cancelled) | (Processing, Completed) | (Processing, Cancelled)
        )
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: SupplyItemTransaction (one ledger entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyItemTransaction {
    id: TransactionId,
    supply_item: SupplyItemId,
    customer: Option<PartyId>,
    quantity: i64,
    transaction_type: TransactionType,
    status: TransactionStatus,
    transaction_date: DateTime<Utc>,
    initiated_by: Option<UserId>,
    approved_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl SupplyItemTransaction {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            supply_item: SupplyItemId::nil(),
            customer: None,
            quantity: 0,
            transaction_type: TransactionType::Requested,
            status: TransactionStatus::New,
            transaction_date: DateTime::<Utc>::UNIX_EPOCH,
            initiated_by: None,
            approved_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn supply_item(&self) -> SupplyItemId {
        self.supply_item
    }

    pub fn customer(&self) -> Option<PartyId> {
        self.customer
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn transaction_date(&self) -> DateTime<Utc> {
        self.transaction_date
    }

    pub fn initiated_by(&self) -> Option<UserId> {
        self.initiated_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Whether this entry records the given `(item, customer, quantity)` triple.
    pub fn matches(&self, item: SupplyItemId, customer: PartyId, quantity: i64) -> bool {
        self.supply_item == item && self.customer == Some(customer) && self.quantity == quantity
    }
}

impl AggregateRoot for SupplyItemTransaction {
    type Id = TransactionId;

    const AGGREGATE_TYPE: &'static str = "ledger.transaction";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
///
/// `Requested` entries start as `New` and need a customer; manual
/// `Received`/`Issued` entries are booked as `Completed` without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction_id: TransactionId,
    pub supply_item: SupplyItemId,
    pub customer: Option<PartyId>,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub initiated_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BeginProcessing (NEW -> PROCESSING).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginProcessing {
    pub transaction_id: TransactionId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTransaction (PROCESSING -> COMPLETED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTransaction {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransaction {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ScheduleTransaction (REQUESTED -> DELIVERY | RETURN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTransaction {
    pub transaction_id: TransactionId,
    pub kind: TransactionType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    RecordTransaction(RecordTransaction),
    BeginProcessing(BeginProcessing),
    CompleteTransaction(CompleteTransaction),
    CancelTransaction(CancelTransaction),
    ScheduleTransaction(ScheduleTransaction),
}

/// Event: TransactionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub transaction_id: TransactionId,
    pub supply_item: SupplyItemId,
    pub customer: Option<PartyId>,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub initiated_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProcessingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStarted {
    pub transaction_id: TransactionId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCompleted {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCancelled {
    pub transaction_id: TransactionId,
    pub from: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionScheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionScheduled {
    pub transaction_id: TransactionId,
    pub kind: TransactionType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionRecorded(TransactionRecorded),
    ProcessingStarted(ProcessingStarted),
    TransactionCompleted(TransactionCompleted),
    TransactionCancelled(TransactionCancelled),
    TransactionScheduled(TransactionScheduled),
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionRecorded(_) => "ledger.transaction.recorded",
            TransactionEvent::ProcessingStarted(_) => "ledger.transaction.processing_started",
            TransactionEvent::TransactionCompleted(_) => "ledger.transaction.completed",
            TransactionEvent::TransactionCancelled(_) => "ledger.transaction.cancelled",
            TransactionEvent::TransactionScheduled(_) => "ledger.transaction.scheduled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionRecorded(e) => e.occurred_at,
            TransactionEvent::ProcessingStarted(e) => e.occurred_at,
            TransactionEvent::TransactionCompleted(e) => e.occurred_at,
            TransactionEvent::TransactionCancelled(e) => e.occurred_at,
            TransactionEvent::TransactionScheduled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupplyItemTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionRecorded(e) => {
                self.id = e.transaction_id;
                self.supply_item = e.supply_item;
                self.customer = e.customer;
                self.quantity = e.quantity;
                self.transaction_type = e.transaction_type;
                self.status = e.status;
                self.transaction_date = e.occurred_at;
                self.initiated_by = e.initiated_by;
                self.approved_by = None;
                self.created = true;
            }
            TransactionEvent::ProcessingStarted(e) => {
                self.status = TransactionStatus::Processing;
                self.approved_by = Some(e.approved_by);
            }
            TransactionEvent::TransactionCompleted(_) => {
                self.status = TransactionStatus::Completed;
            }
            TransactionEvent::TransactionCancelled(_) => {
                self.status = TransactionStatus::Cancelled;
            }
            TransactionEvent::TransactionScheduled(e) => {
                self.transaction_type = e.kind;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::RecordTransaction(cmd) => self.handle_record(cmd),
            TransactionCommand::BeginProcessing(cmd) => self.handle_begin_processing(cmd),
            TransactionCommand::CompleteTransaction(cmd) => self.handle_complete(cmd),
            TransactionCommand::CancelTransaction(cmd) => self.handle_cancel(cmd),
            TransactionCommand::ScheduleTransaction(cmd) => self.handle_schedule(cmd),
        }
    }
}

impl SupplyItemTransaction {
    fn ensure_existing(&self, transaction_id: TransactionId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("transaction {transaction_id}")));
        }
        if self.id != transaction_id {
            return Err(DomainError::consistency("transaction_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, next: TransactionStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(format!(
                "transaction {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transaction already exists"));
        }

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let status = match cmd.transaction_type {
            TransactionType::Requested => {
                if cmd.customer.is_none() {
                    return Err(DomainError::validation(
                        "requested transactions need a customer",
                    ));
                }
                TransactionStatus::New
            }
            TransactionType::Received | TransactionType::Issued => {
                if cmd.customer.is_some() {
                    return Err(DomainError::validation(
                        "manual stock movements carry no customer",
                    ));
                }
                TransactionStatus::Completed
            }
            TransactionType::Delivery | TransactionType::Return => {
                return Err(DomainError::validation(format!(
                    "{} entries are scheduled from requested ones, not recorded",
                    cmd.transaction_type
                )));
            }
        };

        Ok(vec![TransactionEvent::TransactionRecorded(TransactionRecorded {
            transaction_id: cmd.transaction_id,
            supply_item: cmd.supply_item,
            customer: cmd.customer,
            quantity: cmd.quantity,
            transaction_type: cmd.transaction_type,
            status,
            initiated_by: cmd.initiated_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_processing(
        &self,
        cmd: &BeginProcessing,
    ) -> Result<Vec<TransactionEvent>, DomainError> {
        self.ensure_existing(cmd.transaction_id)?;
        self.ensure_transition(TransactionStatus::Processing)?;

        Ok(vec![TransactionEvent::ProcessingStarted(ProcessingStarted {
            transaction_id: cmd.transaction_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(
        &self,
        cmd: &CompleteTransaction,
    ) -> Result<Vec<TransactionEvent>, DomainError> {
        self.ensure_existing(cmd.transaction_id)?;
        self.ensure_transition(TransactionStatus::Completed)?;

        Ok(vec![TransactionEvent::TransactionCompleted(TransactionCompleted {
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        self.ensure_existing(cmd.transaction_id)?;
        self.ensure_transition(TransactionStatus::Cancelled)?;

        Ok(vec![TransactionEvent::TransactionCancelled(TransactionCancelled {
            transaction_id: cmd.transaction_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_schedule(
        &self,
        cmd: &ScheduleTransaction,
    ) -> Result<Vec<TransactionEvent>, DomainError> {
        self.ensure_existing(cmd.transaction_id)?;

        if !matches!(cmd.kind, TransactionType::Delivery | TransactionType::Return) {
            return Err(DomainError::validation(format!(
                "cannot schedule a transaction as {}",
                cmd.kind
            )));
        }

        if self.status != TransactionStatus::Processing {
            return Err(DomainError::invalid_state(format!(
                "transaction {} is {}, only processing entries can be scheduled",
                self.id, self.status
            )));
        }

        if self.transaction_type != TransactionType::Requested {
            return Err(DomainError::invalid_state(format!(
                "transaction {} is already {}",
                self.id, self.transaction_type
            )));
        }

        Ok(vec![TransactionEvent::TransactionScheduled(TransactionScheduled {
            transaction_id: cmd.transaction_id,
            kind: cmd.kind,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(
        tx: &mut SupplyItemTransaction,
        cmd: TransactionCommand,
    ) -> Result<Vec<TransactionEvent>, DomainError> {
        let events = tx.handle(&cmd)?;
        for e in &events {
            tx.apply(e);
        }
        Ok(events)
    }

    fn requested(quantity: i64) -> SupplyItemTransaction {
        let transaction_id = TransactionId::generate();
        let mut tx = SupplyItemTransaction::empty(transaction_id);
        run(
            &mut tx,
            TransactionCommand::RecordTransaction(RecordTransaction {
                transaction_id,
                supply_item: SupplyItemId::generate(),
                customer: Some(PartyId::generate()),
                quantity,
                transaction_type: TransactionType::Requested,
                initiated_by: Some(UserId::new()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        tx
    }

    fn begin(tx: &mut SupplyItemTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        let transaction_id = tx.id_typed();
        run(
            tx,
            TransactionCommand::BeginProcessing(BeginProcessing {
                transaction_id,
                approved_by: UserId::new(),
                occurred_at: test_time(),
            }),
        )
    }

    fn complete(tx: &mut SupplyItemTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        let transaction_id = tx.id_typed();
        run(
            tx,
            TransactionCommand::CompleteTransaction(CompleteTransaction {
                transaction_id,
                occurred_at: test_time(),
            }),
        )
    }

    fn cancel(tx: &mut SupplyItemTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        let transaction_id = tx.id_typed();
        run(
            tx,
            TransactionCommand::CancelTransaction(CancelTransaction {
                transaction_id,
                occurred_at: test_time(),
            }),
        )
    }

    fn schedule(
        tx: &mut SupplyItemTransaction,
        kind: TransactionType,
    ) -> Result<Vec<TransactionEvent>, DomainError> {
        let transaction_id = tx.id_typed();
        run(
            tx,
            TransactionCommand::ScheduleTransaction(ScheduleTransaction {
                transaction_id,
                kind,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn empty_entry_is_deterministic() {
        let id = TransactionId::generate();
        let tx = SupplyItemTransaction::empty(id);
        assert!(!tx.is_created());
        assert!(tx.supply_item().is_nil());
        assert_eq!(tx, SupplyItemTransaction::empty(id));
    }

    #[test]
    fn requested_entry_starts_new() {
        let tx = requested(20);
        assert_eq!(tx.status(), TransactionStatus::New);
        assert_eq!(tx.transaction_type(), TransactionType::Requested);
        assert_eq!(tx.quantity(), 20);
        assert_eq!(tx.version(), 1);
    }

    #[test]
    fn manual_entries_are_booked_completed_without_customer() {
        let transaction_id = TransactionId::generate();
        let mut tx = SupplyItemTransaction::empty(transaction_id);
        run(
            &mut tx,
            TransactionCommand::RecordTransaction(RecordTransaction {
                transaction_id,
                supply_item: SupplyItemId::generate(),
                customer: None,
                quantity: 5,
                transaction_type: TransactionType::Received,
                initiated_by: Some(UserId::new()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(tx.status(), TransactionStatus::Completed);

        let other = SupplyItemTransaction::empty(TransactionId::generate());
        let err = other
            .handle(&TransactionCommand::RecordTransaction(RecordTransaction {
                transaction_id: other.id_typed(),
                supply_item: SupplyItemId::generate(),
                customer: Some(PartyId::generate()),
                quantity: 5,
                transaction_type: TransactionType::Issued,
                initiated_by: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn delivery_entries_cannot_be_recorded_directly() {
        let tx = SupplyItemTransaction::empty(TransactionId::generate());
        let err = tx
            .handle(&TransactionCommand::RecordTransaction(RecordTransaction {
                transaction_id: tx.id_typed(),
                supply_item: SupplyItemId::generate(),
                customer: Some(PartyId::generate()),
                quantity: 1,
                transaction_type: TransactionType::Delivery,
                initiated_by: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approve_then_complete() {
        let mut tx = requested(20);
        begin(&mut tx).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Processing);
        assert!(tx.approved_by().is_some());

        complete(&mut tx).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn complete_requires_processing() {
        let mut tx = requested(20);
        let err = complete(&mut tx).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(tx.status(), TransactionStatus::New);
    }

    #[test]
    fn final_states_do_not_move() {
        let mut tx = requested(20);
        cancel(&mut tx).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Cancelled);
        let version = tx.version();

        assert!(matches!(begin(&mut tx), Err(DomainError::InvalidState(_))));
        assert!(matches!(cancel(&mut tx), Err(DomainError::InvalidState(_))));
        assert!(matches!(complete(&mut tx), Err(DomainError::InvalidState(_))));
        assert_eq!(tx.status(), TransactionStatus::Cancelled);
        assert_eq!(tx.version(), version);
    }

    #[test]
    fn schedule_changes_type_and_keeps_status() {
        let mut tx = requested(3);
        assert!(matches!(
            schedule(&mut tx, TransactionType::Delivery),
            Err(DomainError::InvalidState(_))
        ));

        begin(&mut tx).unwrap();
        schedule(&mut tx, TransactionType::Delivery).unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::Delivery);
        assert_eq!(tx.status(), TransactionStatus::Processing);

        // Already scheduled.
        assert!(matches!(
            schedule(&mut tx, TransactionType::Return),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn schedule_rejects_non_schedulable_kind() {
        let mut tx = requested(3);
        begin(&mut tx).unwrap();
        assert!(matches!(
            schedule(&mut tx, TransactionType::Issued),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn matches_compares_the_triple() {
        let tx = requested(7);
        let customer = tx.customer().unwrap();
        assert!(tx.matches(tx.supply_item(), customer, 7));
        assert!(!tx.matches(tx.supply_item(), customer, 8));
        assert!(!tx.matches(SupplyItemId::generate(), customer, 7));
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Begin,
        Complete,
        Cancel,
        Deliver,
        Return,
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Begin),
            Just(Step::Complete),
            Just(Step::Cancel),
            Just(Step::Deliver),
            Just(Step::Return),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn status_never_leaves_a_final_state(steps in proptest::collection::vec(step_strategy(), 0..20)) {
            let mut tx = requested(10);
            let mut finalized: Option<TransactionStatus> = None;

            for step in steps {
                let _ = match step {
                    Step::Begin => begin(&mut tx),
                    Step::Complete => complete(&mut tx),
                    Step::Cancel => cancel(&mut tx),
                    Step::Deliver => schedule(&mut tx, TransactionType::Delivery),
                    Step::Return => schedule(&mut tx, TransactionType::Return),
                };

                if let Some(status) = finalized {
                    prop_assert_eq!(tx.status(), status);
                } else if tx.status().is_final() {
                    finalized = Some(tx.status());
                }
            }
        }
    }
}
