//! Inventory transaction ledger.
//!
//! Append-only entries recording every quantity movement. Entries are never
//! deleted and their status only moves forward.

pub mod transaction;

pub use transaction::{
    BeginProcessing, CancelTransaction, CompleteTransaction, ProcessingStarted,
    RecordTransaction, ScheduleTransaction, SupplyItemTransaction, TransactionCancelled,
    TransactionCommand, TransactionCompleted, TransactionEvent, TransactionId,
    TransactionRecorded, TransactionScheduled, TransactionStatus, TransactionType,
};
