//! Persistence boundary for the supply aggregates.
//!
//! Stores hold current aggregate state plus an append-only journal of the
//! committed events. Writes happen only through atomic change sets.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemorySupplyStore;
pub use r#trait::{ChangeSet, RequestFilter, Staged, StoreError, SupplyStore, TransactionFilter};
