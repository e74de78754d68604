//! Infrastructure layer: persistence, locking, configuration and the
//! synchronous supply workflow service.

pub mod config;
pub mod error;
pub mod locks;
pub mod service;
pub mod store;


pub use config::SupplyConfig;
pub use error::WorkflowError;
pub use locks::ItemLocks;
pub use service::{NewItem, NewParty, SupplyService};
pub use store::{
    ChangeSet, InMemorySupplyStore, RequestFilter, Staged, StoreError, SupplyStore,
    TransactionFilter,
};
