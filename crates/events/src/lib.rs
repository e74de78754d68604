//! Event contracts shared by the supply domain modules.
//!
//! Aggregates emit typed events; infra wraps them in [`EventEnvelope`]s and
//! fans them out over an [`EventBus`] after a successful commit.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
