//! Party profiles: customers, suppliers and supply managers.
//!
//! Deterministic domain logic only. Suppliers additionally carry an approval
//! flag and the set of catalog items they deliver.

pub mod party;

pub use party::{
    ApproveSupplier, AssignItems, ContactInfo, ItemsAssigned, ItemsRemoved, Party, PartyCommand,
    PartyEvent, PartyId, PartyKind, PartyRegistered, PartyReinstated, PartyStatus,
    PartySuspended, PartyUpdated, RegisterParty, ReinstateParty, RemoveItems, SupplierApproved,
    SuspendParty, UpdateDetails,
};
