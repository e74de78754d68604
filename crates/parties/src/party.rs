use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplyline_catalog::SupplyItemId;
use supplyline_core::{Aggregate, AggregateRoot, DomainError, UserId, aggregate_id};
use supplyline_events::Event;

aggregate_id!(
    /// Party identifier (customer, supplier or supply-manager profile).
    PartyId
);

/// Party kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Customer,
    Supplier,
    SupplyManager,
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    user_id: Option<UserId>,
    status: PartyStatus,
    approved: bool,
    supply_items: BTreeSet<SupplyItemId>,
    version: u64,
    created: bool,
}

impl Party {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            kind: PartyKind::Customer,
            name: String::new(),
            contact: ContactInfo::default(),
            user_id: None,
            status: PartyStatus::Active,
            approved: false,
            supply_items: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    /// Suppliers need an admin's approval; other kinds are approved on registration.
    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn supply_items(&self) -> &BTreeSet<SupplyItemId> {
        &self.supply_items
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Suspended parties cannot transact.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }

    /// Whether this supplier may deliver stock for `item`.
    pub fn supplies(&self, item: SupplyItemId) -> bool {
        self.kind == PartyKind::Supplier
            && self.approved
            && self.can_transact()
            && self.supply_items.contains(&item)
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    const AGGREGATE_TYPE: &'static str = "parties.party";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub user_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub party_id: PartyId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReinstateParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstateParty {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveSupplier {
    pub party_id: PartyId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignItems (adds to the supplier's existing set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignItems {
    pub party_id: PartyId,
    pub items: Vec<SupplyItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItems {
    pub party_id: PartyId,
    pub items: Vec<SupplyItemId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    ReinstateParty(ReinstateParty),
    ApproveSupplier(ApproveSupplier),
    AssignItems(AssignItems),
    RemoveItems(RemoveItems),
}

/// Event: PartyRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub user_id: Option<UserId>,
    pub approved: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartySuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyReinstated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReinstated {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierApproved {
    pub party_id: PartyId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsAssigned (only the newly added items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsAssigned {
    pub party_id: PartyId,
    pub items: Vec<SupplyItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsRemoved (only items that were assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsRemoved {
    pub party_id: PartyId,
    pub items: Vec<SupplyItemId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartySuspended(PartySuspended),
    PartyReinstated(PartyReinstated),
    SupplierApproved(SupplierApproved),
    ItemsAssigned(ItemsAssigned),
    ItemsRemoved(ItemsRemoved),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartySuspended(_) => "parties.party.suspended",
            PartyEvent::PartyReinstated(_) => "parties.party.reinstated",
            PartyEvent::SupplierApproved(_) => "parties.supplier.approved",
            PartyEvent::ItemsAssigned(_) => "parties.supplier.items_assigned",
            PartyEvent::ItemsRemoved(_) => "parties.supplier.items_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartySuspended(e) => e.occurred_at,
            PartyEvent::PartyReinstated(e) => e.occurred_at,
            PartyEvent::SupplierApproved(e) => e.occurred_at,
            PartyEvent::ItemsAssigned(e) => e.occurred_at,
            PartyEvent::ItemsRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.kind = e.kind;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.user_id = e.user_id;
                self.status = PartyStatus::Active;
                self.approved = e.approved;
                self.supply_items.clear();
                self.created = true;
            }
            PartyEvent::PartyUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PartyEvent::PartySuspended(_) => {
                self.status = PartyStatus::Suspended;
            }
            PartyEvent::PartyReinstated(_) => {
                self.status = PartyStatus::Active;
            }
            PartyEvent::SupplierApproved(_) => {
                self.approved = true;
            }
            PartyEvent::ItemsAssigned(e) => {
                self.supply_items.extend(e.items.iter().copied());
            }
            PartyEvent::ItemsRemoved(e) => {
                for item in &e.items {
                    self.supply_items.remove(item);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::SuspendParty(cmd) => self.handle_suspend(cmd),
            PartyCommand::ReinstateParty(cmd) => self.handle_reinstate(cmd),
            PartyCommand::ApproveSupplier(cmd) => self.handle_approve(cmd),
            PartyCommand::AssignItems(cmd) => self.handle_assign(cmd),
            PartyCommand::RemoveItems(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Party {
    fn ensure_existing(&self, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("party {party_id}")));
        }
        if self.id != party_id {
            return Err(DomainError::consistency("party_id mismatch"));
        }
        Ok(())
    }

    fn ensure_supplier(&self) -> Result<(), DomainError> {
        if self.kind != PartyKind::Supplier {
            return Err(DomainError::validation(format!(
                "party {} is not a supplier",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: cmd.name.clone(),
            contact: cmd.contact.clone().unwrap_or_default(),
            user_id: cmd.user_id,
            approved: cmd.kind != PartyKind::Supplier,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_contact = cmd.contact.clone().unwrap_or_else(|| self.contact.clone());

        Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
            party_id: cmd.party_id,
            name: new_name,
            contact: new_contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;

        if self.status == PartyStatus::Suspended {
            return Err(DomainError::invalid_state("party is already suspended"));
        }

        Ok(vec![PartyEvent::PartySuspended(PartySuspended {
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reinstate(&self, cmd: &ReinstateParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;

        if self.status == PartyStatus::Active {
            return Err(DomainError::invalid_state("party is not suspended"));
        }

        Ok(vec![PartyEvent::PartyReinstated(PartyReinstated {
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveSupplier) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;
        self.ensure_supplier()?;

        if self.approved {
            return Err(DomainError::invalid_state("supplier is already approved"));
        }

        Ok(vec![PartyEvent::SupplierApproved(SupplierApproved {
            party_id: cmd.party_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignItems) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;
        self.ensure_supplier()?;

        let new_items: BTreeSet<SupplyItemId> = cmd
            .items
            .iter()
            .copied()
            .filter(|item| !self.supply_items.contains(item))
            .collect();

        if new_items.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![PartyEvent::ItemsAssigned(ItemsAssigned {
            party_id: cmd.party_id,
            items: new_items.into_iter().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItems) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.party_id)?;
        self.ensure_supplier()?;

        let removed: BTreeSet<SupplyItemId> = cmd
            .items
            .iter()
            .copied()
            .filter(|item| self.supply_items.contains(item))
            .collect();

        if removed.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![PartyEvent::ItemsRemoved(ItemsRemoved {
            party_id: cmd.party_id,
            items: removed.into_iter().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
