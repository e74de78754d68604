//! Party profiles and supplier item assignment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use supplyline_auth::{Permission, Principal, Role, authorize, ensure_own_profile};
use supplyline_catalog::SupplyItemId;
use supplyline_core::UserId;
use supplyline_events::{EventBus, EventEnvelope, execute};
use supplyline_parties::{
    ApproveSupplier, AssignItems, ContactInfo, Party, PartyCommand, PartyId, PartyKind,
    RegisterParty, ReinstateParty, RemoveItems, SuspendParty, UpdateDetails,
};

use super::{SupplyService, UnitOfWork};
use crate::error::WorkflowError;
use crate::store::SupplyStore;

/// Input of [`SupplyService::register_party`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParty {
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    /// Account backing this profile, if any.
    pub user_id: Option<UserId>,
}

impl<S, B> SupplyService<S, B>
where
    S: SupplyStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn register_party(
        &self,
        principal: &Principal,
        new_party: NewParty,
    ) -> Result<PartyId, WorkflowError> {
        authorize(principal, Permission::PartyManage)?;

        let party_id = PartyId::generate();
        let mut party = Party::empty(party_id);
        let events = execute(
            &mut party,
            &PartyCommand::RegisterParty(RegisterParty {
                party_id,
                kind: new_party.kind,
                name: new_party.name,
                contact: new_party.contact,
                user_id: new_party.user_id,
                occurred_at: Utc::now(),
            }),
        )?;

        let mut uow = UnitOfWork::new(Some(principal.user_id));
        uow.stage_party(party, events)?;
        self.commit(uow)?;

        tracing::info!(party_id = %party_id, kind = ?new_party.kind, "party registered");
        Ok(party_id)
    }

    pub fn update_party_details(
        &self,
        principal: &Principal,
        party_id: PartyId,
        name: Option<String>,
        contact: Option<ContactInfo>,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::PartyManage)?;
        self.run_party_command(
            principal,
            party_id,
            PartyCommand::UpdateDetails(UpdateDetails {
                party_id,
                name,
                contact,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn suspend_party(
        &self,
        principal: &Principal,
        party_id: PartyId,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::PartyManage)?;
        self.run_party_command(
            principal,
            party_id,
            PartyCommand::SuspendParty(SuspendParty {
                party_id,
                reason,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn reinstate_party(
        &self,
        principal: &Principal,
        party_id: PartyId,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::PartyManage)?;
        self.run_party_command(
            principal,
            party_id,
            PartyCommand::ReinstateParty(ReinstateParty {
                party_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn approve_supplier(
        &self,
        principal: &Principal,
        party_id: PartyId,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::PartyManage)?;
        self.run_party_command(
            principal,
            party_id,
            PartyCommand::ApproveSupplier(ApproveSupplier {
                party_id,
                approved_by: principal.user_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Add catalog items to a supplier's deliverable set.
    pub fn assign_supplier_items(
        &self,
        principal: &Principal,
        party_id: PartyId,
        items: Vec<SupplyItemId>,
    ) -> Result<(), WorkflowError> {
        self.authorize_supplier_items(principal, party_id)?;
        for item in &items {
            self.load_item(*item)?;
        }

        self.run_party_command(
            principal,
            party_id,
            PartyCommand::AssignItems(AssignItems {
                party_id,
                items,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn remove_supplier_items(
        &self,
        principal: &Principal,
        party_id: PartyId,
        items: Vec<SupplyItemId>,
    ) -> Result<(), WorkflowError> {
        self.authorize_supplier_items(principal, party_id)?;
        self.run_party_command(
            principal,
            party_id,
            PartyCommand::RemoveItems(RemoveItems {
                party_id,
                items,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn get_party(&self, principal: &Principal, party_id: PartyId) -> Result<Party, WorkflowError> {
        if principal.profile != Some(party_id.into()) {
            authorize(principal, Permission::PartyView)?;
        }
        self.load_party(party_id)
    }

    pub fn list_parties(
        &self,
        principal: &Principal,
        kind: Option<PartyKind>,
    ) -> Result<Vec<Party>, WorkflowError> {
        authorize(principal, Permission::PartyView)?;
        Ok(self.store.list_parties(kind)?)
    }

    fn authorize_supplier_items(
        &self,
        principal: &Principal,
        party_id: PartyId,
    ) -> Result<(), WorkflowError> {
        authorize(principal, Permission::SupplierItemsManage)?;
        if principal.is(Role::Supplier) {
            ensure_own_profile(principal, party_id.into())?;
        }
        Ok(())
    }

    fn run_party_command(
        &self,
        principal: &Principal,
        party_id: PartyId,
        command: PartyCommand,
    ) -> Result<(), WorkflowError> {
        let mut party = self.load_party(party_id)?;
        let events = execute(&mut party, &command)?;
        let changed = !events.is_empty();

        let mut uow = UnitOfWork::new(Some(principal.user_id));
        uow.stage_party(party, events)?;
        self.commit(uow)?;

        if changed {
            tracing::info!(party_id = %party_id, actor = %principal.user_id, "party updated");
        }
        Ok(())
    }
}
