use serde::{Deserialize, Serialize};

use supplyline_core::{AggregateId, UserId};

use crate::Role;

/// An authenticated actor, as resolved by the identity/session layer.
///
/// `profile` references the party profile backing the account (customer or
/// supplier profile). Admins and supply managers may have none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub profile: Option<AggregateId>,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: AggregateId) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}
