use thiserror::Error;

use supplyline_core::{AggregateId, DomainError};

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden {
        role: &'static str,
        permission: &'static str,
    },

    #[error("principal has no linked profile")]
    MissingProfile,

    #[error("principal may only act on its own profile")]
    NotOwnProfile,
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Check a capability against the principal's role.
///
/// Pure policy check: no IO, no business rules.
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if principal.role.grants(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: principal.role.as_str(),
            permission: required.as_str(),
        })
    }
}

/// Require that the principal's linked profile is `profile`.
pub fn ensure_own_profile(principal: &Principal, profile: AggregateId) -> Result<(), AuthzError> {
    match principal.profile {
        None => Err(AuthzError::MissingProfile),
        Some(own) if own == profile => Ok(()),
        Some(_) => Err(AuthzError::NotOwnProfile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use supplyline_core::UserId;

    #[test]
    fn authorize_allows_granted_permission() {
        let manager = Principal::new(UserId::new(), Role::SupplyManager);
        assert!(authorize(&manager, Permission::RequestReview).is_ok());
    }

    #[test]
    fn authorize_denies_missing_permission() {
        let supplier = Principal::new(UserId::new(), Role::Supplier);
        let err = authorize(&supplier, Permission::RequestReview).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden {
                role: "supplier",
                permission: "requests.review",
            }
        );
    }

    #[test]
    fn own_profile_check() {
        let profile = AggregateId::new();
        let customer = Principal::new(UserId::new(), Role::Customer).with_profile(profile);

        assert!(ensure_own_profile(&customer, profile).is_ok());
        assert_eq!(
            ensure_own_profile(&customer, AggregateId::new()),
            Err(AuthzError::NotOwnProfile)
        );

        let anonymous = Principal::new(UserId::new(), Role::Customer);
        assert_eq!(
            ensure_own_profile(&anonymous, profile),
            Err(AuthzError::MissingProfile)
        );
    }

    #[test]
    fn authz_errors_surface_as_unauthorized() {
        let err: DomainError = AuthzError::MissingProfile.into();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
