use core::str::FromStr;

use serde::{Deserialize, Serialize};

use supplyline_core::DomainError;

use crate::Permission;

/// The four actor roles of the supply application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Supplier,
    SupplyManager,
    Customer,
}

const ADMIN: &[Permission] = &[
    Permission::CatalogView,
    Permission::CatalogManage,
    Permission::StockReceive,
    Permission::StockIssue,
    Permission::RequestView,
    Permission::RequestReview,
    Permission::TransactionProcess,
    Permission::LedgerView,
    Permission::PartyView,
    Permission::PartyManage,
    Permission::SupplierItemsManage,
];

const SUPPLY_MANAGER: &[Permission] = &[
    Permission::CatalogView,
    Permission::CatalogManage,
    Permission::StockReceive,
    Permission::StockIssue,
    Permission::RequestView,
    Permission::RequestReview,
    Permission::TransactionProcess,
    Permission::LedgerView,
    Permission::PartyView,
];

const SUPPLIER: &[Permission] = &[
    Permission::CatalogView,
    Permission::StockReceive,
    Permission::SupplierItemsManage,
];

const CUSTOMER: &[Permission] = &[
    Permission::CatalogView,
    Permission::RequestCreate,
    Permission::RequestView,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supplier => "supplier",
            Role::SupplyManager => "supply_manager",
            Role::Customer => "customer",
        }
    }

    /// Capabilities granted to this role.
    ///
    /// Admins are deliberately missing `RequestCreate`: requests originate
    /// only from customers.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN,
            Role::SupplyManager => SUPPLY_MANAGER,
            Role::Supplier => SUPPLIER,
            Role::Customer => CUSTOMER,
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "supplier" => Ok(Role::Supplier),
            "supply_manager" => Ok(Role::SupplyManager),
            "customer" => Ok(Role::Customer),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity_provider_role_strings() {
        assert_eq!("supply_manager".parse::<Role>().unwrap(), Role::SupplyManager);
        assert_eq!(" customer ".parse::<Role>().unwrap(), Role::Customer);
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn only_customers_create_requests() {
        assert!(Role::Customer.grants(Permission::RequestCreate));
        assert!(!Role::Admin.grants(Permission::RequestCreate));
        assert!(!Role::SupplyManager.grants(Permission::RequestCreate));
        assert!(!Role::Supplier.grants(Permission::RequestCreate));
    }

    #[test]
    fn customers_cannot_review_requests() {
        assert!(!Role::Customer.grants(Permission::RequestReview));
        assert!(Role::SupplyManager.grants(Permission::RequestReview));
    }
}
