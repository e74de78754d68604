use serde::{Deserialize, Serialize};

/// Capability checked at the operation boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CatalogView,
    CatalogManage,
    StockReceive,
    StockIssue,
    RequestCreate,
    RequestView,
    /// Approve or reject pending requests.
    RequestReview,
    /// Schedule and complete ledger entries.
    TransactionProcess,
    LedgerView,
    PartyView,
    PartyManage,
    SupplierItemsManage,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CatalogView => "catalog.view",
            Permission::CatalogManage => "catalog.manage",
            Permission::StockReceive => "stock.receive",
            Permission::StockIssue => "stock.issue",
            Permission::RequestCreate => "requests.create",
            Permission::RequestView => "requests.view",
            Permission::RequestReview => "requests.review",
            Permission::TransactionProcess => "ledger.process",
            Permission::LedgerView => "ledger.view",
            Permission::PartyView => "parties.view",
            Permission::PartyManage => "parties.manage",
            Permission::SupplierItemsManage => "suppliers.items.manage",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
