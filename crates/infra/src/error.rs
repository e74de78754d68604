use thiserror::Error;

use supplyline_auth::AuthzError;
use supplyline_core::DomainError;

use crate::store::StoreError;

/// Caller-facing error of every workflow operation.
///
/// Flattens domain, authorization and store failures. Every variant is a
/// recoverable outcome; nothing was persisted when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i64,
        available: i64,
    },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Stale read or unique-constraint clash; the caller may reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    Store(StoreError),

    #[error("event serialization failed: {0}")]
    Serialize(String),
}

impl WorkflowError {
    pub fn not_found(what: impl Into<String>) -> Self {
        WorkflowError::NotFound(what.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        WorkflowError::Consistency(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => WorkflowError::Validation(msg),
            DomainError::InvalidId(msg) => WorkflowError::Validation(msg),
            DomainError::InvalidState(msg) => WorkflowError::InvalidState(msg),
            DomainError::InsufficientStock {
                item,
                requested,
                available,
            } => WorkflowError::InsufficientStock {
                item,
                requested,
                available,
            },
            DomainError::Consistency(msg) => WorkflowError::Consistency(msg),
            DomainError::NotFound(msg) => WorkflowError::NotFound(msg),
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
            DomainError::Unauthorized(msg) => WorkflowError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for WorkflowError {
    fn from(value: AuthzError) -> Self {
        WorkflowError::Unauthorized(value.to_string())
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => WorkflowError::Conflict(msg),
            StoreError::UniqueViolation(msg) => WorkflowError::Conflict(msg),
            other => WorkflowError::Store(other),
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(value: serde_json::Error) -> Self {
        WorkflowError::Serialize(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_keeps_its_numbers() {
        let err: WorkflowError = DomainError::insufficient_stock("GLV-001", 30, 20).into();
        assert_eq!(
            err,
            WorkflowError::InsufficientStock {
                item: "GLV-001".to_string(),
                requested: 30,
                available: 20,
            }
        );
    }

    #[test]
    fn unique_violation_surfaces_as_conflict() {
        let err: WorkflowError = StoreError::UniqueViolation("sku".to_string()).into();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        let err: WorkflowError = StoreError::Poisoned.into();
        assert_eq!(err, WorkflowError::Store(StoreError::Poisoned));
    }

    #[test]
    fn authz_errors_are_unauthorized() {
        let err: WorkflowError = AuthzError::NotOwnProfile.into();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
    }
}
