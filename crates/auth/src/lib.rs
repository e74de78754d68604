//! `supplyline-auth`: role/capability boundary for the supply core.
//!
//! Authentication happens elsewhere. The identity provider hands the core a
//! [`Principal`] whose role string was parsed once into [`Role`]; operations
//! then check a [`Permission`] against the role's static capability table.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, ensure_own_profile};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
