//! `warden-auth` — pure role-based access control policy.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how
//! to represent capability tokens, roles and permission snapshots, and how to
//! evaluate gates against them. Fetching and caching live in `warden-client`.

pub mod analysis;
pub mod catalog;
pub mod gate;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod snapshot;
pub mod transition;

pub use analysis::{AuthorizationExplanation, DenialKind, DenialReason, PermissionAnalysis, explain};
pub use catalog::{CatalogEntry, PermissionGroup};
pub use gate::{GateCondition, RoleCondition};
pub use permissions::{Permission, PermissionSet};
pub use principal::{Principal, UserStatus};
pub use roles::{Role, RoleDefinition, RoleHierarchy};
pub use snapshot::{PermissionSnapshot, authorize};
pub use transition::{RoleTransitionCheck, authorize_mutation, validate_role_transition};
