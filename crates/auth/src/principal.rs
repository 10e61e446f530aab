use serde::{Deserialize, Serialize};
use warden_core::UserId;

use crate::{PermissionSet, Role, RoleHierarchy};

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// User is active and can be granted roles and permissions.
    #[default]
    Active,
    /// User is suspended; administrative grants are refused.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// A principal as stored by the backend.
///
/// Revocation is modeled as absence from `custom_grants`; there is no
/// separate negative set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub custom_grants: PermissionSet,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub is_email_verified: bool,
}

impl Principal {
    pub fn new(id: impl Into<UserId>, email: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role: role.into(),
            custom_grants: PermissionSet::new(),
            status: UserStatus::Active,
            is_email_verified: true,
        }
    }

    pub fn with_grants<I, T>(mut self, grants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.custom_grants.extend(grants.into_iter().map(|t| t.as_ref().to_string()));
        self
    }

    pub fn suspended(mut self) -> Self {
        self.status = UserStatus::Suspended;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Tokens implied by the principal's role. Unknown roles imply nothing.
    pub fn role_permissions(&self, hierarchy: &RoleHierarchy) -> PermissionSet {
        hierarchy.base_permissions(self.role.as_str()).cloned().unwrap_or_default()
    }

    /// `basePermissions(role) ∪ customGrants`.
    pub fn effective_permissions(&self, hierarchy: &RoleHierarchy) -> PermissionSet {
        self.role_permissions(hierarchy).union(&self.custom_grants)
    }
}
