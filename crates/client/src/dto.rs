//! Wire types for the permission REST contract.
//!
//! These mirror the backend's JSON payloads (camelCase) and must stay free of
//! client-side behavior beyond simple conversions.

use serde::{Deserialize, Serialize};

use warden_auth::{Permission, PermissionSet, PermissionSnapshot, Role, RoleHierarchy};
use warden_core::UserId;

// ─────────────────────────────────────────────────────────────────────────────
// Self-service
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeUser {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub is_email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MePermissions {
    pub effective: PermissionSet,
    #[serde(default)]
    pub role: PermissionSet,
    #[serde(default)]
    pub extra: PermissionSet,
}

/// `GET /me/permissions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MePermissionsResponse {
    pub user: MeUser,
    pub permissions: MePermissions,
}

impl MePermissionsResponse {
    /// Build a snapshot from the backend's authoritative lists.
    pub fn into_snapshot(self) -> PermissionSnapshot {
        PermissionSnapshot {
            principal_id: self.user.id,
            email: self.user.email,
            role: self.user.role,
            is_email_verified: self.user.is_email_verified,
            effective: self.permissions.effective,
            role_permissions: self.permissions.role,
            extra_permissions: self.permissions.extra,
            fetched_at: chrono::Utc::now(),
        }
    }
}

/// `POST /me/permissions/check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckPermissionRequest {
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermissionResponse {
    pub has_permission: bool,
    pub permission: Permission,
}

/// `POST /me/permissions/check-any`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAnyRequest {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnyResponse {
    pub has_any: bool,
    #[serde(default)]
    pub matched_permissions: Vec<Permission>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Administration
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /admin/roles/hierarchy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHierarchyResponse {
    pub roles: RoleHierarchy,
    #[serde(default)]
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoleRequest {
    pub role: Role,
}

/// Body of grant (`POST`) and revoke (`DELETE`) on `/admin/users/{id}/permissions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// `POST /admin/users/bulk-assign-role`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignRequest {
    pub user_ids: Vec<UserId>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignResponse {
    #[serde(default)]
    pub message: String,
    pub results: Vec<BulkAssignResult>,
}

impl BulkAssignResponse {
    pub fn succeeded(&self) -> impl Iterator<Item = &UserId> {
        self.results.iter().filter(|r| r.success).map(|r| &r.user_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BulkAssignResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Per-user outcome of a bulk assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignResult {
    pub user_id: UserId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /admin/users/{id}/validate-role-change`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRoleChangeRequest {
    pub new_role: Role,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}
