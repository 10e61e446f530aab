//! Backend contract consumed by the resolver and administration operations.

use warden_auth::{Permission, PermissionAnalysis, Role, RoleTransitionCheck};
use warden_core::{AccessResult, UserId};

use crate::dto::{
    BulkAssignResponse, CheckAnyResponse, CheckPermissionResponse, MePermissionsResponse, MessageResponse,
    RoleHierarchyResponse,
};

/// Async interface to the permission backend.
///
/// The backend is the single source of truth for effective permissions and
/// enforces the privilege rule for every administrative call. Implementations
/// report failures through [`warden_core::AccessError`] and never panic.
#[async_trait::async_trait]
pub trait PermissionBackend: Send + Sync {
    /// `GET /me/permissions` for the current session.
    async fn my_permissions(&self) -> AccessResult<MePermissionsResponse>;

    /// `POST /me/permissions/check`
    async fn check_permission(&self, permission: &Permission) -> AccessResult<CheckPermissionResponse>;

    /// `POST /me/permissions/check-any`
    async fn check_any(&self, permissions: &[Permission]) -> AccessResult<CheckAnyResponse>;

    /// `GET /admin/roles/hierarchy`
    async fn role_hierarchy(&self) -> AccessResult<RoleHierarchyResponse>;

    /// `POST /admin/users/{id}/role`
    async fn assign_role(&self, user_id: &UserId, role: &Role) -> AccessResult<MessageResponse>;

    /// `POST /admin/users/{id}/permissions`
    async fn grant_permissions(&self, user_id: &UserId, permissions: &[Permission]) -> AccessResult<MessageResponse>;

    /// `DELETE /admin/users/{id}/permissions`
    async fn revoke_permissions(&self, user_id: &UserId, permissions: &[Permission])
    -> AccessResult<MessageResponse>;

    /// `POST /admin/users/{id}/reset-permissions`
    async fn reset_permissions(&self, user_id: &UserId) -> AccessResult<MessageResponse>;

    /// `POST /admin/users/bulk-assign-role`
    ///
    /// Best effort: per-user failures are reported in the results, not as an error.
    async fn bulk_assign_role(&self, user_ids: &[UserId], role: &Role) -> AccessResult<BulkAssignResponse>;

    /// `POST /admin/users/{id}/validate-role-change` (read-only).
    async fn validate_role_change(&self, user_id: &UserId, new_role: &Role) -> AccessResult<RoleTransitionCheck>;

    /// `GET /admin/users/{id}/permissions/analysis`
    async fn permission_analysis(&self, user_id: &UserId) -> AccessResult<PermissionAnalysis>;
}
