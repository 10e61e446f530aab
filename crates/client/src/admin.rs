//! Administrative mutations of roles and custom grants.
//!
//! Every call validates its input locally, then delegates to the backend,
//! which enforces the privilege rule. When the target is the signed-in
//! principal the permission cache is refreshed after a successful mutation.

use std::sync::Arc;

use warden_auth::{Permission, PermissionAnalysis, PermissionSet, Role, RoleTransitionCheck, catalog};
use warden_core::{AccessError, AccessResult, UserId};

use crate::backend::PermissionBackend;
use crate::cache::PermissionCache;
use crate::dto::{BulkAssignResponse, MessageResponse};
use crate::reference::ReferenceData;

#[derive(Debug, Clone)]
pub struct AdminOperations {
    cache: PermissionCache,
    reference: ReferenceData,
}

impl AdminOperations {
    /// Administration over the cache's backend.
    pub fn new(cache: PermissionCache, reference: ReferenceData) -> Self {
        Self { cache, reference }
    }

    fn backend(&self) -> &Arc<dyn PermissionBackend> {
        self.cache.backend()
    }

    pub async fn assign_role(&self, user_id: &UserId, role: &str) -> AccessResult<MessageResponse> {
        validate_user_id(user_id)?;
        let role = self.validate_role(role)?;

        let resp = self.backend().assign_role(user_id, &role).await?;
        tracing::info!(user_id = %user_id, role = %role, "role assigned");
        self.after_mutation(user_id).await;
        Ok(resp)
    }

    pub async fn grant_permissions<I, T>(&self, user_id: &UserId, tokens: I) -> AccessResult<MessageResponse>
    where
        I: IntoIterator<Item = T>,
        T: Into<Permission>,
    {
        validate_user_id(user_id)?;
        let tokens = validate_tokens(tokens)?;

        let resp = self.backend().grant_permissions(user_id, &tokens).await?;
        tracing::info!(user_id = %user_id, count = tokens.len(), "permissions granted");
        self.after_mutation(user_id).await;
        Ok(resp)
    }

    pub async fn revoke_permissions<I, T>(&self, user_id: &UserId, tokens: I) -> AccessResult<MessageResponse>
    where
        I: IntoIterator<Item = T>,
        T: Into<Permission>,
    {
        validate_user_id(user_id)?;
        let tokens = validate_tokens(tokens)?;

        let resp = self.backend().revoke_permissions(user_id, &tokens).await?;
        tracing::info!(user_id = %user_id, count = tokens.len(), "permissions revoked");
        self.after_mutation(user_id).await;
        Ok(resp)
    }

    /// Drop all custom grants; the user is left with the role's base set.
    pub async fn reset_permissions(&self, user_id: &UserId) -> AccessResult<MessageResponse> {
        validate_user_id(user_id)?;

        let resp = self.backend().reset_permissions(user_id).await?;
        tracing::info!(user_id = %user_id, "permissions reset to role defaults");
        self.after_mutation(user_id).await;
        Ok(resp)
    }

    /// Best effort: per-user outcomes are in the response, not in the error.
    pub async fn bulk_assign_role(&self, user_ids: &[UserId], role: &str) -> AccessResult<BulkAssignResponse> {
        if user_ids.is_empty() {
            return Err(AccessError::validation("no users given"));
        }
        for user_id in user_ids {
            validate_user_id(user_id)?;
        }
        let role = self.validate_role(role)?;

        let resp = self.backend().bulk_assign_role(user_ids, &role).await?;
        let failed = resp.failed().count();
        tracing::info!(
            role = %role,
            requested = user_ids.len(),
            failed,
            "bulk role assignment finished"
        );

        let current = self.cache.principal_id();
        if let Some(me) = current.filter(|me| resp.succeeded().any(|id| id == me)) {
            self.after_mutation(&me).await;
        }
        Ok(resp)
    }

    /// Read-only precheck of a role change.
    pub async fn validate_role_transition(&self, user_id: &UserId, new_role: &str) -> AccessResult<RoleTransitionCheck> {
        validate_user_id(user_id)?;
        let role = self.validate_role(new_role)?;
        self.backend().validate_role_change(user_id, &role).await
    }

    pub async fn permission_analysis(&self, user_id: &UserId) -> AccessResult<PermissionAnalysis> {
        validate_user_id(user_id)?;
        self.backend().permission_analysis(user_id).await
    }

    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        self.reference.list_roles().await
    }

    pub async fn list_tokens(&self) -> AccessResult<PermissionSet> {
        self.reference.list_tokens().await
    }

    /// Blank names are rejected; unknown names only when the hierarchy is loaded.
    fn validate_role(&self, role: &str) -> AccessResult<Role> {
        let role = role.trim();
        if role.is_empty() {
            return Err(AccessError::validation("role name must not be blank"));
        }
        if let Some(hierarchy) = self.reference.cached_hierarchy() {
            if !hierarchy.contains(role) {
                return Err(AccessError::validation(format!("unknown role '{role}'")));
            }
        }
        Ok(Role::from(role))
    }

    async fn after_mutation(&self, target: &UserId) {
        if !self.cache.is_current(target) {
            return;
        }
        if let Err(err) = self.cache.refresh().await {
            tracing::warn!(error = %err, "failed to refresh own permissions after mutation");
        }
    }
}

fn validate_user_id(user_id: &UserId) -> AccessResult<()> {
    if user_id.as_str().trim().is_empty() {
        return Err(AccessError::validation("user id must not be blank"));
    }
    Ok(())
}

fn validate_tokens<I, T>(tokens: I) -> AccessResult<Vec<Permission>>
where
    I: IntoIterator<Item = T>,
    T: Into<Permission>,
{
    let tokens: Vec<Permission> = tokens.into_iter().map(Into::into).collect();
    if tokens.is_empty() {
        return Err(AccessError::validation("no permissions given"));
    }
    if let Some(blank) = tokens.iter().find(|t| t.as_str().trim().is_empty()) {
        return Err(AccessError::validation(format!("invalid permission '{blank}'")));
    }
    for token in tokens.iter().filter(|t| !catalog::is_known(t.as_str())) {
        tracing::warn!(permission = %token, "permission is not in the catalog");
    }
    Ok(tokens)
}
