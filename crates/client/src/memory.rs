//! In-memory reference backend.
//!
//! Implements the server-side semantics of the permission contract (privilege
//! rule, grants-only storage, best-effort bulk assignment) without a network.
//! Used by the CLI's demo mode and by tests, which also rely on its failure
//! injection and call counters.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use warden_auth::{
    Permission, PermissionAnalysis, Principal, Role, RoleHierarchy, RoleTransitionCheck, authorize_mutation, catalog,
    validate_role_transition,
};
use warden_core::{AccessError, AccessResult, UserId};

use crate::backend::PermissionBackend;
use crate::dto::{
    BulkAssignResponse, BulkAssignResult, CheckAnyResponse, CheckPermissionResponse, MePermissions, MePermissionsResponse,
    MeUser, MessageResponse, RoleHierarchyResponse,
};

#[derive(Debug, Default)]
struct State {
    hierarchy: RoleHierarchy,
    users: HashMap<UserId, Principal>,
    session: Option<UserId>,
    resolve_failure: Option<AccessError>,
    hierarchy_failure: Option<AccessError>,
    failing_users: HashSet<UserId>,
}

/// Backend holding users and roles in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    latency: Mutex<Option<Duration>>,
    resolve_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(hierarchy: RoleHierarchy) -> Self {
        Self {
            state: Mutex::new(State {
                hierarchy,
                ..State::default()
            }),
            ..Self::default()
        }
    }

    /// Backend with the default hierarchy and a small set of demo users.
    ///
    /// The session starts signed in as `root` (super_admin).
    pub fn demo() -> Self {
        let backend = Self::new(RoleHierarchy::default_hierarchy());
        backend.insert_user(Principal::new("root", "root@example.com", "super_admin"));
        backend.insert_user(Principal::new("ada", "ada@example.com", "admin"));
        backend.insert_user(Principal::new("grace", "grace@example.com", "instructor"));
        backend.insert_user(
            Principal::new("linus", "linus@example.com", "author").with_grants([catalog::tokens::COURSE_CREATE]),
        );
        backend.insert_user(Principal::new("intern-1", "intern1@example.com", "intern"));
        backend.insert_user(Principal::new("guest", "guest@example.com", "user").suspended());
        backend.sign_in(&UserId::new("root"));
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_user(&self, principal: Principal) {
        self.lock().users.insert(principal.id.clone(), principal);
    }

    pub fn user(&self, user_id: &UserId) -> Option<Principal> {
        self.lock().users.get(user_id).cloned()
    }

    /// Make `user_id` the session principal for `/me` calls and as the actor
    /// for administrative calls.
    pub fn sign_in(&self, user_id: &UserId) {
        self.lock().session = Some(user_id.clone());
    }

    pub fn sign_out(&self) {
        self.lock().session = None;
    }

    /// Make every `/me/permissions` call fail with `error` (`None` restores).
    pub fn fail_resolutions(&self, error: Option<AccessError>) {
        self.lock().resolve_failure = error;
    }

    /// Make every `/admin/roles/hierarchy` call fail with `error` (`None` restores).
    pub fn fail_hierarchy(&self, error: Option<AccessError>) {
        self.lock().hierarchy_failure = error;
    }

    /// Make every mutation targeting `user_id` fail with a transport error.
    pub fn fail_mutations_for(&self, user_id: &UserId) {
        self.lock().failing_users.insert(user_id.clone());
    }

    /// Artificial delay applied before answering each call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Apply `mutate` to `user_id` after the privilege and status checks.
    fn mutate<F>(&self, user_id: &UserId, requested: Option<&Role>, mutate: F) -> AccessResult<()>
    where
        F: FnOnce(&mut Principal),
    {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();

        if state.failing_users.contains(user_id) {
            return Err(AccessError::transport(format!("backend unavailable while updating user {user_id}")));
        }

        let actor_role = actor(&state)?.role.clone();
        let target = state
            .users
            .get(user_id)
            .ok_or_else(|| AccessError::validation(format!("user {user_id} not found")))?;

        if let Some(role) = requested.filter(|r| !state.hierarchy.contains(r.as_str())) {
            return Err(AccessError::validation(format!("unknown role '{role}'")));
        }

        authorize_mutation(&state.hierarchy, &actor_role, &target.role, requested)?;

        if !target.is_active() {
            return Err(AccessError::validation(format!("user {user_id} is {}", target.status)));
        }

        if let Some(target) = state.users.get_mut(user_id) {
            mutate(target);
        }
        Ok(())
    }
}

fn actor(state: &State) -> AccessResult<&Principal> {
    state
        .session
        .as_ref()
        .and_then(|id| state.users.get(id))
        .ok_or(AccessError::Unauthenticated)
}

#[async_trait::async_trait]
impl PermissionBackend for InMemoryBackend {
    async fn my_permissions(&self) -> AccessResult<MePermissionsResponse> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let state = self.lock();
        if let Some(err) = &state.resolve_failure {
            return Err(err.clone());
        }

        let me = actor(&state)?;
        let role = me.role_permissions(&state.hierarchy);
        Ok(MePermissionsResponse {
            user: MeUser {
                id: me.id.clone(),
                email: me.email.clone(),
                role: me.role.clone(),
                is_email_verified: me.is_email_verified,
            },
            permissions: MePermissions {
                effective: role.union(&me.custom_grants),
                role,
                extra: me.custom_grants.clone(),
            },
        })
    }

    async fn check_permission(&self, permission: &Permission) -> AccessResult<CheckPermissionResponse> {
        self.pause().await;
        let state = self.lock();
        let me = actor(&state)?;
        Ok(CheckPermissionResponse {
            has_permission: me.effective_permissions(&state.hierarchy).has(permission.as_str()),
            permission: permission.clone(),
        })
    }

    async fn check_any(&self, permissions: &[Permission]) -> AccessResult<CheckAnyResponse> {
        self.pause().await;
        let state = self.lock();
        let me = actor(&state)?;
        let matched = me.effective_permissions(&state.hierarchy).matching(permissions);
        Ok(CheckAnyResponse {
            has_any: !matched.is_empty(),
            matched_permissions: matched,
        })
    }

    async fn role_hierarchy(&self) -> AccessResult<RoleHierarchyResponse> {
        self.pause().await;
        let state = self.lock();
        actor(&state)?;
        if let Some(err) = &state.hierarchy_failure {
            return Err(err.clone());
        }
        Ok(RoleHierarchyResponse {
            roles: state.hierarchy.clone(),
            permissions: catalog::all_tokens(),
        })
    }

    async fn assign_role(&self, user_id: &UserId, role: &Role) -> AccessResult<MessageResponse> {
        self.pause().await;
        self.mutate(user_id, Some(role), |p| p.role = role.clone())?;
        Ok(MessageResponse::new(format!("role of user {user_id} set to '{role}'")))
    }

    async fn grant_permissions(&self, user_id: &UserId, permissions: &[Permission]) -> AccessResult<MessageResponse> {
        self.pause().await;
        if permissions.is_empty() {
            return Err(AccessError::validation("no permissions given"));
        }
        self.mutate(user_id, None, |p| p.custom_grants.extend(permissions.iter().cloned()))?;
        Ok(MessageResponse::new(format!(
            "granted {} permission(s) to user {user_id}",
            permissions.len()
        )))
    }

    async fn revoke_permissions(
        &self,
        user_id: &UserId,
        permissions: &[Permission],
    ) -> AccessResult<MessageResponse> {
        self.pause().await;
        if permissions.is_empty() {
            return Err(AccessError::validation("no permissions given"));
        }
        self.mutate(user_id, None, |p| {
            for permission in permissions {
                p.custom_grants.remove(permission.as_str());
            }
        })?;
        Ok(MessageResponse::new(format!(
            "revoked {} permission(s) from user {user_id}",
            permissions.len()
        )))
    }

    async fn reset_permissions(&self, user_id: &UserId) -> AccessResult<MessageResponse> {
        self.pause().await;
        self.mutate(user_id, None, |p| p.custom_grants = Default::default())?;
        Ok(MessageResponse::new(format!("permissions of user {user_id} reset to role defaults")))
    }

    async fn bulk_assign_role(&self, user_ids: &[UserId], role: &Role) -> AccessResult<BulkAssignResponse> {
        self.pause().await;
        if user_ids.is_empty() {
            return Err(AccessError::validation("no users given"));
        }

        let results: Vec<BulkAssignResult> = user_ids
            .iter()
            .map(|id| match self.mutate(id, Some(role), |p| p.role = role.clone()) {
                Ok(()) => BulkAssignResult {
                    user_id: id.clone(),
                    success: true,
                    message: None,
                },
                Err(err) => BulkAssignResult {
                    user_id: id.clone(),
                    success: false,
                    message: Some(err.to_string()),
                },
            })
            .collect();

        let updated = results.iter().filter(|r| r.success).count();
        Ok(BulkAssignResponse {
            message: format!("updated {updated} of {} user(s)", results.len()),
            results,
        })
    }

    async fn validate_role_change(&self, user_id: &UserId, new_role: &Role) -> AccessResult<RoleTransitionCheck> {
        self.pause().await;
        let state = self.lock();
        let actor_role = actor(&state)?.role.clone();
        let target = state
            .users
            .get(user_id)
            .ok_or_else(|| AccessError::validation(format!("user {user_id} not found")))?;

        let check = validate_role_transition(&state.hierarchy, target, new_role.as_str());
        if !check.valid {
            return Ok(check);
        }

        match authorize_mutation(&state.hierarchy, &actor_role, &target.role, Some(new_role)) {
            Ok(()) => Ok(check),
            Err(err) => Ok(RoleTransitionCheck {
                valid: false,
                message: err.to_string(),
                warnings: check.warnings,
            }),
        }
    }

    async fn permission_analysis(&self, user_id: &UserId) -> AccessResult<PermissionAnalysis> {
        self.pause().await;
        let state = self.lock();
        actor(&state)?;
        let target = state
            .users
            .get(user_id)
            .ok_or_else(|| AccessError::validation(format!("user {user_id} not found")))?;
        Ok(PermissionAnalysis::for_principal(target, &state.hierarchy))
    }
}
