//! Session-scoped permission cache.
//!
//! Holds at most one [`PermissionSnapshot`] for the signed-in principal and
//! publishes state transitions on a `watch` channel. Resolution is lazy,
//! coalesced (one in-flight request per principal) and fails closed.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;

use warden_auth::{PermissionSnapshot, authorize};
use warden_core::{AccessError, AccessResult, UserId};

use crate::backend::PermissionBackend;
use crate::resolver;

/// Observable cache state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// No session.
    SignedOut,
    /// Signed in, nothing resolved yet (or invalidated).
    Empty,
    /// A resolution is in flight.
    Resolving,
    Ready(Arc<PermissionSnapshot>),
    /// Last resolution failed. Sticky until refresh, invalidation or a new login.
    Failed(AccessError),
}

impl CacheState {
    pub fn snapshot(&self) -> Option<&Arc<PermissionSnapshot>> {
        match self {
            CacheState::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Whether a decision can be made without waiting.
    pub fn is_settled(&self) -> bool {
        !matches!(self, CacheState::Empty | CacheState::Resolving)
    }
}

/// Outcome of one resolution, tagged with the generation it was started in.
type Settled = (u64, AccessResult<Arc<PermissionSnapshot>>);
type Flight = Shared<BoxFuture<'static, Settled>>;

#[derive(Default)]
struct Session {
    principal: Option<UserId>,
    generation: u64,
    in_flight: HashMap<UserId, Flight>,
}

impl Session {
    /// Start a new generation: in-flight resolutions become stale.
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight.clear();
    }
}

struct Inner {
    backend: Arc<dyn PermissionBackend>,
    state: watch::Sender<CacheState>,
    session: Mutex<Session>,
}

/// Permission cache handle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PermissionCache {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("principal", &self.principal_id())
            .field("state", &self.state())
            .finish()
    }
}

impl PermissionCache {
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        let (state, _) = watch::channel(CacheState::SignedOut);
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn PermissionBackend> {
        &self.inner.backend
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: CacheState) {
        self.inner.state.send_replace(state);
    }

    /// Start a session for `principal`. Nothing is fetched until needed.
    pub fn login(&self, principal: UserId) {
        let mut session = self.lock();
        session.bump();
        tracing::info!(principal_id = %principal, "session started");
        session.principal = Some(principal);
        self.publish(CacheState::Empty);
    }

    /// Start a session with an already resolved snapshot.
    pub fn login_with_snapshot(&self, snapshot: PermissionSnapshot) {
        let mut session = self.lock();
        session.bump();
        tracing::info!(principal_id = %snapshot.principal_id, "session started with resolved permissions");
        session.principal = Some(snapshot.principal_id.clone());
        self.publish(CacheState::Ready(Arc::new(snapshot)));
    }

    pub fn logout(&self) {
        let mut session = self.lock();
        session.bump();
        if let Some(principal) = session.principal.take() {
            tracing::info!(principal_id = %principal, "session ended");
        }
        self.publish(CacheState::SignedOut);
    }

    pub fn principal_id(&self) -> Option<UserId> {
        self.lock().principal.clone()
    }

    pub fn is_current(&self, user_id: &UserId) -> bool {
        self.lock().principal.as_ref() == Some(user_id)
    }

    pub fn state(&self) -> CacheState {
        self.inner.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        self.state().snapshot().cloned()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.inner.state.subscribe()
    }

    /// Drop the snapshot. Any in-flight resolution is discarded when it settles.
    pub fn invalidate(&self) {
        let mut session = self.lock();
        session.bump();
        if session.principal.is_some() {
            tracing::debug!(generation = session.generation, "permission cache invalidated");
            self.publish(CacheState::Empty);
        }
    }

    /// Start resolving if nothing is cached and nothing is in flight.
    ///
    /// Does not wait. Must be called from within a Tokio runtime.
    pub fn trigger(&self) {
        let mut session = self.lock();
        if self.state() == CacheState::Empty {
            let _ = self.join_or_start(&mut session);
        }
    }

    /// Current snapshot, resolving it first if needed.
    ///
    /// Concurrent callers share a single backend request. A failed state is
    /// returned as its error without contacting the backend again.
    pub async fn ensure_resolved(&self) -> AccessResult<Arc<PermissionSnapshot>> {
        loop {
            let flight = {
                let mut session = self.lock();
                match self.state() {
                    CacheState::Ready(snapshot) => return Ok(snapshot),
                    CacheState::Failed(err) => return Err(err),
                    CacheState::SignedOut => return Err(AccessError::Unauthenticated),
                    CacheState::Empty | CacheState::Resolving => self.join_or_start(&mut session)?,
                }
            };

            let (generation, result) = flight.await;
            let current = self.lock().generation;
            if generation == current {
                return result;
            }
            tracing::debug!("resolution superseded; re-evaluating");
        }
    }

    /// Invalidate and resolve again.
    pub async fn refresh(&self) -> AccessResult<Arc<PermissionSnapshot>> {
        self.invalidate();
        self.ensure_resolved().await
    }

    /// Require `token` of the current principal.
    pub async fn require(&self, token: &str) -> AccessResult<()> {
        let snapshot = self.ensure_resolved().await?;
        authorize(&snapshot, token)
    }

    fn join_or_start(&self, session: &mut Session) -> AccessResult<Flight> {
        let Some(principal) = session.principal.clone() else {
            return Err(AccessError::Unauthenticated);
        };

        if let Some(flight) = session.in_flight.get(&principal) {
            tracing::debug!(principal_id = %principal, "joining in-flight resolution");
            return Ok(flight.clone());
        }

        let generation = session.generation;
        let cache = self.clone();
        let task_principal = principal.clone();
        let task = tokio::spawn(async move { cache.resolve_and_install(task_principal, generation).await });

        let cache = self.clone();
        let task_principal = principal.clone();
        let flight = async move {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => {
                    let err = AccessError::transport(format!("resolution task failed: {err}"));
                    cache.install(&task_principal, generation, Err(err))
                }
            };
            (generation, result)
        }
        .boxed()
        .shared();

        session.in_flight.insert(principal, flight.clone());
        self.publish(CacheState::Resolving);
        Ok(flight)
    }

    async fn resolve_and_install(
        &self,
        principal: UserId,
        generation: u64,
    ) -> AccessResult<Arc<PermissionSnapshot>> {
        let result = match AssertUnwindSafe(resolver::resolve(self.inner.backend.as_ref(), &principal))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map(Arc::new),
            Err(_) => Err(AccessError::transport("permission backend panicked during resolution")),
        };
        self.install(&principal, generation, result)
    }

    /// Publish the outcome of a resolution unless a newer generation started.
    fn install(
        &self,
        principal: &UserId,
        generation: u64,
        result: AccessResult<Arc<PermissionSnapshot>>,
    ) -> AccessResult<Arc<PermissionSnapshot>> {
        let mut session = self.lock();
        if session.generation != generation {
            tracing::debug!(principal_id = %principal, "discarding stale resolution");
            return result;
        }
        if session.in_flight.remove(principal).is_none() && self.state().is_settled() {
            return result;
        }

        match &result {
            Ok(snapshot) => {
                tracing::info!(
                    principal_id = %principal,
                    role = %snapshot.role,
                    tokens = snapshot.effective.len(),
                    "permissions cached"
                );
                self.publish(CacheState::Ready(Arc::clone(snapshot)));
            }
            Err(err) => {
                tracing::warn!(principal_id = %principal, error = %err, "permission resolution failed; denying access");
                self.publish(CacheState::Failed(err.clone()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{
        BulkAssignResponse, CheckAnyResponse, CheckPermissionResponse, MePermissionsResponse, MessageResponse,
        RoleHierarchyResponse,
    };
    use crate::guard::{Guard, Render};
    use crate::memory::InMemoryBackend;
    use warden_auth::{GateCondition, Permission, PermissionAnalysis, Role, RoleTransitionCheck};

    /// Backend whose permission lookup panics.
    struct Crashing;

    #[async_trait::async_trait]
    impl PermissionBackend for Crashing {
        async fn my_permissions(&self) -> AccessResult<MePermissionsResponse> {
            panic!("permission lookup crashed")
        }
        async fn check_permission(&self, _: &Permission) -> AccessResult<CheckPermissionResponse> {
            unimplemented!()
        }
        async fn check_any(&self, _: &[Permission]) -> AccessResult<CheckAnyResponse> {
            unimplemented!()
        }
        async fn role_hierarchy(&self) -> AccessResult<RoleHierarchyResponse> {
            unimplemented!()
        }
        async fn assign_role(&self, _: &UserId, _: &Role) -> AccessResult<MessageResponse> {
            unimplemented!()
        }
        async fn grant_permissions(&self, _: &UserId, _: &[Permission]) -> AccessResult<MessageResponse> {
            unimplemented!()
        }
        async fn revoke_permissions(&self, _: &UserId, _: &[Permission]) -> AccessResult<MessageResponse> {
            unimplemented!()
        }
        async fn reset_permissions(&self, _: &UserId) -> AccessResult<MessageResponse> {
            unimplemented!()
        }
        async fn bulk_assign_role(&self, _: &[UserId], _: &Role) -> AccessResult<BulkAssignResponse> {
            unimplemented!()
        }
        async fn validate_role_change(&self, _: &UserId, _: &Role) -> AccessResult<RoleTransitionCheck> {
            unimplemented!()
        }
        async fn permission_analysis(&self, _: &UserId) -> AccessResult<PermissionAnalysis> {
            unimplemented!()
        }
    }

    fn cache_for(user: &str) -> (Arc<InMemoryBackend>, PermissionCache) {
        let backend = Arc::new(InMemoryBackend::demo());
        backend.sign_in(&UserId::new(user));
        let cache = PermissionCache::new(backend.clone());
        cache.login(UserId::new(user));
        (backend, cache)
    }

    #[tokio::test]
    async fn starts_signed_out() {
        let cache = PermissionCache::new(Arc::new(InMemoryBackend::demo()));
        assert_eq!(cache.state(), CacheState::SignedOut);
        assert_eq!(cache.ensure_resolved().await.unwrap_err(), AccessError::Unauthenticated);
    }

    #[tokio::test]
    async fn resolves_lazily_once() {
        let (backend, cache) = cache_for("grace");
        assert_eq!(cache.state(), CacheState::Empty);
        assert_eq!(backend.resolve_calls(), 0);

        let first = cache.ensure_resolved().await.unwrap();
        let second = cache.ensure_resolved().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn failure_is_sticky_until_refresh() {
        let (backend, cache) = cache_for("grace");
        backend.fail_resolutions(Some(AccessError::transport("down")));

        assert!(cache.ensure_resolved().await.is_err());
        assert!(matches!(cache.state(), CacheState::Failed(_)));
        assert!(cache.ensure_resolved().await.is_err());
        assert_eq!(backend.resolve_calls(), 1);

        backend.fail_resolutions(None);
        let snapshot = cache.refresh().await.unwrap();
        assert_eq!(snapshot.role.as_str(), "instructor");
        assert_eq!(backend.resolve_calls(), 2);
    }

    #[tokio::test]
    async fn logout_clears_snapshot() {
        let (_backend, cache) = cache_for("grace");
        cache.ensure_resolved().await.unwrap();
        cache.logout();
        assert_eq!(cache.state(), CacheState::SignedOut);
        assert!(cache.snapshot().is_none());
        assert!(cache.principal_id().is_none());
    }

    #[tokio::test]
    async fn require_checks_token() {
        let (_backend, cache) = cache_for("linus");
        cache.require("course:create").await.unwrap();
        let err = cache.require("blog:delete").await.unwrap_err();
        assert!(matches!(err, AccessError::AuthorizationDenied(_)));
    }

    #[tokio::test]
    async fn backend_panic_fails_closed() {
        let cache = PermissionCache::new(Arc::new(Crashing));
        cache.login(UserId::new("grace"));

        let err = cache.ensure_resolved().await.unwrap_err();
        assert!(matches!(err, AccessError::Transport(_)));
        assert_eq!(cache.state(), CacheState::Failed(err));
    }

    #[tokio::test]
    async fn triggered_panic_settles_guards_to_denied() {
        let cache = PermissionCache::new(Arc::new(Crashing));
        cache.login(UserId::new("grace"));
        let guard = Guard::new(cache.clone(), GateCondition::token("blog:read"));
        let mut changes = cache.subscribe();

        cache.trigger();
        let settled = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !changes.borrow_and_update().is_settled() {
                changes.changed().await.unwrap();
            }
        })
        .await;

        assert!(settled.is_ok(), "cache stuck in {:?}", cache.state());
        assert!(matches!(cache.state(), CacheState::Failed(_)));
        assert_eq!(guard.render(), Render::Fallback);
    }
}
