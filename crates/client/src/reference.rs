//! Role hierarchy and token catalog as served by the backend.
//!
//! Fetched once and kept until an explicit refresh. The load state is
//! published on a `watch` channel so guards can tell "not loaded yet" from
//! "could not be loaded".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use warden_auth::{PermissionSet, Role, RoleHierarchy};
use warden_core::{AccessError, AccessResult};

use crate::backend::PermissionBackend;

/// One fetch of `GET /admin/roles/hierarchy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub hierarchy: RoleHierarchy,
    pub tokens: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceState {
    Unloaded,
    Loaded(Arc<Reference>),
    /// Last fetch failed. The next [`ReferenceData::load`] retries.
    Failed(AccessError),
}

struct Inner {
    backend: Arc<dyn PermissionBackend>,
    state: watch::Sender<ReferenceState>,
    fetch: tokio::sync::Mutex<()>,
    pending: AtomicBool,
}

/// Cached reference data. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ReferenceData {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for ReferenceData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReferenceData")
            .field("loaded", &self.cached().is_some())
            .finish()
    }
}

impl ReferenceData {
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        let (state, _) = watch::channel(ReferenceState::Unloaded);
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                fetch: tokio::sync::Mutex::new(()),
                pending: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> ReferenceState {
        self.inner.state.borrow().clone()
    }

    /// Receive every load state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<ReferenceState> {
        self.inner.state.subscribe()
    }

    fn cached(&self) -> Option<Arc<Reference>> {
        match &*self.inner.state.borrow() {
            ReferenceState::Loaded(reference) => Some(Arc::clone(reference)),
            _ => None,
        }
    }

    /// Return the cached reference data, fetching it on first use.
    ///
    /// Concurrent first calls share one fetch. Errors are published but not
    /// cached: the next call fetches again.
    pub async fn load(&self) -> AccessResult<Arc<Reference>> {
        if let Some(reference) = self.cached() {
            return Ok(reference);
        }

        let _fetching = self.inner.fetch.lock().await;
        if let Some(reference) = self.cached() {
            return Ok(reference);
        }
        self.fetch().await
    }

    /// Start loading in the background if nothing was attempted yet.
    ///
    /// Does not wait. Must be called from within a Tokio runtime.
    pub fn trigger(&self) {
        if self.state() != ReferenceState::Unloaded {
            return;
        }
        if self
            .inner
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let data = self.clone();
        tokio::spawn(async move {
            let _ = data.load().await;
            data.inner.pending.store(false, Ordering::Release);
        });
    }

    /// Drop the cached copy and fetch again.
    pub async fn refresh(&self) -> AccessResult<Arc<Reference>> {
        let _fetching = self.inner.fetch.lock().await;
        self.fetch().await
    }

    async fn fetch(&self) -> AccessResult<Arc<Reference>> {
        let resp = match self.inner.backend.role_hierarchy().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(error = %err, "role hierarchy unavailable");
                self.inner.state.send_replace(ReferenceState::Failed(err.clone()));
                return Err(err);
            }
        };
        tracing::info!(
            roles = resp.roles.roles().len(),
            tokens = resp.permissions.len(),
            "loaded role hierarchy"
        );
        let reference = Arc::new(Reference {
            hierarchy: resp.roles,
            tokens: resp.permissions,
        });
        self.inner.state.send_replace(ReferenceState::Loaded(Arc::clone(&reference)));
        Ok(reference)
    }

    /// Hierarchy if already loaded; never fetches.
    pub fn cached_hierarchy(&self) -> Option<RoleHierarchy> {
        self.cached().map(|r| r.hierarchy.clone())
    }

    /// Roles ordered by level, most junior first.
    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        Ok(self.load().await?.hierarchy.names())
    }

    pub async fn list_tokens(&self) -> AccessResult<PermissionSet> {
        Ok(self.load().await?.tokens.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    #[tokio::test]
    async fn lists_roles_in_level_order() {
        let data = ReferenceData::new(Arc::new(InMemoryBackend::demo()));
        let roles = data.list_roles().await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        assert_eq!(names.first(), Some(&"user"));
        assert_eq!(names.last(), Some(&"super_admin"));
        assert!(data.list_tokens().await.unwrap().has("system:settings"));
    }

    #[tokio::test]
    async fn nothing_is_cached_before_load() {
        let data = ReferenceData::new(Arc::new(InMemoryBackend::demo()));
        assert!(data.cached_hierarchy().is_none());
        data.load().await.unwrap();
        assert!(data.cached_hierarchy().is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_cached_copy() {
        let backend = Arc::new(InMemoryBackend::demo());
        let data = ReferenceData::new(backend.clone());
        let first = data.load().await.unwrap();
        let again = data.load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let refreshed = data.refresh().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(first.hierarchy, refreshed.hierarchy);
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let backend = InMemoryBackend::demo();
        backend.sign_out();
        let data = ReferenceData::new(Arc::new(backend));
        assert_eq!(data.load().await.unwrap_err(), AccessError::Unauthenticated);
        assert!(data.cached_hierarchy().is_none());
        assert_eq!(data.state(), ReferenceState::Failed(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn trigger_loads_in_background() {
        let data = ReferenceData::new(Arc::new(InMemoryBackend::demo()));
        let mut changes = data.subscribe();
        data.trigger();
        data.trigger();
        changes.changed().await.unwrap();
        assert!(matches!(data.state(), ReferenceState::Loaded(_)));
        assert!(data.cached_hierarchy().is_some());
    }

    #[tokio::test]
    async fn load_retries_after_failure() {
        let backend = Arc::new(InMemoryBackend::demo());
        backend.fail_hierarchy(Some(AccessError::transport("down")));
        let data = ReferenceData::new(backend.clone());
        assert!(data.load().await.is_err());

        backend.fail_hierarchy(None);
        data.load().await.unwrap();
        assert!(matches!(data.state(), ReferenceState::Loaded(_)));
    }
}
