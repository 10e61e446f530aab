//! Declarative access gates over the permission cache.
//!
//! A guard is a pure function of the cache state, the reference load state
//! and its [`GateCondition`]. Until a snapshot exists, or while a role-level
//! condition waits on the hierarchy, it reports [`GuardState::Loading`]; it
//! never shows protected content or the deny fallback before a decision.

use std::sync::Arc;

use tokio::sync::watch;

use warden_auth::{GateCondition, PermissionSnapshot, RoleCondition, RoleHierarchy};

use crate::cache::{CacheState, PermissionCache};
use crate::reference::{ReferenceData, ReferenceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Allowed,
    Denied,
}

/// What to do once a guard denies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DenyBehavior {
    /// Show the caller's fallback content.
    #[default]
    Fallback,
    /// Navigate to the given route.
    Redirect(String),
}

/// Render instruction for the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    /// Neutral placeholder while the decision is pending.
    Placeholder,
    Content,
    Fallback,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct Guard {
    cache: PermissionCache,
    condition: GateCondition,
    reference: Option<ReferenceData>,
    on_deny: DenyBehavior,
}

impl Guard {
    pub fn new(cache: PermissionCache, condition: GateCondition) -> Self {
        Self {
            cache,
            condition,
            reference: None,
            on_deny: DenyBehavior::Fallback,
        }
    }

    /// Role-level conditions (`AtLeast`) need the hierarchy from here.
    pub fn with_reference(mut self, reference: ReferenceData) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn redirect_on_deny(mut self, route: impl Into<String>) -> Self {
        self.on_deny = DenyBehavior::Redirect(route.into());
        self
    }

    pub fn condition(&self) -> &GateCondition {
        &self.condition
    }

    /// Current decision without waiting or triggering anything.
    ///
    /// A role-level condition that only the unloaded hierarchy could satisfy
    /// stays [`GuardState::Loading`]. A failed hierarchy load denies.
    pub fn state(&self) -> GuardState {
        let state = self.cache.state();
        let CacheState::Ready(snapshot) = &state else {
            return self.evaluate(&state, None);
        };

        match self.reference.as_ref().map(ReferenceData::state) {
            Some(ReferenceState::Loaded(reference)) => self.decide_for(snapshot, Some(&reference.hierarchy)),
            Some(ReferenceState::Unloaded) if self.needs_hierarchy() => match self.decide_for(snapshot, None) {
                GuardState::Allowed => GuardState::Allowed,
                _ => GuardState::Loading,
            },
            _ => self.decide_for(snapshot, None),
        }
    }

    /// Mount the guard: start the lazy resolution if nothing is cached, and
    /// the hierarchy load if the condition needs it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(&self) -> GuardState {
        if self.cache.state() == CacheState::Empty {
            self.cache.trigger();
        }
        if let (Some(reference), true) = (&self.reference, self.needs_hierarchy()) {
            reference.trigger();
        }
        self.state()
    }

    /// Wait for the cache to settle and return a final decision.
    pub async fn decide(&self) -> GuardState {
        if let Err(err) = self.cache.ensure_resolved().await {
            tracing::debug!(error = %err, "guard denied: permissions unavailable");
            return GuardState::Denied;
        }

        let hierarchy = match (&self.reference, self.needs_hierarchy()) {
            (Some(reference), true) => match reference.load().await {
                Ok(loaded) => Some(loaded.hierarchy.clone()),
                Err(err) => {
                    tracing::warn!(error = %err, "role hierarchy unavailable; role-level gate denies");
                    None
                }
            },
            _ => None,
        };

        match self.evaluate(&self.cache.state(), hierarchy.as_ref()) {
            GuardState::Allowed => GuardState::Allowed,
            _ => {
                tracing::debug!(tokens = ?self.condition.tokens(), "guard denied");
                GuardState::Denied
            }
        }
    }

    /// Map the current state to what the host should render.
    pub fn render(&self) -> Render {
        self.render_state(self.state())
    }

    pub fn render_state(&self, state: GuardState) -> Render {
        match (state, &self.on_deny) {
            (GuardState::Loading, _) => Render::Placeholder,
            (GuardState::Allowed, _) => Render::Content,
            (GuardState::Denied, DenyBehavior::Fallback) => Render::Fallback,
            (GuardState::Denied, DenyBehavior::Redirect(route)) => Render::Redirect(route.clone()),
        }
    }

    /// Transitions of everything the decision depends on; re-read
    /// [`Guard::state`] after each change.
    pub fn watch(&self) -> GuardWatch {
        GuardWatch {
            cache: self.cache.subscribe(),
            reference: self
                .reference
                .as_ref()
                .filter(|_| self.needs_hierarchy())
                .map(ReferenceData::subscribe),
        }
    }

    fn evaluate(&self, state: &CacheState, hierarchy: Option<&RoleHierarchy>) -> GuardState {
        match state {
            CacheState::Empty | CacheState::Resolving => GuardState::Loading,
            CacheState::SignedOut | CacheState::Failed(_) => GuardState::Denied,
            CacheState::Ready(snapshot) => self.decide_for(snapshot, hierarchy),
        }
    }

    fn decide_for(&self, snapshot: &Arc<PermissionSnapshot>, hierarchy: Option<&RoleHierarchy>) -> GuardState {
        if self.condition.evaluate(snapshot, hierarchy) {
            GuardState::Allowed
        } else {
            GuardState::Denied
        }
    }

    fn needs_hierarchy(&self) -> bool {
        matches!(
            self.condition,
            GateCondition::Role {
                role: RoleCondition::AtLeast(_)
            } | GateCondition::Both {
                role: RoleCondition::AtLeast(_),
                ..
            }
        )
    }
}

/// Change notifications for one guard.
#[derive(Debug)]
pub struct GuardWatch {
    cache: watch::Receiver<CacheState>,
    reference: Option<watch::Receiver<ReferenceState>>,
}

impl GuardWatch {
    /// Wait for the next transition. Returns `false` once nothing can change.
    pub async fn changed(&mut self) -> bool {
        match &mut self.reference {
            Some(reference) => tokio::select! {
                changed = self.cache.changed() => changed.is_ok(),
                changed = reference.changed() => changed.is_ok(),
            },
            None => self.cache.changed().await.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::memory::InMemoryBackend;
    use warden_core::{AccessError, UserId};

    fn signed_in(user: &str) -> (Arc<InMemoryBackend>, PermissionCache) {
        let backend = Arc::new(InMemoryBackend::demo());
        backend.sign_in(&UserId::new(user));
        let cache = PermissionCache::new(backend.clone());
        cache.login(UserId::new(user));
        (backend, cache)
    }

    #[tokio::test]
    async fn signed_out_denies() {
        let cache = PermissionCache::new(Arc::new(InMemoryBackend::demo()));
        let guard = Guard::new(cache, GateCondition::token("blog:read"));
        assert_eq!(guard.mount(), GuardState::Denied);
        assert_eq!(guard.render(), Render::Fallback);
    }

    #[tokio::test]
    async fn token_gates() {
        let (_backend, cache) = signed_in("linus");
        let any = Guard::new(cache.clone(), GateCondition::any_of(["blog:delete", "course:create"]));
        let all = Guard::new(cache.clone(), GateCondition::all_of(["blog:delete", "course:create"]));
        assert_eq!(any.decide().await, GuardState::Allowed);
        assert_eq!(all.decide().await, GuardState::Denied);
    }

    #[tokio::test]
    async fn at_least_without_hierarchy_denies() {
        let (backend, cache) = signed_in("ada");
        let bare = Guard::new(cache.clone(), GateCondition::role_at_least("editor"));
        assert_eq!(bare.decide().await, GuardState::Denied);

        let with_ref = bare.with_reference(ReferenceData::new(backend));
        assert_eq!(with_ref.decide().await, GuardState::Allowed);
    }

    #[tokio::test]
    async fn redirect_only_when_denied() {
        let (_backend, cache) = signed_in("intern-1");
        let guard = Guard::new(cache, GateCondition::token("user:manage")).redirect_on_deny("/403");
        assert_eq!(guard.decide().await, GuardState::Denied);
        assert_eq!(guard.render(), Render::Redirect("/403".to_string()));
    }

    /// Follow the guard from mount until it settles, collecting every state seen.
    async fn states_until_settled(guard: &Guard) -> Vec<GuardState> {
        let mut watch = guard.watch();
        let mut seen = vec![guard.mount()];
        let settle = async {
            while seen.last() == Some(&GuardState::Loading) {
                assert!(watch.changed().await);
                seen.push(guard.state());
            }
        };
        tokio::time::timeout(Duration::from_secs(5), settle)
            .await
            .expect("guard did not settle");
        seen
    }

    #[tokio::test]
    async fn at_least_waits_for_hierarchy_instead_of_denying() {
        let (backend, cache) = signed_in("ada");
        backend.set_latency(Some(Duration::from_millis(20)));
        let reference = ReferenceData::new(backend.clone());
        let guard = Guard::new(cache, GateCondition::role_at_least("editor")).with_reference(reference.clone());

        let seen = states_until_settled(&guard).await;
        assert!(!seen.contains(&GuardState::Denied), "{seen:?}");
        assert_eq!(seen.last(), Some(&GuardState::Allowed));
        assert_eq!(guard.render(), Render::Content);
        assert!(reference.cached_hierarchy().is_some());
    }

    #[tokio::test]
    async fn snapshot_ready_but_hierarchy_unloaded_is_loading() {
        let (backend, cache) = signed_in("ada");
        cache.ensure_resolved().await.unwrap();
        let guard = Guard::new(cache, GateCondition::role_at_least("editor"))
            .with_reference(ReferenceData::new(backend));
        assert_eq!(guard.state(), GuardState::Loading);
        assert_eq!(guard.render(), Render::Placeholder);
    }

    #[tokio::test]
    async fn hierarchy_failure_settles_to_denied() {
        let (backend, cache) = signed_in("ada");
        backend.fail_hierarchy(Some(AccessError::transport("down")));
        let guard = Guard::new(cache, GateCondition::role_at_least("editor"))
            .with_reference(ReferenceData::new(backend));

        let seen = states_until_settled(&guard).await;
        assert_eq!(seen.last(), Some(&GuardState::Denied));
        assert_eq!(guard.render(), Render::Fallback);
    }
}
