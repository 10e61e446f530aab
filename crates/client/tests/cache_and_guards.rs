use std::sync::Arc;
use std::time::Duration;

use warden_auth::GateCondition;
use warden_client::{CacheState, Guard, GuardState, InMemoryBackend, PermissionCache, Render};
use warden_core::{AccessError, UserId};

fn session(user: &str, latency: Option<Duration>) -> (Arc<InMemoryBackend>, PermissionCache) {
    let backend = Arc::new(InMemoryBackend::demo());
    backend.sign_in(&UserId::new(user));
    backend.set_latency(latency);
    let cache = PermissionCache::new(backend.clone());
    cache.login(UserId::new(user));
    (backend, cache)
}

#[tokio::test]
async fn concurrent_mounts_share_one_resolution() {
    let (backend, cache) = session("linus", Some(Duration::from_millis(50)));

    let guards: Vec<Guard> = (0..8)
        .map(|_| Guard::new(cache.clone(), GateCondition::token("course:create")))
        .collect();

    for guard in &guards {
        assert_eq!(guard.mount(), GuardState::Loading);
        assert_eq!(guard.render(), Render::Placeholder);
    }

    let decisions = futures::future::join_all(guards.iter().map(Guard::decide)).await;
    assert!(decisions.iter().all(|d| *d == GuardState::Allowed));
    assert_eq!(backend.resolve_calls(), 1);

    for guard in &guards {
        assert_eq!(guard.render(), Render::Content);
    }
}

#[tokio::test]
async fn concurrent_resolves_on_other_tasks_coalesce() {
    let (backend, cache) = session("grace", Some(Duration::from_millis(30)));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_resolved().await })
        })
        .collect();

    let mut snapshots = Vec::new();
    for handle in handles {
        snapshots.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(backend.resolve_calls(), 1);
    assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn resolution_failure_denies_every_guard() {
    let (backend, cache) = session("root", None);
    backend.fail_resolutions(Some(AccessError::transport("connection reset")));

    let guard = Guard::new(cache.clone(), GateCondition::token("blog:read"));
    let redirecting = Guard::new(cache.clone(), GateCondition::token("blog:read")).redirect_on_deny("/login");

    assert_eq!(guard.decide().await, GuardState::Denied);
    assert_eq!(guard.render(), Render::Fallback);
    assert_eq!(redirecting.render(), Render::Redirect("/login".to_string()));
    assert!(matches!(cache.state(), CacheState::Failed(AccessError::Transport(_))));
    assert!(cache.snapshot().is_none());
}

#[tokio::test]
async fn resolving_twice_without_changes_is_idempotent() {
    let (_backend, cache) = session("grace", None);

    let first = cache.ensure_resolved().await.unwrap();
    let second = cache.refresh().await.unwrap();
    assert!(first.same_permissions(&second));
}

#[tokio::test]
async fn logout_during_resolution_discards_result() {
    let (backend, cache) = session("grace", Some(Duration::from_millis(50)));

    cache.trigger();
    assert_eq!(cache.state(), CacheState::Resolving);
    cache.logout();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(cache.state(), CacheState::SignedOut);
    assert_eq!(backend.resolve_calls(), 1);

    let guard = Guard::new(cache, GateCondition::token("course:read"));
    assert_eq!(guard.decide().await, GuardState::Denied);
}

#[tokio::test]
async fn invalidation_during_resolution_fetches_again() {
    let (backend, cache) = session("grace", Some(Duration::from_millis(40)));

    let waiter = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.ensure_resolved().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.invalidate();

    let snapshot = waiter.await.unwrap().unwrap();
    assert_eq!(snapshot.role.as_str(), "instructor");
    assert_eq!(backend.resolve_calls(), 2);
    assert!(matches!(cache.state(), CacheState::Ready(_)));
}

#[tokio::test]
async fn subscribers_see_transitions() {
    let (_backend, cache) = session("grace", Some(Duration::from_millis(20)));
    let mut rx = cache.subscribe();

    cache.trigger();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), CacheState::Resolving);

    rx.changed().await.unwrap();
    assert!(matches!(*rx.borrow_and_update(), CacheState::Ready(_)));
}

#[tokio::test]
async fn role_fallback_is_an_or() {
    let (_backend, cache) = session("intern-1", None);

    let legacy = Guard::new(
        cache.clone(),
        GateCondition::either(["user:manage"], false, warden_auth::RoleCondition::AnyOf(vec!["intern".into()])),
    );
    assert_eq!(legacy.decide().await, GuardState::Allowed);

    let neither = Guard::new(
        cache,
        GateCondition::either(["user:manage"], false, warden_auth::RoleCondition::AnyOf(vec!["admin".into()])),
    );
    assert_eq!(neither.decide().await, GuardState::Denied);
}
