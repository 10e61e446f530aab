use std::sync::Arc;

use proptest::prelude::*;

use warden_auth::{Principal, RoleHierarchy};
use warden_client::{InMemoryBackend, PermissionCache};
use warden_core::UserId;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// The cached snapshot is exactly the role's base set plus custom grants,
    /// and the any/all queries agree with plain set membership.
    #[test]
    fn snapshot_is_role_union_grants(
        role_idx in 0usize..7,
        grants in prop::collection::vec("[a-z]{1,5}:[a-z]{1,5}", 0..6),
        queries in prop::collection::vec("[a-z]{1,5}:[a-z]{1,5}", 0..4),
    ) {
        let hierarchy = RoleHierarchy::default_hierarchy();
        let role = hierarchy.roles()[role_idx].name.clone();
        let base = hierarchy.base_permissions(role.as_str()).cloned().unwrap_or_default();

        let backend = Arc::new(InMemoryBackend::new(hierarchy));
        backend.insert_user(Principal::new("p", "p@example.com", role).with_grants(grants.iter()));
        backend.sign_in(&UserId::new("p"));

        let rt = tokio::runtime::Runtime::new().unwrap();
        let snapshot = rt.block_on(async {
            let cache = PermissionCache::new(backend.clone());
            cache.login(UserId::new("p"));
            cache.ensure_resolved().await
        }).unwrap();

        let expected = base.union(&grants.iter().map(String::as_str).collect());
        prop_assert_eq!(&snapshot.effective, &expected);

        let held = |t: &String| expected.has(t);
        prop_assert_eq!(snapshot.has_any(&queries), queries.iter().any(held));
        prop_assert_eq!(snapshot.has_all(&queries), queries.iter().all(held));
        prop_assert_eq!(backend.resolve_calls(), 1);
    }
}
