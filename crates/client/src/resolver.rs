//! Effective permission resolution.
//!
//! The backend computes `basePermissions(role) ∪ customGrants`; the client only
//! asks for the result and takes it verbatim.

use warden_auth::PermissionSnapshot;
use warden_core::{AccessError, AccessResult, UserId};

use crate::backend::PermissionBackend;

/// Fetch the snapshot of whoever the session belongs to.
pub async fn fetch_current(backend: &dyn PermissionBackend) -> AccessResult<PermissionSnapshot> {
    let snapshot = backend.my_permissions().await?.into_snapshot();
    tracing::debug!(
        principal_id = %snapshot.principal_id,
        role = %snapshot.role,
        tokens = snapshot.effective.len(),
        "resolved effective permissions"
    );
    Ok(snapshot)
}

/// Resolve the effective permissions of `expected`.
///
/// The backend answers for the session's principal; a response for anybody
/// else means the session changed underneath us and is treated as
/// unauthenticated.
pub async fn resolve(backend: &dyn PermissionBackend, expected: &UserId) -> AccessResult<PermissionSnapshot> {
    let snapshot = fetch_current(backend).await?;
    if &snapshot.principal_id != expected {
        tracing::warn!(
            expected = %expected,
            actual = %snapshot.principal_id,
            "session principal does not match the signed-in user"
        );
        return Err(AccessError::Unauthenticated);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    #[tokio::test]
    async fn resolves_the_session_principal() {
        let backend = InMemoryBackend::demo();
        backend.sign_in(&UserId::new("grace"));

        let snapshot = resolve(&backend, &UserId::new("grace")).await.unwrap();
        assert_eq!(snapshot.role.as_str(), "instructor");
        assert!(snapshot.has_token("course:publish"));
    }

    #[tokio::test]
    async fn mismatched_principal_is_unauthenticated() {
        let backend = InMemoryBackend::demo();
        backend.sign_in(&UserId::new("grace"));

        let err = resolve(&backend, &UserId::new("ada")).await.unwrap_err();
        assert_eq!(err, AccessError::Unauthenticated);
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let backend = InMemoryBackend::demo();
        backend.fail_resolutions(Some(AccessError::transport("connection refused")));

        let err = fetch_current(&backend).await.unwrap_err();
        assert!(matches!(err, AccessError::Transport(_)));
    }
}
