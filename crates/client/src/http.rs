//! REST implementation of [`PermissionBackend`].

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use warden_auth::{Permission, PermissionAnalysis, Role, RoleTransitionCheck};
use warden_core::{AccessError, AccessResult, UserId};

use crate::backend::PermissionBackend;
use crate::config::ClientConfig;
use crate::dto::{
    AssignRoleRequest, BulkAssignRequest, BulkAssignResponse, CheckAnyRequest, CheckAnyResponse,
    CheckPermissionRequest, CheckPermissionResponse, ErrorBody, MePermissionsResponse, MessageResponse,
    PermissionsRequest, RoleHierarchyResponse, ValidateRoleChangeRequest,
};

/// HTTP client for the permission backend.
///
/// Thin: every method is one request. Timeouts are the transport's own.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> AccessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AccessError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> AccessResult<Url> {
        let endpoint = self.config.endpoint(path);
        Url::parse(&endpoint).map_err(|e| AccessError::transport(format!("invalid endpoint '{endpoint}': {e}")))
    }

    /// `/admin/users/{id}/{suffix}` with the id percent-encoded as one segment.
    fn user_url(&self, user_id: &UserId, suffix: &str) -> AccessResult<Url> {
        let mut url = self.url("/admin/users")?;
        url.path_segments_mut()
            .map_err(|_| AccessError::transport(format!("base URL '{}' cannot carry a path", self.config.base_url)))?
            .push(user_id.as_str())
            .extend(suffix.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> AccessResult<T> {
        send(self.request(Method::GET, url)).await
    }

    async fn with_body<B, T>(&self, method: Method, url: Url, body: &B) -> AccessResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        send(self.request(method, url).json(body)).await
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> AccessResult<T> {
    let resp = req
        .send()
        .await
        .map_err(|e| AccessError::transport(format!("request failed: {e}")))?;

    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| AccessError::transport(format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
        return Err(error_for_status(status, message));
    }

    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a non-2xx status to the error taxonomy.
pub fn error_for_status(status: StatusCode, message: String) -> AccessError {
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED => AccessError::Unauthenticated,
        StatusCode::FORBIDDEN => AccessError::AuthorizationDenied(message),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            AccessError::Validation(message)
        }
        other => AccessError::Transport(format!("backend returned {}: {}", other.as_u16(), message)),
    }
}

#[async_trait::async_trait]
impl PermissionBackend for HttpBackend {
    async fn my_permissions(&self) -> AccessResult<MePermissionsResponse> {
        self.get(self.url("/me/permissions")?).await
    }

    async fn check_permission(&self, permission: &Permission) -> AccessResult<CheckPermissionResponse> {
        let body = CheckPermissionRequest {
            permission: permission.clone(),
        };
        self.with_body(Method::POST, self.url("/me/permissions/check")?, &body).await
    }

    async fn check_any(&self, permissions: &[Permission]) -> AccessResult<CheckAnyResponse> {
        let body = CheckAnyRequest {
            permissions: permissions.to_vec(),
        };
        self.with_body(Method::POST, self.url("/me/permissions/check-any")?, &body).await
    }

    async fn role_hierarchy(&self) -> AccessResult<RoleHierarchyResponse> {
        self.get(self.url("/admin/roles/hierarchy")?).await
    }

    async fn assign_role(&self, user_id: &UserId, role: &Role) -> AccessResult<MessageResponse> {
        let body = AssignRoleRequest { role: role.clone() };
        self.with_body(Method::POST, self.user_url(user_id, "role")?, &body).await
    }

    async fn grant_permissions(&self, user_id: &UserId, permissions: &[Permission]) -> AccessResult<MessageResponse> {
        let body = PermissionsRequest {
            permissions: permissions.to_vec(),
        };
        self.with_body(Method::POST, self.user_url(user_id, "permissions")?, &body).await
    }

    async fn revoke_permissions(
        &self,
        user_id: &UserId,
        permissions: &[Permission],
    ) -> AccessResult<MessageResponse> {
        let body = PermissionsRequest {
            permissions: permissions.to_vec(),
        };
        self.with_body(Method::DELETE, self.user_url(user_id, "permissions")?, &body).await
    }

    async fn reset_permissions(&self, user_id: &UserId) -> AccessResult<MessageResponse> {
        send(self.request(Method::POST, self.user_url(user_id, "reset-permissions")?)).await
    }

    async fn bulk_assign_role(&self, user_ids: &[UserId], role: &Role) -> AccessResult<BulkAssignResponse> {
        let body = BulkAssignRequest {
            user_ids: user_ids.to_vec(),
            role: role.clone(),
        };
        self.with_body(Method::POST, self.url("/admin/users/bulk-assign-role")?, &body).await
    }

    async fn validate_role_change(&self, user_id: &UserId, new_role: &Role) -> AccessResult<RoleTransitionCheck> {
        let body = ValidateRoleChangeRequest {
            new_role: new_role.clone(),
        };
        self.with_body(Method::POST, self.user_url(user_id, "validate-role-change")?, &body).await
    }

    async fn permission_analysis(&self, user_id: &UserId) -> AccessResult<PermissionAnalysis> {
        self.get(self.user_url(user_id, "permissions/analysis")?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(error_for_status(StatusCode::UNAUTHORIZED, String::new()), AccessError::Unauthenticated);
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, "insufficient privilege".into()),
            AccessError::denied("insufficient privilege")
        );
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, String::new()),
            AccessError::validation("Not Found")
        );
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, "upstream".into()),
            AccessError::Transport(msg) if msg == "backend returned 502: upstream"
        ));
    }

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(ClientConfig::new(base_url).unwrap()).unwrap()
    }

    #[test]
    fn user_urls() {
        let http = backend("http://localhost:8080/api");
        let id = UserId::new("42");
        assert_eq!(
            http.user_url(&id, "role").unwrap().as_str(),
            "http://localhost:8080/api/admin/users/42/role"
        );
        assert_eq!(
            http.user_url(&id, "permissions/analysis").unwrap().path(),
            "/api/admin/users/42/permissions/analysis"
        );
    }

    #[test]
    fn user_ids_are_one_encoded_segment() {
        let http = backend("http://localhost:8080");
        let url = http.user_url(&UserId::new("a/b?c#d"), "reset-permissions").unwrap();
        assert_eq!(url.path(), "/admin/users/a%2Fb%3Fc%23d/reset-permissions");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = http.user_url(&UserId::new("../roles"), "role").unwrap();
        assert_eq!(url.path(), "/admin/users/..%2Froles/role");
    }
}
