use serde::{Deserialize, Serialize};
use warden_core::UserId;

use crate::{PermissionSet, PermissionSnapshot, Principal, Role, RoleHierarchy, catalog};

// ─────────────────────────────────────────────────────────────────────────────
// Permission Analysis (admin read model)
// ─────────────────────────────────────────────────────────────────────────────

/// Decomposition of a principal's permissions for audit/debugging.
///
/// Derived on demand, never persisted. Revocations are folded into the
/// grant list by the backend, so there are only two buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionAnalysis {
    pub user_id: UserId,
    pub current_role: Role,
    pub role_permissions: PermissionSet,
    pub custom_permissions: PermissionSet,
    pub effective_permissions: PermissionSet,
    /// Role names, most junior first.
    pub role_hierarchy: Vec<Role>,
}

impl PermissionAnalysis {
    pub fn for_principal(principal: &Principal, hierarchy: &RoleHierarchy) -> Self {
        let role_permissions = principal.role_permissions(hierarchy);
        let effective_permissions = role_permissions.union(&principal.custom_grants);
        Self {
            user_id: principal.id.clone(),
            current_role: principal.role.clone(),
            role_permissions,
            custom_permissions: principal.custom_grants.clone(),
            effective_permissions,
            role_hierarchy: hierarchy.names(),
        }
    }

    /// Custom grants the role already implies (candidates for cleanup).
    pub fn redundant_grants(&self) -> PermissionSet {
        self.custom_permissions
            .iter()
            .filter(|p| self.role_permissions.has(p.as_str()))
            .cloned()
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// This structure provides transparent, debuggable information about why
/// a token was allowed or denied for a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The token that was being checked.
    pub required_permission: String,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Details about the principal's state.
    pub principal: PrincipalState,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

/// Current state of the principal being checked.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub principal_id: UserId,
    pub role: String,
    pub effective_permissions: Vec<String>,
}

/// Detailed reason why authorization was denied.
#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// The token is a catalog token the principal does not hold.
    MissingPermission,
    /// The token is not in the catalog at all (likely a typo at the call site).
    UnknownPermission,
}

/// Explain why a token is (or would be) allowed or denied.
///
/// `hierarchy` is optional; when present, denials suggest the roles whose
/// base permissions include the token.
pub fn explain(
    snapshot: &PermissionSnapshot,
    required: &str,
    hierarchy: Option<&RoleHierarchy>,
) -> AuthorizationExplanation {
    let principal = PrincipalState {
        principal_id: snapshot.principal_id.clone(),
        role: snapshot.role.to_string(),
        effective_permissions: snapshot.effective.sorted().iter().map(|p| p.to_string()).collect(),
    };

    if snapshot.has_token(required) {
        let reason = if snapshot.role_permissions.has(required) {
            format!("Permission '{}' is implied by role '{}'", required, snapshot.role)
        } else if snapshot.extra_permissions.has(required) {
            format!("Permission '{}' was granted directly", required)
        } else {
            format!("Permission '{}' is in the effective set", required)
        };

        return AuthorizationExplanation {
            required_permission: required.to_string(),
            granted: true,
            reason,
            principal,
            denial_reason: None,
        };
    }

    if !catalog::is_known(required) {
        return AuthorizationExplanation {
            required_permission: required.to_string(),
            granted: false,
            reason: format!("Permission '{}' is not part of the catalog", required),
            principal,
            denial_reason: Some(DenialReason {
                kind: DenialKind::UnknownPermission,
                message: format!("Unknown permission: '{}'", required),
                suggestions: vec![
                    "Check the token spelling at the call site".to_string(),
                    "Tokens outside the catalog can only be held through custom grants".to_string(),
                ],
            }),
        };
    }

    let mut suggestions = vec![
        format!("Assign a role that grants the '{}' permission", required),
        format!("Grant the '{}' permission directly to the principal", required),
    ];

    if let Some(h) = hierarchy {
        let granting: Vec<String> = h.roles_granting(required).iter().map(|r| r.to_string()).collect();
        if !granting.is_empty() {
            suggestions.insert(0, format!("Roles that include this permission: {}", granting.join(", ")));
        }
    }

    AuthorizationExplanation {
        required_permission: required.to_string(),
        granted: false,
        reason: format!(
            "Principal does not have permission '{}' (role '{}', {} effective permissions)",
            required,
            snapshot.role,
            snapshot.effective.len()
        ),
        principal,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{}'", required),
            suggestions,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Permission;

    #[test]
    fn analysis_splits_role_and_custom() {
        let h = RoleHierarchy::default_hierarchy();
        let p = Principal::new("u1", "a@example.com", "author").with_grants(["course:create", "blog:edit"]);
        let report = PermissionAnalysis::for_principal(&p, &h);

        assert_eq!(report.current_role.as_str(), "author");
        assert!(report.role_permissions.has("blog:create"));
        assert!(!report.role_permissions.has("course:create"));
        assert!(report.custom_permissions.has("course:create"));
        assert!(report.effective_permissions.has("course:create"));
        assert!(report.effective_permissions.has("blog:create"));
        assert_eq!(report.role_hierarchy.first().map(|r| r.as_str()), Some("user"));
        assert_eq!(report.redundant_grants().sorted(), vec![Permission::from("blog:edit")]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["currentRole"], "author");
    }

    #[test]
    fn explain_granted_by_role() {
        let mut s = PermissionSnapshot::new("u1", "author", ["blog:create"].into_iter().collect());
        s.role_permissions = ["blog:create"].into_iter().collect();
        let e = explain(&s, "blog:create", None);
        assert!(e.granted);
        assert!(e.reason.contains("implied by role 'author'"));
        assert!(e.denial_reason.is_none());
    }

    #[test]
    fn explain_denied_suggests_roles() {
        let h = RoleHierarchy::default_hierarchy();
        let s = PermissionSnapshot::new("u1", "author", ["blog:create"].into_iter().collect());
        let e = explain(&s, "user:manage", Some(&h));
        assert!(!e.granted);
        let denial = e.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.suggestions[0].contains("admin, super_admin"));
    }

    #[test]
    fn explain_unknown_token() {
        let s = PermissionSnapshot::new("u1", "author", PermissionSet::new());
        let e = explain(&s, "blog:crate", None);
        assert_eq!(e.denial_reason.unwrap().kind, DenialKind::UnknownPermission);
    }
}
