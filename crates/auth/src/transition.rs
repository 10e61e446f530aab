//! Role-change prechecks and the privilege rule for administrative mutations.

use serde::{Deserialize, Serialize};
use warden_core::{AccessError, AccessResult};

use crate::{Principal, Role, RoleHierarchy};

/// Result of a read-only role-change precheck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTransitionCheck {
    pub valid: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl RoleTransitionCheck {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            warnings: None,
        }
    }

    /// Warnings, treating "omitted" as empty.
    pub fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or_default()
    }
}

/// Check whether `target` may move to `new_role`, without mutating anything.
///
/// Demotions are valid but carry warnings listing the capabilities the
/// principal would lose (custom grants survive a role change). Promotions and
/// same-level moves carry no warnings.
pub fn validate_role_transition(hierarchy: &RoleHierarchy, target: &Principal, new_role: &str) -> RoleTransitionCheck {
    let Some(next) = hierarchy.get(new_role) else {
        return RoleTransitionCheck::invalid(format!("unknown role '{new_role}'"));
    };

    if !target.is_active() {
        return RoleTransitionCheck::invalid(format!("user {} is {}", target.id, target.status));
    }

    if target.role.as_str() == new_role {
        return RoleTransitionCheck::invalid(format!("user already has role '{new_role}'"));
    }

    let current_level = hierarchy.level_of(target.role.as_str());
    let message = format!("role change from '{}' to '{}' is allowed", target.role, new_role);

    match current_level {
        Some(level) if next.level < level => {
            let current = target.effective_permissions(hierarchy);
            let after = next.base_permissions.union(&target.custom_grants);
            let lost = current.difference(&after).sorted();

            let mut warnings = vec![format!(
                "demotion from '{}' (level {}) to '{}' (level {})",
                target.role, level, new_role, next.level
            )];
            if !lost.is_empty() {
                let names: Vec<&str> = lost.iter().map(|p| p.as_str()).collect();
                warnings.push(format!("user will lose {} permission(s): {}", lost.len(), names.join(", ")));
            }

            tracing::debug!(user_id = %target.id, lost = lost.len(), "role transition is a demotion");
            RoleTransitionCheck {
                valid: true,
                message,
                warnings: Some(warnings),
            }
        }
        _ => RoleTransitionCheck {
            valid: true,
            message,
            warnings: None,
        },
    }
}

/// Privilege rule for administrative mutations.
///
/// The actor may mutate a target iff its level is strictly greater than the
/// target's current level and than the requested role's level, or the actor
/// holds the most senior role of the hierarchy.
pub fn authorize_mutation(
    hierarchy: &RoleHierarchy,
    actor_role: &Role,
    target_role: &Role,
    requested: Option<&Role>,
) -> AccessResult<()> {
    let Some(actor_level) = hierarchy.level_of(actor_role.as_str()) else {
        return Err(AccessError::denied(format!("actor role '{actor_role}' is not recognized")));
    };

    if hierarchy.highest().is_some_and(|top| top.level == actor_level) {
        return Ok(());
    }

    let target_level = hierarchy.level_of(target_role.as_str()).unwrap_or(i32::MIN);
    if target_level >= actor_level {
        return Err(AccessError::denied(format!(
            "cannot modify a user with role '{target_role}' at or above your own role '{actor_role}'"
        )));
    }

    if let Some(requested) = requested {
        let requested_level = hierarchy
            .level_of(requested.as_str())
            .ok_or_else(|| AccessError::validation(format!("unknown role '{requested}'")))?;
        if requested_level >= actor_level {
            return Err(AccessError::denied(format!(
                "cannot assign role '{requested}' at or above your own role '{actor_role}'"
            )));
        }
    }

    Ok(())
}
