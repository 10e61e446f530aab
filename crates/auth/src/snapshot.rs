use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{AccessError, AccessResult, UserId};

use crate::{Permission, PermissionSet, Role};

/// The last resolved permission state of one principal.
///
/// Snapshots are immutable: a refresh builds a new snapshot and replaces the
/// old one wholesale. `effective` is the backend's authoritative list and is
/// never recomputed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub principal_id: UserId,
    pub email: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub effective: PermissionSet,
    /// Tokens the backend attributes to the role (display only).
    pub role_permissions: PermissionSet,
    /// Tokens the backend attributes to custom grants (display only).
    pub extra_permissions: PermissionSet,
    pub fetched_at: DateTime<Utc>,
}

impl PermissionSnapshot {
    /// Minimal snapshot with only the effective set populated.
    pub fn new(principal_id: impl Into<UserId>, role: impl Into<Role>, effective: PermissionSet) -> Self {
        Self {
            principal_id: principal_id.into(),
            email: String::new(),
            role: role.into(),
            is_email_verified: false,
            role_permissions: PermissionSet::new(),
            extra_permissions: PermissionSet::new(),
            effective,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.effective.has(token)
    }

    /// At least one present; an empty list never matches.
    pub fn has_any<I, T>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.effective.has_any(tokens)
    }

    /// All present; an empty list is vacuously satisfied.
    pub fn has_all<I, T>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.effective.has_all(tokens)
    }

    pub fn matched<I, T>(&self, tokens: I) -> Vec<Permission>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.effective.matching(tokens)
    }

    /// Same principal, role and effective tokens (ignores fetch time).
    pub fn same_permissions(&self, other: &PermissionSnapshot) -> bool {
        self.principal_id == other.principal_id && self.role == other.role && self.effective == other.effective
    }
}

/// Per-action authorization check against a snapshot.
///
/// - No IO
/// - No panics
pub fn authorize(snapshot: &PermissionSnapshot, required: &str) -> AccessResult<()> {
    if snapshot.has_token(required) {
        Ok(())
    } else {
        Err(AccessError::denied(format!("missing permission '{required}'")))
    }
}
