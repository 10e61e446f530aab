//! Gate conditions evaluated by guards.
//!
//! Token checks and legacy role-name checks are separate variants; a
//! [`GateCondition::Both`] gate passes when either side passes.

use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionSnapshot, Role, RoleHierarchy};

/// Role-based condition for call sites that predate capability tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoleCondition {
    /// The principal's role is one of these names.
    AnyOf(Vec<Role>),
    /// The principal's role ranks at or above this role.
    AtLeast(Role),
}

impl RoleCondition {
    /// `AtLeast` needs the hierarchy; without one (or for unknown roles) it denies.
    pub fn evaluate(&self, role: &Role, hierarchy: Option<&RoleHierarchy>) -> bool {
        match self {
            RoleCondition::AnyOf(roles) => roles.iter().any(|r| r == role),
            RoleCondition::AtLeast(floor) => {
                hierarchy.is_some_and(|h| h.is_at_least(role.as_str(), floor.as_str()))
            }
        }
    }
}

/// What a guard requires before allowing access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateCondition {
    /// Single token.
    Token { token: Permission },
    /// Several tokens; all of them when `require_all`, otherwise any.
    Tokens { tokens: Vec<Permission>, require_all: bool },
    /// Role-name check only.
    Role { role: RoleCondition },
    /// Token check OR role check.
    Both {
        tokens: Vec<Permission>,
        require_all: bool,
        role: RoleCondition,
    },
}

impl GateCondition {
    pub fn token(token: impl Into<Permission>) -> Self {
        Self::Token { token: token.into() }
    }

    pub fn any_of<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Permission>,
    {
        Self::Tokens {
            tokens: tokens.into_iter().map(Into::into).collect(),
            require_all: false,
        }
    }

    pub fn all_of<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Permission>,
    {
        Self::Tokens {
            tokens: tokens.into_iter().map(Into::into).collect(),
            require_all: true,
        }
    }

    pub fn role_in<I, T>(roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Role>,
    {
        Self::Role {
            role: RoleCondition::AnyOf(roles.into_iter().map(Into::into).collect()),
        }
    }

    pub fn role_at_least(floor: impl Into<Role>) -> Self {
        Self::Role {
            role: RoleCondition::AtLeast(floor.into()),
        }
    }

    /// Token condition OR role condition.
    pub fn either<I, T>(tokens: I, require_all: bool, role: RoleCondition) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Permission>,
    {
        Self::Both {
            tokens: tokens.into_iter().map(Into::into).collect(),
            require_all,
            role,
        }
    }

    /// Evaluate against a resolved snapshot.
    pub fn evaluate(&self, snapshot: &PermissionSnapshot, hierarchy: Option<&RoleHierarchy>) -> bool {
        match self {
            GateCondition::Token { token } => snapshot.has_token(token.as_str()),
            GateCondition::Tokens { tokens, require_all } => tokens_pass(snapshot, tokens, *require_all),
            GateCondition::Role { role } => role.evaluate(&snapshot.role, hierarchy),
            GateCondition::Both {
                tokens,
                require_all,
                role,
            } => tokens_pass(snapshot, tokens, *require_all) || role.evaluate(&snapshot.role, hierarchy),
        }
    }

    /// Tokens referenced by this gate (for diagnostics).
    pub fn tokens(&self) -> Vec<&Permission> {
        match self {
            GateCondition::Token { token } => vec![token],
            GateCondition::Tokens { tokens, .. } | GateCondition::Both { tokens, .. } => tokens.iter().collect(),
            GateCondition::Role { .. } => Vec::new(),
        }
    }
}

fn tokens_pass(snapshot: &PermissionSnapshot, tokens: &[Permission], require_all: bool) -> bool {
    if require_all {
        snapshot.has_all(tokens)
    } else {
        snapshot.has_any(tokens)
    }
}
