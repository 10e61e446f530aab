use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use warden_core::{AccessError, AccessResult};

use crate::catalog::{self, tokens::*};
use crate::{Permission, PermissionSet};

/// Role identifier used for RBAC.
///
/// Roles are opaque names at this layer; their level and base permissions
/// come from a [`RoleHierarchy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Role definition: rank plus the tokens the role implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub name: Role,
    pub display_title: String,
    pub level: i32,
    #[serde(default)]
    pub base_permissions: PermissionSet,
}

/// Roles ordered by level (ascending; higher level is more senior).
///
/// Reference data: read-only once built. Whether senior roles hold a superset
/// of junior roles' tokens is an authoring convention and is not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleHierarchy {
    roles: Vec<RoleDefinition>,
}

impl RoleHierarchy {
    /// Build a hierarchy, rejecting duplicate role names.
    pub fn new(mut roles: Vec<RoleDefinition>) -> AccessResult<Self> {
        let mut seen = HashSet::new();
        for role in &roles {
            if !seen.insert(role.name.as_str()) {
                return Err(AccessError::validation(format!("duplicate role name '{}'", role.name)));
            }
        }
        roles.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        Ok(Self { roles })
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn level_of(&self, name: &str) -> Option<i32> {
        self.get(name).map(|r| r.level)
    }

    pub fn base_permissions(&self, name: &str) -> Option<&PermissionSet> {
        self.get(name).map(|r| &r.base_permissions)
    }

    /// Whether `role` ranks at or above `floor`. Unknown roles never pass.
    pub fn is_at_least(&self, role: &str, floor: &str) -> bool {
        match (self.level_of(role), self.level_of(floor)) {
            (Some(level), Some(min)) => level >= min,
            _ => false,
        }
    }

    /// The most senior role (highest level).
    pub fn highest(&self) -> Option<&RoleDefinition> {
        self.roles.last()
    }

    pub fn lowest(&self) -> Option<&RoleDefinition> {
        self.roles.first()
    }

    /// Role names, most junior first.
    pub fn names(&self) -> Vec<Role> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Roles whose base permissions include `token`, most junior first.
    pub fn roles_granting(&self, token: &str) -> Vec<&Role> {
        self.roles
            .iter()
            .filter(|r| r.base_permissions.has(token))
            .map(|r| &r.name)
            .collect()
    }

    /// Default hierarchy shipped with the client.
    ///
    /// Each role extends the one below it.
    pub fn default_hierarchy() -> Self {
        let user: PermissionSet = [
            BLOG_READ,
            COURSE_READ,
            COURSE_ENROLL,
            INTERNSHIP_READ,
            INTERNSHIP_APPLY,
            CALENDAR_VIEW,
        ]
        .into_iter()
        .map(Permission::from_static)
        .collect();

        let intern = extend(&user, &[FILE_UPLOAD]);
        let author = extend(&intern, &[BLOG_CREATE, BLOG_EDIT]);
        let instructor = extend(
            &author,
            &[
                COURSE_CREATE,
                COURSE_EDIT,
                COURSE_PUBLISH,
                COURSE_MANAGE_LESSONS,
                ANALYTICS_VIEW,
                CALENDAR_MANAGE,
            ],
        );
        let editor = extend(
            &instructor,
            &[
                BLOG_PUBLISH,
                BLOG_DELETE,
                BLOG_MODERATE_COMMENTS,
                COURSE_DELETE,
                INTERNSHIP_CREATE,
                INTERNSHIP_EDIT,
                INTERNSHIP_REVIEW_APPLICATIONS,
            ],
        );
        let admin = extend(
            &editor,
            &[
                INTERNSHIP_DELETE,
                USER_READ,
                USER_CREATE,
                USER_EDIT,
                USER_DELETE,
                USER_MANAGE,
                ROLE_READ,
                ROLE_ASSIGN,
                PERMISSION_READ,
                PERMISSION_GRANT,
                PERMISSION_REVOKE,
                ANALYTICS_EXPORT,
                FILE_DELETE,
            ],
        );
        let super_admin = catalog::all_tokens();

        let roles = vec![
            definition("user", "User", 10, user),
            definition("intern", "Intern", 20, intern),
            definition("author", "Author", 30, author),
            definition("instructor", "Instructor", 40, instructor),
            definition("editor", "Editor", 50, editor),
            definition("admin", "Administrator", 80, admin),
            definition("super_admin", "Super Administrator", 100, super_admin),
        ];

        // Names above are distinct and already in level order.
        Self { roles }
    }
}

impl<'de> Deserialize<'de> for RoleHierarchy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let roles = Vec::<RoleDefinition>::deserialize(deserializer)?;
        RoleHierarchy::new(roles).map_err(serde::de::Error::custom)
    }
}

fn extend(base: &PermissionSet, extra: &[&'static str]) -> PermissionSet {
    let mut out = base.clone();
    out.extend(extra.iter().copied().map(Permission::from_static));
    out
}

fn definition(name: &'static str, title: &str, level: i32, base_permissions: PermissionSet) -> RoleDefinition {
    RoleDefinition {
        name: Role::from_static(name),
        display_title: title.to_string(),
        level,
        base_permissions,
    }
}
