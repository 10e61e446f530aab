//! Static capability catalog.
//!
//! The catalog is the closed set of tokens the administration UI offers.
//! Tokens outside it are still stored and compared verbatim; they are simply
//! never suggested.

use serde::Serialize;

use crate::{Permission, PermissionSet};

/// Token constants, grouped by resource domain.
pub mod tokens {
    pub const BLOG_READ: &str = "blog:read";
    pub const BLOG_CREATE: &str = "blog:create";
    pub const BLOG_EDIT: &str = "blog:edit";
    pub const BLOG_DELETE: &str = "blog:delete";
    pub const BLOG_PUBLISH: &str = "blog:publish";
    pub const BLOG_MODERATE_COMMENTS: &str = "blog:moderate_comments";

    pub const COURSE_READ: &str = "course:read";
    pub const COURSE_ENROLL: &str = "course:enroll";
    pub const COURSE_CREATE: &str = "course:create";
    pub const COURSE_EDIT: &str = "course:edit";
    pub const COURSE_DELETE: &str = "course:delete";
    pub const COURSE_PUBLISH: &str = "course:publish";
    pub const COURSE_MANAGE_LESSONS: &str = "course:manage_lessons";

    pub const INTERNSHIP_READ: &str = "internship:read";
    pub const INTERNSHIP_APPLY: &str = "internship:apply";
    pub const INTERNSHIP_CREATE: &str = "internship:create";
    pub const INTERNSHIP_EDIT: &str = "internship:edit";
    pub const INTERNSHIP_DELETE: &str = "internship:delete";
    pub const INTERNSHIP_REVIEW_APPLICATIONS: &str = "internship:review_applications";

    pub const USER_READ: &str = "user:read";
    pub const USER_CREATE: &str = "user:create";
    pub const USER_EDIT: &str = "user:edit";
    pub const USER_DELETE: &str = "user:delete";
    pub const USER_MANAGE: &str = "user:manage";

    pub const ROLE_READ: &str = "role:read";
    pub const ROLE_ASSIGN: &str = "role:assign";
    pub const ROLE_MANAGE: &str = "role:manage";

    pub const PERMISSION_READ: &str = "permission:read";
    pub const PERMISSION_GRANT: &str = "permission:grant";
    pub const PERMISSION_REVOKE: &str = "permission:revoke";

    pub const ANALYTICS_VIEW: &str = "analytics:view";
    pub const ANALYTICS_EXPORT: &str = "analytics:export";

    pub const FILE_UPLOAD: &str = "file:upload";
    pub const FILE_DELETE: &str = "file:delete";

    pub const CALENDAR_VIEW: &str = "calendar:view";
    pub const CALENDAR_MANAGE: &str = "calendar:manage";

    pub const SYSTEM_SETTINGS: &str = "system:settings";
}

use tokens::*;

/// Tokens of one resource domain.
#[derive(Debug, Clone, Copy)]
pub struct PermissionGroup {
    pub domain: &'static str,
    pub title: &'static str,
    pub permissions: &'static [&'static str],
}

pub const CATALOG: &[PermissionGroup] = &[
    PermissionGroup {
        domain: "blog",
        title: "Blog",
        permissions: &[BLOG_READ, BLOG_CREATE, BLOG_EDIT, BLOG_DELETE, BLOG_PUBLISH, BLOG_MODERATE_COMMENTS],
    },
    PermissionGroup {
        domain: "course",
        title: "Courses",
        permissions: &[
            COURSE_READ,
            COURSE_ENROLL,
            COURSE_CREATE,
            COURSE_EDIT,
            COURSE_DELETE,
            COURSE_PUBLISH,
            COURSE_MANAGE_LESSONS,
        ],
    },
    PermissionGroup {
        domain: "internship",
        title: "Internships",
        permissions: &[
            INTERNSHIP_READ,
            INTERNSHIP_APPLY,
            INTERNSHIP_CREATE,
            INTERNSHIP_EDIT,
            INTERNSHIP_DELETE,
            INTERNSHIP_REVIEW_APPLICATIONS,
        ],
    },
    PermissionGroup {
        domain: "user",
        title: "Users",
        permissions: &[USER_READ, USER_CREATE, USER_EDIT, USER_DELETE, USER_MANAGE],
    },
    PermissionGroup {
        domain: "role",
        title: "Roles",
        permissions: &[ROLE_READ, ROLE_ASSIGN, ROLE_MANAGE],
    },
    PermissionGroup {
        domain: "permission",
        title: "Permissions",
        permissions: &[PERMISSION_READ, PERMISSION_GRANT, PERMISSION_REVOKE],
    },
    PermissionGroup {
        domain: "analytics",
        title: "Analytics",
        permissions: &[ANALYTICS_VIEW, ANALYTICS_EXPORT],
    },
    PermissionGroup {
        domain: "file",
        title: "Files",
        permissions: &[FILE_UPLOAD, FILE_DELETE],
    },
    PermissionGroup {
        domain: "calendar",
        title: "Calendar",
        permissions: &[CALENDAR_VIEW, CALENDAR_MANAGE],
    },
    PermissionGroup {
        domain: "system",
        title: "System",
        permissions: &[SYSTEM_SETTINGS],
    },
];

/// All catalog groups, in display order.
pub fn catalog() -> &'static [PermissionGroup] {
    CATALOG
}

/// Every catalog token as a set.
pub fn all_tokens() -> PermissionSet {
    CATALOG
        .iter()
        .flat_map(|g| g.permissions.iter().copied())
        .map(Permission::from_static)
        .collect()
}

pub fn is_known(token: &str) -> bool {
    CATALOG.iter().any(|g| g.permissions.contains(&token))
}

/// Catalog token with display metadata (for audit/listing).
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub category: String,
}

/// Flattened catalog, grouped by domain in display order.
pub fn entries() -> Vec<CatalogEntry> {
    CATALOG
        .iter()
        .flat_map(|g| g.permissions.iter().copied())
        .map(|token| {
            let p = Permission::from_static(token);
            CatalogEntry {
                name: p.as_str().to_string(),
                description: describe(&p),
                category: p.resource().to_string(),
            }
        })
        .collect()
}

/// Human description derived from the token shape.
pub fn describe(permission: &Permission) -> String {
    let resource = permission.resource();
    let action = match permission.action() {
        Some("read") | Some("view") => "View".to_string(),
        Some("create") => "Create".to_string(),
        Some("edit") => "Edit".to_string(),
        Some("delete") => "Delete".to_string(),
        Some("publish") => "Publish".to_string(),
        Some("manage") => "Manage".to_string(),
        Some(other) => other.replace('_', " "),
        None => return format!("Custom permission '{}'", permission),
    };
    format!("{action} {resource} resources")
}
