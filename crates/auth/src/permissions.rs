use std::borrow::{Borrow, Cow};
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Capability token.
///
/// Tokens are modeled as opaque strings of the form `resource:action`
/// (e.g. "course:publish"). Membership is exact string equality; the structure
/// is only ever looked at for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource part of the token (text before the first `:`), for display.
    pub fn resource(&self) -> &str {
        self.as_str().split_once(':').map_or(self.as_str(), |(r, _)| r)
    }

    /// Action part of the token (text after the first `:`), for display.
    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, a)| a)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A set of capability tokens with O(1) membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, permission: impl Into<Permission>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn remove(&mut self, token: &str) -> bool {
        self.0.remove(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    /// Exact membership test.
    pub fn has(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// True iff at least one of `tokens` is present. Empty input is `false`.
    pub fn has_any<I, T>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens.into_iter().any(|t| self.has(t.as_ref()))
    }

    /// True iff every one of `tokens` is present. Empty input is `true`.
    pub fn has_all<I, T>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens.into_iter().all(|t| self.has(t.as_ref()))
    }

    /// The subset of `tokens` that is present, in input order.
    pub fn matching<I, T>(&self, tokens: I) -> Vec<Permission>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter(|t| self.has(t.as_ref()))
            .map(|t| Permission::from(t.as_ref()))
            .collect()
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Tokens present in `self` but not in `other`.
    pub fn difference(&self, other: &PermissionSet) -> PermissionSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    pub fn extend_from(&mut self, other: &PermissionSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Tokens sorted lexicographically (stable output for display and audit).
    pub fn sorted(&self) -> Vec<Permission> {
        let mut out: Vec<Permission> = self.0.iter().cloned().collect();
        out.sort();
        out
    }
}

impl<P: Into<Permission>> FromIterator<P> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<P: Into<Permission>> Extend<P> for PermissionSet {
    fn extend<T: IntoIterator<Item = P>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::hash_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::collections::hash_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
