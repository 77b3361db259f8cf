use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "patients.view"). The
/// catalog is defined by the server and may grow without a client release, so
/// this is deliberately not an enum. Comparison is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The permissions granted to one user: unordered and duplicate-free.
///
/// Serialized as a plain JSON array, which is what `/auth/profile` returns and
/// what the session store persists under `permission_set`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: impl Into<Permission>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

impl<P: Into<Permission>> FromIterator<P> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What a page, menu entry or action needs from the current user.
///
/// On the wire (menu definitions loaded from JSON) this is `null`, a single
/// string, or an array of alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    /// Always satisfied.
    #[default]
    None,
    /// Satisfied when the user holds this permission.
    Single(Permission),
    /// Satisfied when the user holds at least one of these permissions.
    AnyOf(Vec<Permission>),
}

impl Requirement {
    pub fn single(permission: impl Into<Permission>) -> Self {
        Self::Single(permission.into())
    }

    pub fn any_of<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::AnyOf(permissions.into_iter().map(Into::into).collect())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Requirement::None)
    }

    /// Permissions named by this requirement, in declaration order.
    pub fn permissions(&self) -> &[Permission] {
        match self {
            Requirement::None => &[],
            Requirement::Single(p) => core::slice::from_ref(p),
            Requirement::AnyOf(ps) => ps,
        }
    }

    /// Whether `granted` satisfies this requirement (no role bypass here).
    pub fn is_satisfied_by(&self, granted: &PermissionSet) -> bool {
        match self {
            Requirement::None => true,
            Requirement::Single(p) => granted.contains(p),
            Requirement::AnyOf(ps) => ps.iter().any(|p| granted.contains(p)),
        }
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::None => f.write_str("none"),
            Requirement::Single(p) => write!(f, "{p}"),
            Requirement::AnyOf(ps) => {
                f.write_str("any of [")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str("]")
            }
        }
    }
}
