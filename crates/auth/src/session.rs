//! The authenticated context a page runs under.

use serde::{Deserialize, Serialize};

use crate::{PermissionSet, Role, User};

/// The (user, bearer token, permission set) triple currently persisted.
///
/// A `Session` only exists when a token exists: the session store never builds
/// one from a cached user record alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
    /// `None` until a login or profile response carried permissions.
    pub permissions: Option<PermissionSet>,
}

impl Session {
    pub fn new(user: User, token: impl Into<String>, permissions: Option<PermissionSet>) -> Self {
        Self {
            user,
            token: token.into(),
            permissions,
        }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_administrator(&self) -> bool {
        self.user.role.is_administrator()
    }

    /// Granted permissions, or `None` when absent or empty.
    pub fn granted(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref().filter(|p| !p.is_empty())
    }
}
