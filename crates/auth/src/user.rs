//! The authenticated clinic user, as returned by the auth endpoints.

use serde::{Deserialize, Serialize};

use policlinico_core::UserId;

use crate::{PermissionSet, Role};

/// Authenticated principal.
///
/// `permissions` is optional: the login response may omit it, in which case
/// it arrives later with the profile fetch. It is kept here only as the
/// transport shape; the session store persists it under its own key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(alias = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(alias = "rol")]
    pub role: Role,
    #[serde(default = "default_active", alias = "activo")]
    pub active: bool,
    #[serde(default, alias = "permisos", skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSet>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role,
            active: true,
            permissions: None,
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Split off the permission set, leaving the plain user record.
    pub fn take_permissions(&mut self) -> Option<PermissionSet> {
        self.permissions.take()
    }
}
