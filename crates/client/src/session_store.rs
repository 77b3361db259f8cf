//! Persisted session: who is signed in and what they may do.

use std::sync::Arc;

use policlinico_auth::{PermissionSet, Session, User};
use serde::Serialize;

use crate::storage::{KeyValueStore, StorageError};

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const CURRENT_USER_KEY: &str = "current_user";
pub const PERMISSION_SET_KEY: &str = "permission_set";

/// Handle over the three persisted session keys.
///
/// Cloning is cheap and every clone sees the same backend. Reads never fail:
/// unreadable or corrupt values are logged and treated as absent. The token is
/// the authority for "signed in": it is written last and removed first, so a
/// reader never observes a token next to a half-written user record from a
/// previous session.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Current session, or `None` when there is no token or no readable user.
    pub fn get_session(&self) -> Option<Session> {
        let token = self.token()?;
        let user = self.cached_user()?;
        let permissions = self.read_json::<PermissionSet>(PERMISSION_SET_KEY);
        Some(Session::new(user, token, permissions))
    }

    /// Persist a freshly authenticated user and token.
    ///
    /// The permission set is replaced by whatever `user` carries (or removed),
    /// never merged with a previous response.
    pub fn set_session(&self, mut user: User, token: &str) -> Result<(), StorageError> {
        let permissions = user.take_permissions();

        // Until the new token lands, readers see no session rather than a mix
        // of this user and the previous token or permissions.
        self.backend.remove(AUTH_TOKEN_KEY)?;
        self.write_json(CURRENT_USER_KEY, &user)?;
        match &permissions {
            Some(set) => self.write_json(PERMISSION_SET_KEY, set)?,
            None => self.backend.remove(PERMISSION_SET_KEY)?,
        }
        self.backend.set(AUTH_TOKEN_KEY, token)
    }

    /// Replace the permission set, leaving user and token untouched.
    pub fn set_permissions(&self, permissions: &PermissionSet) -> Result<(), StorageError> {
        self.write_json(PERMISSION_SET_KEY, permissions)
    }

    /// Swap the bearer token of the current session, provided it is still
    /// `expected`.
    ///
    /// Returns `Ok(false)` without writing when no session is present or the
    /// session now holds another token, so a late refresh can neither
    /// resurrect a cleared session nor overwrite a newer sign-in.
    pub fn replace_token(&self, expected: &str, token: &str) -> Result<bool, StorageError> {
        match self.get_session() {
            Some(session) if session.token == expected => {
                self.backend.set(AUTH_TOKEN_KEY, token)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Remove all session keys. Idempotent; failures are logged.
    pub fn clear_session(&self) {
        for key in [AUTH_TOKEN_KEY, CURRENT_USER_KEY, PERMISSION_SET_KEY] {
            if let Err(err) = self.backend.remove(key) {
                tracing::error!(key, "failed to clear session key: {err}");
            }
        }
    }

    /// Persisted token, if any (empty strings count as absent).
    pub fn token(&self) -> Option<String> {
        self.read_raw(AUTH_TOKEN_KEY)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Persisted user record regardless of token presence.
    ///
    /// This is the stale-cache view used by the unverified fallback of
    /// session verification; authorization decisions go through
    /// [`SessionStore::get_session`] instead.
    pub fn cached_user(&self) -> Option<User> {
        self.read_json::<User>(CURRENT_USER_KEY)
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, "failed to read persisted session value: {err}");
                None
            }
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, "ignoring corrupt persisted session value: {err}");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &json)
    }
}
