//! Sign-in, sign-out and session verification against the clinic API.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use policlinico_auth::{Session, TokenLifetime, User};
use thiserror::Error;

use crate::api::{ApiError, AuthApi};
use crate::config::Locations;
use crate::navigation::Navigator;
use crate::session_store::SessionStore;
use crate::storage::StorageError;
use crate::types::LoginRequest;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The server rejected the credentials; carries its message.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("this account is disabled")]
    Inactive,

    #[error("not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of [`AuthClient::verify_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionVerification {
    /// The server confirmed the persisted token.
    Verified(Session),
    /// No token is persisted but a cached user record is. Nothing vouches for
    /// it: callers may show the user's name but must not treat this as proof
    /// of authentication (the session store still reports no session, so the
    /// route guard sends the user to login).
    Unverified(User),
    /// The server rejected the token, or verification failed; the session
    /// was cleared.
    Rejected,
    /// Nothing persisted.
    Anonymous,
}

impl SessionVerification {
    /// `true` for `Verified` and for the degraded `Unverified` fallback.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            SessionVerification::Verified(_) | SessionVerification::Unverified(_)
        )
    }

    /// `true` when validity rests on cached data only.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SessionVerification::Unverified(_))
    }
}

/// Drives the auth endpoints and keeps the session store in step with them.
pub struct AuthClient {
    api: Arc<dyn AuthApi>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    locations: Locations,
    lifetime: Mutex<Option<TokenLifetime>>,
}

impl AuthClient {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        locations: Locations,
    ) -> Self {
        Self {
            api,
            store,
            navigator,
            locations,
            lifetime: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Lifetime of the current token, when the server reported one.
    pub fn token_lifetime(&self) -> Option<TokenLifetime> {
        match self.lifetime.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_lifetime(&self, lifetime: Option<TokenLifetime>) {
        match self.lifetime.lock() {
            Ok(mut guard) => *guard = lifetime,
            Err(poisoned) => *poisoned.into_inner() = lifetime,
        }
    }

    /// Exchange credentials for a session.
    ///
    /// The session is persisted as soon as the login call succeeds. The
    /// profile fetch that follows only adds permissions: if it fails the
    /// login still succeeds, with whatever permissions the login response
    /// carried (possibly none).
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        let request = LoginRequest {
            email: identifier.trim().to_string(),
            password: secret.to_string(),
        };

        let response = self.api.login(&request).await.map_err(|err| match err {
            ApiError::Unauthorized { message } => AuthError::InvalidCredentials(message),
            other => AuthError::Api(other),
        })?;

        if !response.user.active {
            tracing::warn!(user_id = %response.user.id, "login refused for inactive account");
            return Err(AuthError::Inactive);
        }

        let user_id = response.user.id;
        let role = response.user.role;
        self.store.set_session(response.user, &response.token)?;
        self.set_lifetime(
            response
                .expires_in
                .map(|secs| TokenLifetime::from_expires_in(Utc::now(), secs)),
        );
        tracing::info!(%user_id, %role, "signed in");

        match self.api.profile(&response.token).await {
            // A logout may have completed while the call was in flight.
            Ok(_) if self.store.token().as_deref() != Some(response.token.as_str()) => {
                tracing::debug!(%user_id, "session changed during profile fetch, discarding profile");
            }
            Ok(profile) => {
                if let Err(err) = self.store.set_session(profile.user, &response.token) {
                    tracing::warn!("failed to persist profile after login: {err}");
                }
            }
            Err(err) => {
                tracing::warn!(%user_id, "profile fetch after login failed, continuing without it: {err}");
            }
        }

        self.store.get_session().ok_or(AuthError::NotAuthenticated)
    }

    /// Sign out.
    ///
    /// The server call is best-effort. Clearing the session and navigating to
    /// the login page happen no matter how that call ends, including when this
    /// future is dropped mid-flight.
    pub async fn logout(&self) {
        let _cleanup = ClearOnDrop { client: self };

        if let Some(token) = self.store.token() {
            if let Err(err) = self.api.logout(&token).await {
                tracing::warn!("logout call failed, clearing local session anyway: {err}");
            }
        }
    }

    fn finish_logout(&self) {
        self.store.clear_session();
        self.set_lifetime(None);
        tracing::info!("signed out");
        self.navigator.navigate(&self.locations.login);
    }

    /// Check the persisted session on page load.
    ///
    /// With a token, the server decides: a negative or failed verification
    /// runs the logout path. Without a token, a cached user record is reported
    /// as [`SessionVerification::Unverified`].
    pub async fn verify_session(&self) -> SessionVerification {
        let Some(token) = self.store.token() else {
            return match self.store.cached_user() {
                Some(user) => {
                    tracing::warn!(user_id = %user.id, "no token persisted; trusting cached user without server verification");
                    SessionVerification::Unverified(user)
                }
                None => SessionVerification::Anonymous,
            };
        };

        match self.api.verify(&token).await {
            Ok(resp) if resp.valid => match self.store.get_session() {
                Some(session) => SessionVerification::Verified(session),
                None => {
                    tracing::warn!("token verified but no readable user is persisted");
                    self.logout().await;
                    SessionVerification::Rejected
                }
            },
            Ok(_) => {
                tracing::info!("server rejected the persisted token");
                self.logout().await;
                SessionVerification::Rejected
            }
            Err(err) => {
                tracing::warn!("session verification failed: {err}");
                self.logout().await;
                SessionVerification::Rejected
            }
        }
    }

    /// Re-read the user record and permissions from `/auth/profile`.
    ///
    /// A 401 runs the logout path.
    pub async fn refresh_profile(&self) -> Result<Session, AuthError> {
        let token = self.store.token().ok_or(AuthError::NotAuthenticated)?;
        let profile = match self.api.profile(&token).await {
            Ok(profile) => profile,
            Err(err) => return Err(self.on_api_error(err).await.into()),
        };

        // A logout may have completed while the call was in flight.
        if self.store.token().as_deref() != Some(token.as_str()) {
            return Err(AuthError::NotAuthenticated);
        }
        self.store.set_session(profile.user, &token)?;
        self.store.get_session().ok_or(AuthError::NotAuthenticated)
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Returns `Ok(None)` without calling the server when no session is
    /// present anymore, and without writing when the session was cleared or
    /// replaced by another sign-in while the call was in flight. A 401 runs
    /// the logout path.
    pub async fn refresh_token(&self) -> Result<Option<TokenLifetime>, AuthError> {
        let Some(session) = self.store.get_session() else {
            tracing::debug!("no session, skipping token refresh");
            return Ok(None);
        };

        let response = match self.api.refresh(&session.token).await {
            Ok(response) => response,
            Err(err) => return Err(self.on_api_error(err).await.into()),
        };

        if !self.store.replace_token(&session.token, &response.token)? {
            tracing::debug!("session changed during token refresh, discarding new token");
            return Ok(None);
        }

        let lifetime = response
            .expires_in
            .map(|secs| TokenLifetime::from_expires_in(Utc::now(), secs));
        self.set_lifetime(lifetime);
        tracing::info!(user_id = %session.user.id, "token refreshed");
        Ok(lifetime)
    }

    /// Pass an authenticated call's result through, signing out on 401.
    pub async fn intercept<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match result {
            Err(err) => Err(self.on_api_error(err).await),
            ok => ok,
        }
    }

    async fn on_api_error(&self, err: ApiError) -> ApiError {
        if err.is_unauthorized() {
            tracing::warn!("session rejected by server, signing out: {err}");
            self.logout().await;
        }
        err
    }
}

/// Runs the local half of logout when dropped.
struct ClearOnDrop<'a> {
    client: &'a AuthClient,
}

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.client.finish_logout();
    }
}
