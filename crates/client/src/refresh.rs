//! Background token renewal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use policlinico_auth::TokenLifetime;
use tokio::task::JoinHandle;

use crate::auth::{AuthClient, AuthError};

/// Delay before retrying a refresh that failed for a reason other than 401.
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Renews the bearer token `lead` before it expires.
///
/// Each renewal is a one-shot timer armed from the lifetime the previous
/// refresh returned. Before acting, the timer re-checks that a session still
/// exists, so a timer that outlives a logout does nothing.
#[derive(Clone)]
pub struct TokenRefresher {
    auth: Arc<AuthClient>,
    lead: chrono::Duration,
}

impl TokenRefresher {
    pub fn new(auth: Arc<AuthClient>, lead: Duration) -> Self {
        let lead = chrono::Duration::from_std(lead).unwrap_or(chrono::Duration::zero());
        Self { auth, lead }
    }

    /// Start renewing from `lifetime`. The task ends on logout, on a 401, or
    /// when the token expires before a retry could succeed.
    pub fn spawn(&self, lifetime: TokenLifetime) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(lifetime).await })
    }

    async fn run(&self, mut lifetime: TokenLifetime) {
        let mut wait = self.delay(&lifetime);
        loop {
            tracing::debug!(wait_secs = wait.as_secs(), "token refresh scheduled");
            tokio::time::sleep(wait).await;

            match self.auth.refresh_token().await {
                Ok(Some(next)) => {
                    lifetime = next;
                    wait = self.delay(&lifetime);
                }
                Ok(None) => {
                    tracing::debug!("no session or no reported lifetime, token refresh stopped");
                    return;
                }
                Err(AuthError::Api(err)) if err.is_unauthorized() => return,
                Err(err) => {
                    if lifetime.validate(Utc::now()).is_err() {
                        tracing::warn!("token refresh failed and the token has expired: {err}");
                        return;
                    }
                    tracing::warn!(
                        retry_secs = RETRY_DELAY.as_secs(),
                        "token refresh failed, retrying: {err}"
                    );
                    wait = RETRY_DELAY;
                }
            }
        }
    }

    fn delay(&self, lifetime: &TokenLifetime) -> Duration {
        lifetime
            .until_refresh(Utc::now(), self.lead)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, AuthApi};
    use crate::config::Locations;
    use crate::navigation::NavigationLog;
    use crate::session_store::SessionStore;
    use crate::storage::MemoryStore;
    use crate::types::{LoginRequest, LoginResponse, ProfileResponse, RefreshResponse, VerifyResponse};
    use async_trait::async_trait;
    use policlinico_auth::{Role, User};
    use policlinico_core::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RefreshOnly {
        calls: AtomicUsize,
        unauthorized: bool,
    }

    #[async_trait]
    impl AuthApi for RefreshOnly {
        async fn login(&self, _: &LoginRequest) -> Result<LoginResponse, ApiError> {
            Err(ApiError::Network("unused".into()))
        }
        async fn logout(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn verify(&self, _: &str) -> Result<VerifyResponse, ApiError> {
            Err(ApiError::Network("unused".into()))
        }
        async fn profile(&self, _: &str) -> Result<ProfileResponse, ApiError> {
            Err(ApiError::Network("unused".into()))
        }
        async fn refresh(&self, _: &str) -> Result<RefreshResponse, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.unauthorized {
                return Err(ApiError::Unauthorized {
                    message: "Token expirado".into(),
                });
            }
            Ok(RefreshResponse {
                token: format!("tok-{n}"),
                expires_in: Some(3600),
            })
        }
    }

    fn setup(unauthorized: bool) -> (Arc<RefreshOnly>, Arc<AuthClient>) {
        let api = Arc::new(RefreshOnly {
            calls: AtomicUsize::new(0),
            unauthorized,
        });
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        store
            .set_session(
                User::new(UserId::new(2), "Ana", "ana@policlinico.cl", Role::Doctor),
                "tok-0",
            )
            .unwrap();
        let auth = Arc::new(AuthClient::new(
            api.clone(),
            store,
            Arc::new(NavigationLog::new()),
            Locations::default(),
        ));
        (api, auth)
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_before_expiry() {
        let (api, auth) = setup(false);
        let refresher = TokenRefresher::new(auth.clone(), Duration::from_secs(60));

        let handle = refresher.spawn(TokenLifetime::from_expires_in(Utc::now(), 120));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(auth.store().token().as_deref(), Some("tok-1"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_logout_does_nothing() {
        let (api, auth) = setup(false);
        let refresher = TokenRefresher::new(auth.clone(), Duration::from_secs(60));

        let handle = refresher.spawn(TokenLifetime::from_expires_in(Utc::now(), 120));
        auth.logout().await;

        handle.await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(auth.store().token().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_refresh_stops_and_signs_out() {
        let (api, auth) = setup(true);
        let refresher = TokenRefresher::new(auth.clone(), Duration::from_secs(60));

        refresher
            .spawn(TokenLifetime::from_expires_in(Utc::now(), 60))
            .await
            .unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(auth.store().get_session().is_none());
    }
}
