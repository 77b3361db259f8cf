use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validity window of a bearer token.
///
/// The token itself is opaque to the client; the window comes from the
/// `expires_in` field of the login/refresh responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifetime {
    /// Issued-at timestamp (as observed by the client).
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

impl TokenLifetime {
    /// Window starting at `now` and lasting `expires_in_secs`.
    pub fn from_expires_in(now: DateTime<Utc>, expires_in_secs: i64) -> Self {
        Self {
            issued_at: now,
            expires_at: now + Duration::seconds(expires_in_secs),
        }
    }

    /// Deterministically validate the window against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.expires_at <= self.issued_at {
            return Err(TokenError::InvalidTimeWindow);
        }
        if now < self.issued_at {
            return Err(TokenError::NotYetValid);
        }
        if now >= self.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    /// When a refresh should fire: `lead` before expiry, never before issue.
    pub fn refresh_at(&self, lead: Duration) -> DateTime<Utc> {
        let at = self.expires_at - lead;
        if at < self.issued_at { self.issued_at } else { at }
    }

    /// Time left until the refresh point, clamped at zero.
    pub fn until_refresh(&self, now: DateTime<Utc>, lead: Duration) -> Duration {
        let left = self.refresh_at(lead) - now;
        if left < Duration::zero() { Duration::zero() } else { left }
    }
}
