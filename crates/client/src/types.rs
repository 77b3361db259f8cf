//! Request/response payloads of the clinic API's auth endpoints.
//!
//! Only the documented fields are modeled; unknown fields are ignored.

use policlinico_auth::User;
use serde::{Deserialize, Serialize};

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    /// Token lifetime in seconds, when the server reports one.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// `GET /auth/verify` response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

/// `GET /auth/profile` response: the full user record, permissions included.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

/// `POST /auth/refresh` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Body of any non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use policlinico_auth::Role;

    #[test]
    fn login_response_without_expiry() {
        let json = r#"{
            "user": {"id": 4, "name": "Pedro", "email": "pedro@policlinico.cl", "role": "tecnico"},
            "token": "abc",
            "extra": true
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.user.role, Role::Technician);
        assert_eq!(resp.expires_in, None);
    }

    #[test]
    fn verify_response_user_is_optional() {
        let resp: VerifyResponse = serde_json::from_str(r#"{"valid": false}"#).unwrap();
        assert!(!resp.valid);
        assert!(resp.user.is_none());
    }

    #[test]
    fn error_body_tolerates_missing_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "x"}"#).unwrap();
        assert!(body.message.is_none());
    }
}
