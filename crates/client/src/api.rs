//! HTTP client for the clinic API.
//!
//! Every authenticated request carries `Authorization: Bearer <token>` taken
//! from the session store at call time, and every non-2xx response is turned
//! into an [`ApiError`] whose message is the server's `message` field.

use std::time::Duration;

use async_trait::async_trait;
use policlinico_core::Resource;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::session_store::SessionStore;
use crate::types::{
    ErrorBody, LoginRequest, LoginResponse, ProfileResponse, RefreshResponse, VerifyResponse,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: bad credentials, or an expired/revoked token.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response from server: {0}")]
    Decode(String),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("not signed in")]
    MissingToken,

    #[error("invalid HTTP client setup: {0}")]
    Setup(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The auth endpoints, as the auth client sees them.
///
/// Tokens are passed explicitly so the caller decides which token a call uses
/// (logout must use the token it is about to clear).
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    async fn verify(&self, token: &str) -> Result<VerifyResponse, ApiError>;

    async fn profile(&self, token: &str) -> Result<ProfileResponse, ApiError>;

    async fn refresh(&self, token: &str) -> Result<RefreshResponse, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    store: SessionStore,
}

impl core::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        store: SessionStore,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            http,
            store,
        })
    }

    pub fn from_config(cfg: &ClientConfig, store: SessionStore) -> Result<Self, ApiError> {
        Self::new(cfg.api_url.clone(), cfg.request_timeout, store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticated request with the persisted token.
    ///
    /// Fails with [`ApiError::MissingToken`] before touching the network when
    /// no token is persisted.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let token = self.store.token().ok_or(ApiError::MissingToken)?;
        self.send_json(method, path, Some(&token), body).await
    }

    pub async fn list<T: DeserializeOwned>(&self, resource: Resource) -> Result<Vec<T>, ApiError> {
        self.request(Method::GET, &resource.collection_path(), None)
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T, ApiError> {
        self.request(Method::GET, &resource.member_path(id), None)
            .await
    }

    pub async fn create<B, T>(&self, resource: Resource, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, &resource.collection_path(), Some(encode(body)?))
            .await
    }

    pub async fn update<B, T>(&self, resource: Resource, id: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, &resource.member_path(id), Some(encode(body)?))
            .await
    }

    pub async fn patch<B, T>(&self, resource: Resource, id: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, &resource.member_path(id), Some(encode(body)?))
            .await
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ApiError> {
        self.request::<serde_json::Value>(Method::DELETE, &resource.member_path(id), None)
            .await
            .map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let request_id = Uuid::now_v7();
        let url = self.url(path);
        tracing::debug!(%request_id, %method, %url, "api request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::debug!(%request_id, "api request failed: {e}");
            ApiError::Network(e.to_string())
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = error_message(status, &text);
        tracing::debug!(%request_id, status = status.as_u16(), %message, "api error response");

        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized { message })
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let resp = self.send(method, path, token, body).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        // 204 and empty 200 bodies decode as JSON null.
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.send_json(Method::POST, "/auth/login", None, Some(encode(request)?))
            .await
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.send(Method::POST, "/auth/logout", Some(token), None)
            .await
            .map(|_| ())
    }

    async fn verify(&self, token: &str) -> Result<VerifyResponse, ApiError> {
        self.send_json(Method::GET, "/auth/verify", Some(token), None)
            .await
    }

    async fn profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.send_json(Method::GET, "/auth/profile", Some(token), None)
            .await
    }

    async fn refresh(&self, token: &str) -> Result<RefreshResponse, ApiError> {
        self.send_json(Method::POST, "/auth/refresh", Some(token), None)
            .await
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

/// User-visible text for a failed response: the body's `message`, else the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
}
