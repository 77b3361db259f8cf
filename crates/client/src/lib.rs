//! `policlinico-client`
//!
//! **Responsibility:** Client-side access control for the clinic management
//! front end.
//!
//! This crate provides:
//! - Persisted session state (token, user record, permission set)
//! - Sign-in, sign-out, session verification and token renewal
//! - Page-entry guarding with role-based redirects
//! - The permission-filtered navigation menu
//! - An authenticated HTTP client for the clinic API
//!
//! The server remains the authority: everything here decides what the user
//! *sees*, never what they may *do*.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod menu;
pub mod navigation;
pub mod refresh;
pub mod session_store;
pub mod storage;
pub mod types;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{AuthClient, AuthError, SessionVerification};
pub use config::{ClientConfig, ConfigError, Locations};
pub use guard::RouteGuard;
pub use menu::{MenuDefinition, MenuEntry, RenderedMenu, compose};
pub use navigation::{NavigationLog, Navigator};
pub use refresh::TokenRefresher;
pub use session_store::SessionStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
