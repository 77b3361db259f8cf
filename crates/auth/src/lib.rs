//! `policlinico-auth`: pure authorization model for the clinic client.
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines who
//! the principal is ([`Session`]), what they may do ([`PermissionSet`]) and the
//! decision function ([`evaluate`]) every page and menu consults.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod user;

pub use authorize::{Decision, DecisionReason, evaluate, explain};
pub use claims::{TokenError, TokenLifetime};
pub use permissions::{Permission, PermissionSet, Requirement};
pub use roles::Role;
pub use session::Session;
pub use user::User;
