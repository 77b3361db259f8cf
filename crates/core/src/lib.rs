//! `policlinico-core`: shared building blocks for the clinic client.
//!
//! This crate holds **pure** primitives (no I/O): identifiers, the catalog of
//! domain resources exposed by the clinic API, and the error raised when
//! parsing them.

pub mod error;
pub mod id;
pub mod resource;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use resource::Resource;
