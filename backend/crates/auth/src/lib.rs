//! Auth (Authentication & Authorization) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Storage backends and the router in front of them
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Registration and email + password login
//! - Short-lived access / long-lived refresh JWT pair (HS256, one key each)
//! - Role-based access (Admin, Moderator, Member, Banned)
//! - Profile and preference updates
//! - Admin moderation with an audit trail
//!
//! ## Storage
//! Every repository call goes through [`StorageRouter`]: PostgreSQL when it
//! answers a health check, MongoDB otherwise.
//!
//! ## Security Model
//! - Passwords hashed with Argon2id on the blocking pool
//! - Every authenticated request re-reads the user, so deactivation takes
//!   effect on live tokens
//! - Unknown roles degrade to `banned`

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::{AuthConfig, ConfigError};
pub use error::{AuthError, AuthResult};
pub use infra::{
    BackendStatus, IdentityRouter, MongoIdentityBackend, PgIdentityBackend, RouterStatus,
    StorageRouter,
};
pub use presentation::router::auth_router;

// Retry policy used by the storage router's health check
pub use platform::retry::Backoff;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
