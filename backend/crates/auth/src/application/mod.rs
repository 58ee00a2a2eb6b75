//! Application Layer
//!
//! Use cases and application services.

pub mod admin;
pub mod config;
pub mod gate;
pub mod hasher;
pub mod identity_store;
pub mod login;
pub mod refresh;
pub mod register;
pub mod token;

use crate::domain::entity::User;

// Re-exports
pub use admin::AdminUseCase;
pub use config::AuthConfig;
pub use gate::{AuthorizationGate, require_role};
pub use hasher::CredentialHasher;
pub use identity_store::{IdentityStore, Registration};
pub use login::{LoginInput, LoginUseCase};
pub use refresh::RefreshUseCase;
pub use register::RegisterUseCase;
pub use token::{TokenClaims, TokenKind, TokenPair, TokenService};

/// Outcome of register, login and refresh
#[derive(Debug)]
pub struct SignedIn {
    pub tokens: TokenPair,
    pub user: User,
}
