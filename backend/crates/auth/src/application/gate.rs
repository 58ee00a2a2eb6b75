//! Authorization Gate
//!
//! Turns a bearer token into a live, active user and checks roles. A bad
//! token, a vanished user and a deactivated user are indistinguishable to
//! the caller.

use std::sync::Arc;

use crate::application::token::TokenService;
use crate::domain::entity::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::user_role::UserRole;
use crate::error::{AuthError, AuthResult};

pub struct AuthorizationGate<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
}

impl<R> AuthorizationGate<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>) -> Self {
        Self { repo, tokens }
    }

    /// Access token -> active user, re-read from storage on every call.
    pub async fn authenticate(&self, bearer: &str) -> AuthResult<User> {
        let claims = self.tokens.verify_access(bearer)?;
        let user_id = claims.subject()?;

        let user = self
            .repo
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !user.is_active {
            tracing::debug!(user_id = %user_id, "Token presented for inactive account");
            return Err(AuthError::Unauthorized);
        }

        Ok(user)
    }

    /// `None` on absence or on any failure.
    pub async fn authenticate_optional(&self, bearer: Option<&str>) -> Option<User> {
        self.authenticate(bearer?).await.ok()
    }
}

/// Pure membership check on the stored role.
pub fn require_role(user: &User, allowed: &[UserRole]) -> AuthResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = %user.role, "Role not allowed");
        Err(AuthError::Forbidden)
    }
}
