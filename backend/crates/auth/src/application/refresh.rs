//! Refresh Use Case

use std::sync::Arc;

use crate::application::SignedIn;
use crate::application::token::TokenService;
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};

pub struct RefreshUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
}

impl<R> RefreshUseCase<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>) -> Self {
        Self { repo, tokens }
    }

    /// Mints a new pair. The user must still exist and be active; the old
    /// refresh token stays valid until it expires.
    pub async fn execute(&self, refresh_token: &str) -> AuthResult<SignedIn> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let user_id = claims.subject()?;

        let user = self
            .repo
            .find_by_id(&user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::Unauthorized)?;

        let tokens = self.tokens.issue_pair(&user)?;
        tracing::debug!(user_id = %user.id, "Tokens refreshed");
        Ok(SignedIn { tokens, user })
    }
}
