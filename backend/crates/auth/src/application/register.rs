//! Register Use Case
//!
//! Creates an account and signs it in.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::hasher::CredentialHasher;
use crate::application::identity_store::{IdentityStore, Registration};
use crate::application::token::TokenService;
use crate::application::SignedIn;
use crate::domain::repository::UserRepository;
use crate::error::AuthResult;

pub struct RegisterUseCase<R>
where
    R: UserRepository,
{
    store: IdentityStore<R>,
    tokens: Arc<TokenService>,
}

impl<R> RegisterUseCase<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, tokens: Arc<TokenService>) -> Self {
        Self {
            store: IdentityStore::new(repo, CredentialHasher::new(config.hash_cost)),
            tokens,
        }
    }

    /// Registration counts as the first login.
    pub async fn execute(&self, registration: Registration) -> AuthResult<SignedIn> {
        let mut user = self.store.create_user(registration).await?;
        self.store.update_login_stats(&mut user).await;

        let tokens = self.tokens.issue_pair(&user)?;
        Ok(SignedIn { tokens, user })
    }
}
