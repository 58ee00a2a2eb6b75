//! Login Use Case
//!
//! Email + password in, token pair out.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::hasher::CredentialHasher;
use crate::application::identity_store::IdentityStore;
use crate::application::token::TokenService;
use crate::application::SignedIn;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct LoginUseCase<R>
where
    R: UserRepository,
{
    store: IdentityStore<R>,
    hasher: CredentialHasher,
    tokens: Arc<TokenService>,
}

impl<R> LoginUseCase<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, tokens: Arc<TokenService>) -> Self {
        let hasher = CredentialHasher::new(config.hash_cost);
        Self {
            store: IdentityStore::new(repo, hasher),
            hasher,
            tokens,
        }
    }

    pub async fn execute(&self, input: LoginInput) -> AuthResult<SignedIn> {
        // A malformed email cannot belong to anyone
        let email = Email::new(&input.email).map_err(|_| AuthError::InvalidCredentials)?;
        let password = RawPassword::for_login(input.password);

        let Some(mut user) = self.store.get_by_email(&email).await? else {
            // Same Argon2 work as a wrong password
            self.hasher.dummy_verify(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, user.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials);
        }

        // Checked after the password so account state does not leak
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        self.store.update_login_stats(&mut user).await;
        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = %user.id, login_count = user.login_count, "User logged in");
        Ok(SignedIn { tokens, user })
    }
}
