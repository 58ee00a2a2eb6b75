//! Credential Hasher
//!
//! Async front for Argon2id. Hashing is CPU bound, so both directions run on
//! the blocking pool.

use platform::password::HashCost;

use crate::domain::value_object::user_password::{RawPassword, UserPassword};
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: HashCost,
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Self {
        Self { cost }
    }

    /// Salted digest; two calls on the same input differ.
    pub async fn hash(&self, password: RawPassword) -> AuthResult<UserPassword> {
        let cost = self.cost;
        tokio::task::spawn_blocking(move || UserPassword::hash(&password, &cost)).await?
    }

    /// Checks against the parameters embedded in `digest`.
    pub async fn verify(&self, password: RawPassword, digest: UserPassword) -> AuthResult<bool> {
        let valid = tokio::task::spawn_blocking(move || digest.verify(&password)).await?;
        Ok(valid)
    }

    /// Burns one hash of the configured cost and discards it.
    ///
    /// For callers with no stored digest, so that path costs what `verify`
    /// would.
    pub async fn dummy_verify(&self, password: RawPassword) {
        if let Err(e) = self.hash(password).await {
            tracing::debug!(error = %e, "Dummy hash failed");
        }
    }
}
