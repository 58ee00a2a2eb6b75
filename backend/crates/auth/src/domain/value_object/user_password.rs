//! User password value objects
//!
//! Thin domain wrappers over `platform::password`: [`RawPassword`] is what a
//! user typed, [`UserPassword`] is the digest we store.

use platform::password::{ClearTextPassword, HashCost, HashedPassword, PasswordPolicyError};
use std::fmt;

use crate::error::{AuthError, AuthResult};

/// Password as typed. Zeroized on drop.
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// Validated form, for registration.
    pub fn new(raw: String) -> AuthResult<Self> {
        let clear_text = ClearTextPassword::new(raw).map_err(|e| {
            let message = match e {
                PasswordPolicyError::TooShort { min, .. } => {
                    format!("Password must be at least {min} characters")
                }
                PasswordPolicyError::TooLong { max, .. } => {
                    format!("Password must be at most {max} characters")
                }
                other => other.to_string(),
            };
            AuthError::validation("password", message)
        })?;

        Ok(Self(clear_text))
    }

    /// Unvalidated form, for login.
    pub fn for_login(raw: String) -> Self {
        Self(ClearTextPassword::for_verification(raw))
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

/// Stored Argon2id digest (PHC string).
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// CPU heavy; call from a blocking context.
    pub fn hash(raw: &RawPassword, cost: &HashCost) -> AuthResult<Self> {
        Ok(Self(raw.0.hash(cost)?))
    }

    /// Digest read back from a backend.
    pub fn from_db(phc_string: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_phc_string(phc_string)
            .map(Self)
            .map_err(|_| AuthError::Internal("Invalid password hash in storage".to_string()))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    /// CPU heavy; call from a blocking context.
    pub fn verify(&self, raw: &RawPassword) -> bool {
        self.0.verify(&raw.0)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}
