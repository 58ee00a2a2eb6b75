//! Identity Store
//!
//! User lifecycle on top of whatever repository is injected (in production
//! the `StorageRouter`).

use std::sync::Arc;

use chrono::Utc;

use crate::application::hasher::CredentialHasher;
use crate::domain::entity::user::validate_display_name;
use crate::domain::entity::{ProfilePatch, User, UserPreferences};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::RawPassword,
};
use crate::error::{AuthError, AuthResult};

const LANGUAGE_MIN_LENGTH: usize = 2;
const LANGUAGE_MAX_LENGTH: usize = 16;

/// Registration input, unvalidated
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub language: Option<String>,
}

pub struct IdentityStore<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    hasher: CredentialHasher,
}

impl<R> IdentityStore<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, hasher: CredentialHasher) -> Self {
        Self { repo, hasher }
    }

    /// Validates, rejects duplicates, hashes, persists.
    pub async fn create_user(&self, registration: Registration) -> AuthResult<User> {
        let username = UserName::new(&registration.username)?;
        let email = Email::new(&registration.email)?;
        let password = RawPassword::new(registration.password)?;
        let display_name = registration
            .display_name
            .map(validate_display_name)
            .transpose()?;
        let preferences = match registration.language {
            Some(language) => UserPreferences::with_language(validate_language(language)?),
            None => UserPreferences::default(),
        };

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateIdentity { field: "email" });
        }
        if self.repo.find_by_username(&username).await?.is_some() {
            return Err(AuthError::DuplicateIdentity { field: "username" });
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = User::register(
            username,
            email,
            password_hash,
            display_name,
            preferences,
        );

        // A concurrent registration can still win the race; the backend's
        // unique constraint reports that as DuplicateIdentity.
        self.repo.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.repo.find_by_email(email).await
    }

    pub async fn get_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        self.repo.find_by_id(user_id).await
    }

    /// Bumps login stats on `user` and in storage.
    ///
    /// A storage failure is logged and swallowed; a login must not fail
    /// because of bookkeeping.
    pub async fn update_login_stats(&self, user: &mut User) {
        let now = Utc::now();
        match self.repo.record_login(&user.id, now).await {
            Ok(()) => user.record_login(now),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to update login stats")
            }
        }
    }

    /// Only the supplied fields change; supplied preferences replace the set.
    pub async fn update_profile(&self, user_id: &UserId, patch: ProfilePatch) -> AuthResult<User> {
        let patch = patch.validated()?;
        if patch.is_empty() {
            return self
                .repo
                .find_by_id(user_id)
                .await?
                .ok_or(AuthError::UserNotFound);
        }

        let user = self
            .repo
            .update_profile(user_id, &patch, Utc::now())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(user)
    }
}

fn validate_language(language: String) -> AuthResult<String> {
    let language = language.trim().to_string();
    let len = language.chars().count();
    if !(LANGUAGE_MIN_LENGTH..=LANGUAGE_MAX_LENGTH).contains(&len) {
        return Err(AuthError::validation(
            "language",
            format!("Must be between {LANGUAGE_MIN_LENGTH} and {LANGUAGE_MAX_LENGTH} characters"),
        ));
    }
    Ok(language)
}
