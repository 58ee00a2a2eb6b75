//! User entity

use chrono::{DateTime, Utc};

use crate::domain::entity::preferences::UserPreferences;
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const DISPLAY_NAME_MAX_LENGTH: usize = 50;
const BIO_MAX_LENGTH: usize = 500;
const AVATAR_URL_MAX_LENGTH: usize = 2048;
const LANGUAGE_MAX_LENGTH: usize = 16;

/// A registered account.
///
/// `password_hash` never leaves the crate in a response DTO.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: UserName,
    pub email: Email,
    pub password_hash: UserPassword,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    /// External platform (Steam) account id
    pub steam_id: Option<String>,
    pub preferences: UserPreferences,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i64,
}

impl User {
    /// Fresh member account. Display name falls back to the username.
    pub fn register(
        username: UserName,
        email: Email,
        password_hash: UserPassword,
        display_name: Option<String>,
        preferences: UserPreferences,
    ) -> Self {
        let now = Utc::now();
        let display_name = display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| username.as_str().to_string());

        Self {
            id: UserId::new(),
            username,
            email,
            password_hash,
            display_name: Some(display_name),
            avatar_url: None,
            bio: None,
            role: UserRole::default(),
            steam_id: None,
            preferences,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login: None,
            login_count: 0,
        }
    }

    /// Mirrors a successful login stats update.
    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login = Some(at);
        self.updated_at = at;
        self.login_count += 1;
    }

    /// Applies only the fields present in `patch`.
    #[cfg(test)]
    pub fn apply(&mut self, patch: &ProfilePatch, at: DateTime<Utc>) {
        if let Some(display_name) = &patch.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(bio) = &patch.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(preferences) = &patch.preferences {
            self.preferences = preferences.clone();
        }
        if !patch.is_empty() {
            self.updated_at = at;
        }
    }
}

/// Partial profile update. `None` means "leave as is", never "clear".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub preferences: Option<UserPreferences>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
            && self.preferences.is_none()
    }

    /// Trims text fields and enforces length limits.
    pub fn validated(mut self) -> AuthResult<Self> {
        if let Some(display_name) = self.display_name.take() {
            self.display_name = Some(validate_display_name(display_name)?);
        }
        if let Some(bio) = self.bio.take() {
            let bio = bio.trim().to_string();
            check_len("bio", &bio, 0, BIO_MAX_LENGTH)?;
            self.bio = Some(bio);
        }
        if let Some(avatar_url) = self.avatar_url.take() {
            let avatar_url = avatar_url.trim().to_string();
            check_len("avatar_url", &avatar_url, 0, AVATAR_URL_MAX_LENGTH)?;
            self.avatar_url = Some(avatar_url);
        }
        if let Some(preferences) = &self.preferences {
            check_len("preferences.language", &preferences.language, 2, LANGUAGE_MAX_LENGTH)?;
        }
        Ok(self)
    }
}

/// Trimmed display name of 1..=50 characters.
pub(crate) fn validate_display_name(raw: String) -> AuthResult<String> {
    let display_name = raw.trim().to_string();
    check_len("display_name", &display_name, 1, DISPLAY_NAME_MAX_LENGTH)?;
    Ok(display_name)
}

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> AuthResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AuthError::validation(
            field,
            format!("Must be between {min} and {max} characters"),
        ));
    }
    Ok(())
}
