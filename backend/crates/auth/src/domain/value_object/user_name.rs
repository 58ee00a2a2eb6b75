//! User name value object
//!
//! The public handle. Stored as typed; uniqueness is enforced on the
//! canonical (lowercase) form so `Alice` and `alice` cannot coexist.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AuthError, AuthResult};

pub const USER_NAME_MIN_LENGTH: usize = 3;
pub const USER_NAME_MAX_LENGTH: usize = 30;

const ALLOWED_SPECIAL_CHARS: &[char] = &['_', '.', '-'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    /// NFKC-normalizes, trims and validates.
    pub fn new(raw: impl AsRef<str>) -> AuthResult<Self> {
        let normalized: String = raw.as_ref().nfkc().collect();
        let name = normalized.trim();

        let len = name.chars().count();
        if len < USER_NAME_MIN_LENGTH || len > USER_NAME_MAX_LENGTH {
            return Err(AuthError::validation(
                "username",
                format!(
                    "Username must be between {USER_NAME_MIN_LENGTH} and {USER_NAME_MAX_LENGTH} characters"
                ),
            ));
        }

        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_alphanumeric() || ALLOWED_SPECIAL_CHARS.contains(c)))
        {
            return Err(AuthError::validation(
                "username",
                format!("Username contains an invalid character: {bad:?}"),
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used for uniqueness.
    pub fn canonical(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!(UserName::new("ab").is_err());
        assert!(UserName::new("abc").is_ok());
        assert!(UserName::new("a".repeat(30)).is_ok());
        assert!(UserName::new("a".repeat(31)).is_err());
    }

    #[test]
    fn test_trims_and_keeps_case() {
        let name = UserName::new("  PlayerOne ").unwrap();
        assert_eq!(name.as_str(), "PlayerOne");
        assert_eq!(name.canonical(), "playerone");
    }

    #[test]
    fn test_rejects_inner_whitespace_and_symbols() {
        assert!(UserName::new("player one").is_err());
        assert!(UserName::new("player<script>").is_err());
        assert!(UserName::new("tab\there").is_err());
    }

    #[test]
    fn test_allows_unicode_letters_and_separators() {
        assert!(UserName::new("ゲーマー_01").is_ok());
        assert!(UserName::new("s1mple.fan-club").is_ok());
    }

    #[test]
    fn test_nfkc_counts_normalized_length() {
        // Fullwidth letters collapse to ASCII
        let name = UserName::new("ＡＢＣ").unwrap();
        assert_eq!(name.as_str(), "ABC");
    }
}
