//! User role
//!
//! Closed set. Crosses every text boundary (JSON, token claims, storage
//! columns) as its canonical lowercase string, and parses back failing safe
//! to the lowest privilege.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserRole {
    Admin,
    Moderator,
    #[default]
    Member,
    Banned,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Admin,
        UserRole::Moderator,
        UserRole::Member,
        UserRole::Banned,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Moderator => "moderator",
            UserRole::Member => "member",
            UserRole::Banned => "banned",
        }
    }

    /// Strict parse, for admin input where a typo must be rejected.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Lenient parse for values read back from tokens or storage.
    pub fn from_code_or_lowest(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            tracing::warn!(role = %code, "Unrecognized role, treating as banned");
            UserRole::Banned
        })
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for UserRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code_or_lowest(&code))
    }
}
