//! User preferences

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_THEME: &str = "darkNeon";

/// Per-user settings, created with the user and deleted with it.
///
/// Replaced as a whole on update; there is no field-level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub language: String,
    pub theme: String,
    /// Opaque theme variables chosen by the client
    pub custom_theme: Option<Map<String, Value>>,
    pub notifications: bool,
    pub steam_profile_public: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            custom_theme: None,
            notifications: true,
            steam_profile_public: false,
        }
    }
}

impl UserPreferences {
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let prefs: UserPreferences = serde_json::from_str(r#"{"theme":"light"}"#).unwrap();
        assert_eq!(prefs.theme, "light");
        assert_eq!(prefs.language, DEFAULT_LANGUAGE);
        assert!(prefs.notifications);
        assert!(!prefs.steam_profile_public);
        assert!(prefs.custom_theme.is_none());
    }

    #[test]
    fn test_custom_theme_is_opaque() {
        let prefs: UserPreferences =
            serde_json::from_str(r##"{"custom_theme":{"accent":"#ff00ff","glow":2}}"##).unwrap();
        let theme = prefs.custom_theme.unwrap();
        assert_eq!(theme["accent"], "#ff00ff");
        assert_eq!(theme["glow"], 2);
    }
}
