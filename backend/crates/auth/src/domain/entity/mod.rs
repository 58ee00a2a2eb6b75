//! Entities

pub mod activity_log;
pub mod preferences;
pub mod user;

pub use activity_log::{AdminActivityLog, AdminActor};
pub use preferences::UserPreferences;
pub use user::{ProfilePatch, User};
