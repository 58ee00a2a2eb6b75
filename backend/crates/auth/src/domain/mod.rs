//! Domain Layer
//!
//! Entities, value objects, and the persistence traits the backends implement.

pub mod entity;
pub mod repository;
pub mod value_object;

pub use entity::{AdminActivityLog, AdminActor, ProfilePatch, User, UserPreferences};
pub use repository::{
    AuditLogRepository, BackendHealth, IdentityRepository, UserListFilter, UserPage, UserRepository,
};
