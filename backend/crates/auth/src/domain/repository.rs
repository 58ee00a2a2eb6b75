//! Repository Traits
//!
//! Interfaces for data persistence. Both storage backends and the
//! `StorageRouter` in front of them implement these.

use chrono::{DateTime, Utc};

use crate::domain::entity::{AdminActivityLog, ProfilePatch, User};
use crate::domain::value_object::{UserId, email::Email, user_name::UserName, user_role::UserRole};
use crate::error::AuthResult;

/// User persistence
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a new user together with its preferences.
    ///
    /// A unique-constraint violation surfaces as `DuplicateIdentity`.
    async fn insert_user(&self, user: &User) -> AuthResult<()>;

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Case-insensitive lookup on the canonical user name
    async fn find_by_username(&self, user_name: &UserName) -> AuthResult<Option<User>>;

    /// Atomically `login_count + 1`, `last_login = at`, `updated_at = at`
    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()>;

    /// Apply the supplied fields and return the updated user
    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> AuthResult<Option<User>>;

    /// Returns false when the user does not exist
    async fn set_role(&self, user_id: &UserId, role: UserRole, at: DateTime<Utc>) -> AuthResult<bool>;

    /// Returns false when the user does not exist
    async fn set_active(&self, user_id: &UserId, is_active: bool, at: DateTime<Utc>)
    -> AuthResult<bool>;

    /// One page of users matching `filter`, newest first, plus the total
    /// number of matches.
    async fn list_users(&self, filter: &UserListFilter) -> AuthResult<UserPage>;
}

/// Criteria for the admin user listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring of username, email or display name
    pub search: Option<String>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl UserListFilter {
    /// Rows to skip before the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total_count: u64,
}

/// Admin audit trail persistence
#[trait_variant::make(AuditLogRepository: Send)]
pub trait LocalAuditLogRepository {
    async fn append(&self, entry: &AdminActivityLog) -> AuthResult<()>;

    /// Newest first
    async fn recent(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>>;
}

/// Liveness of a storage backend
#[trait_variant::make(BackendHealth: Send)]
pub trait LocalBackendHealth {
    /// Stable name used in logs and `/health`
    fn name(&self) -> &'static str;

    async fn ping(&self) -> AuthResult<()>;
}

/// Everything the use cases need from storage.
pub trait IdentityRepository: UserRepository + AuditLogRepository + Send + Sync + 'static {}

impl<T> IdentityRepository for T where T: UserRepository + AuditLogRepository + Send + Sync + 'static {}
