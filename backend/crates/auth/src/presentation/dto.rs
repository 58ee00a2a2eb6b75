//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::SignedIn;
use crate::domain::entity::{AdminActivityLog, User, UserPreferences};
use crate::domain::repository::{UserListFilter, UserPage};
use crate::domain::value_object::user_role::UserRole;

pub const TOKEN_TYPE: &str = "bearer";

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of register, login and refresh responses
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserResponse,
}

impl From<SignedIn> for TokenResponse {
    fn from(signed_in: SignedIn) -> Self {
        Self {
            access_token: signed_in.tokens.access_token,
            refresh_token: signed_in.tokens.refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: signed_in.tokens.expires_in,
            user: signed_in.user.into(),
        }
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    pub steam_id: Option<String>,
    pub preferences: UserPreferences,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            role: user.role,
            steam_id: user.steam_id,
            preferences: user.preferences,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login: user.last_login,
            login_count: user.login_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub preferences: Option<UserPreferences>,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    /// Parsed strictly; an unknown role is a 400
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub is_active: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// `GET /admin/users` query string; omitted criteria match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total_count: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl UserListResponse {
    pub fn new(page: UserPage, filter: &UserListFilter) -> Self {
        let limit = u64::from(filter.limit.max(1));
        Self {
            users: page.users.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: filter.page,
            limit: filter.limit,
            total_pages: page.total_count.div_ceil(limit),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityLogsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogResponse {
    pub id: String,
    pub admin_user_id: String,
    pub admin_username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub details: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AdminActivityLog> for ActivityLogResponse {
    fn from(entry: AdminActivityLog) -> Self {
        Self {
            id: entry.id.to_string(),
            admin_user_id: entry.admin_user_id.to_string(),
            admin_username: entry.admin_username,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogsResponse {
    pub logs: Vec<ActivityLogResponse>,
    pub total_count: usize,
}
