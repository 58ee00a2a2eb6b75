//! HTTP Handlers

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use std::sync::Arc;

use platform::bearer::extract_bearer;

use crate::application::config::AuthConfig;
use crate::application::token::TokenService;
use crate::application::admin::{ACTIVITY_LOG_DEFAULT_LIMIT, USER_LIST_DEFAULT_LIMIT};
use crate::application::{
    AdminUseCase, AuthorizationGate, CredentialHasher, IdentityStore, LoginInput, LoginUseCase,
    RefreshUseCase, RegisterUseCase, Registration,
};
use crate::domain::entity::{AdminActor, ProfilePatch, User};
use crate::domain::repository::{IdentityRepository, UserListFilter};
use crate::domain::value_object::{UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    ActionResponse, ActivityLogsQuery, ActivityLogsResponse, LoginRequest, RegisterRequest,
    RoleUpdateRequest, StatusUpdateRequest, TokenResponse, UpdateProfileRequest, UserListQuery,
    UserListResponse, UserResponse,
};
use crate::presentation::middleware::{ClientMeta, CurrentUser};

/// Shared state for auth handlers
pub struct AuthAppState<R> {
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub tokens: Arc<TokenService>,
}

// Manual impl: `R` itself need not be `Clone`
impl<R> Clone for AuthAppState<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<R> AuthAppState<R>
where
    R: IdentityRepository,
{
    pub fn new(repo: Arc<R>, config: AuthConfig) -> Self {
        let tokens = Arc::new(TokenService::new(&config));
        Self {
            repo,
            config: Arc::new(config),
            tokens,
        }
    }

    pub fn gate(&self) -> AuthorizationGate<R> {
        AuthorizationGate::new(self.repo.clone(), self.tokens.clone())
    }

    fn identity_store(&self) -> IdentityStore<R> {
        IdentityStore::new(self.repo.clone(), CredentialHasher::new(self.config.hash_cost))
    }
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/auth/register
pub async fn register<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: IdentityRepository,
{
    let use_case = RegisterUseCase::new(state.repo.clone(), state.config.clone(), state.tokens.clone());

    let signed_in = use_case
        .execute(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
            display_name: req.display_name,
            language: req.language,
        })
        .await?;

    Ok(Json(signed_in.into()))
}

/// POST /api/auth/login
pub async fn login<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: IdentityRepository,
{
    let use_case = LoginUseCase::new(state.repo.clone(), state.config.clone(), state.tokens.clone());

    let signed_in = use_case
        .execute(LoginInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(Json(signed_in.into()))
}

/// POST /api/auth/refresh
///
/// The refresh token comes in the `Authorization: Bearer` header.
pub async fn refresh<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<Json<TokenResponse>>
where
    R: IdentityRepository,
{
    let token = extract_bearer(&headers).ok_or(AuthError::Unauthorized)?;
    let use_case = RefreshUseCase::new(state.repo.clone(), state.tokens.clone());

    let signed_in = use_case.execute(token).await?;
    Ok(Json(signed_in.into()))
}

/// GET /api/auth/me
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/auth/me
pub async fn update_me<R>(
    State(state): State<AuthAppState<R>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: IdentityRepository,
{
    let patch = ProfilePatch {
        display_name: req.display_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
        preferences: req.preferences,
    };

    let updated = state.identity_store().update_profile(&user.id, patch).await?;
    Ok(Json(updated.into()))
}

// ============================================================================
// Admin
// ============================================================================

fn actor(user: &User, meta: ClientMeta) -> AdminActor {
    AdminActor {
        user_id: user.id,
        username: user.username.to_string(),
        ip_address: meta.ip_address,
        user_agent: meta.user_agent,
    }
}

/// Ids are opaque to clients; one that does not parse names nobody.
fn target_id(raw: &str) -> AuthResult<UserId> {
    raw.parse().map_err(|_| AuthError::UserNotFound)
}

/// GET /api/admin/users?role=&is_active=&search=&page=&limit=
pub async fn admin_list_users<R>(
    State(state): State<AuthAppState<R>>,
    Query(query): Query<UserListQuery>,
) -> AuthResult<Json<UserListResponse>>
where
    R: IdentityRepository,
{
    let role = query
        .role
        .map(|code| {
            UserRole::from_code(&code)
                .ok_or_else(|| AuthError::validation("role", format!("Unknown role: {code}")))
        })
        .transpose()?;

    let filter = UserListFilter {
        role,
        is_active: query.is_active,
        search: query.search,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(USER_LIST_DEFAULT_LIMIT),
    };
    let page = AdminUseCase::new(state.repo.clone())
        .list_users(filter.clone())
        .await?;

    Ok(Json(UserListResponse::new(page, &filter)))
}

/// GET /api/admin/users/{id}
pub async fn admin_get_user<R>(
    State(state): State<AuthAppState<R>>,
    Path(id): Path<String>,
) -> AuthResult<Json<UserResponse>>
where
    R: IdentityRepository,
{
    let user = AdminUseCase::new(state.repo.clone())
        .get_user(&target_id(&id)?)
        .await?;
    Ok(Json(user.into()))
}

/// PUT /api/admin/users/{id}/role
pub async fn admin_update_role<R>(
    State(state): State<AuthAppState<R>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<String>,
    Json(req): Json<RoleUpdateRequest>,
) -> AuthResult<Json<ActionResponse>>
where
    R: IdentityRepository,
{
    let role = UserRole::from_code(&req.role)
        .ok_or_else(|| AuthError::validation("role", format!("Unknown role: {}", req.role)))?;

    AdminUseCase::new(state.repo.clone())
        .change_role(&actor(&admin, meta), &target_id(&id)?, role)
        .await?;

    Ok(Json(ActionResponse::ok("User role updated successfully")))
}

/// PUT /api/admin/users/{id}/status
pub async fn admin_update_status<R>(
    State(state): State<AuthAppState<R>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> AuthResult<Json<ActionResponse>>
where
    R: IdentityRepository,
{
    AdminUseCase::new(state.repo.clone())
        .change_status(&actor(&admin, meta), &target_id(&id)?, req.is_active, req.reason)
        .await?;

    let status_text = if req.is_active { "enabled" } else { "disabled" };
    Ok(Json(ActionResponse::ok(format!("User account {status_text} successfully"))))
}

/// DELETE /api/admin/users/{id}
pub async fn admin_delete_user<R>(
    State(state): State<AuthAppState<R>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<String>,
) -> AuthResult<Json<ActionResponse>>
where
    R: IdentityRepository,
{
    AdminUseCase::new(state.repo.clone())
        .delete_user(&actor(&admin, meta), &target_id(&id)?)
        .await?;

    Ok(Json(ActionResponse::ok("User account deleted successfully")))
}

/// GET /api/admin/activity-logs?limit=
pub async fn admin_activity_logs<R>(
    State(state): State<AuthAppState<R>>,
    Query(query): Query<ActivityLogsQuery>,
) -> AuthResult<Json<ActivityLogsResponse>>
where
    R: IdentityRepository,
{
    let limit = query.limit.unwrap_or(ACTIVITY_LOG_DEFAULT_LIMIT);
    let logs = AdminUseCase::new(state.repo.clone())
        .activity_logs(limit)
        .await?;

    let logs: Vec<_> = logs.into_iter().map(Into::into).collect();
    Ok(Json(ActivityLogsResponse {
        total_count: logs.len(),
        logs,
    }))
}
