//! Auth Middleware
//!
//! Bearer authentication and role checks for protected routes. The
//! authenticated user travels to handlers as a request extension.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use platform::bearer::extract_bearer;
use platform::client::{extract_client_ip, extract_user_agent};

use crate::application::require_role;
use crate::domain::entity::User;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Routes reserved for administrators
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

/// Authenticated, active caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Caller on routes where authentication is optional
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Where the request came from, for the audit trail
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    fn from_request(req: &Request) -> Self {
        let direct_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        Self {
            ip_address: extract_client_ip(req.headers(), direct_ip).map(|ip| ip.to_string()),
            user_agent: extract_user_agent(req.headers()),
        }
    }
}

/// Rejects the request with 401 unless it carries a valid access token for
/// an active user.
pub async fn require_auth<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: IdentityRepository,
{
    let token = extract_bearer(req.headers()).ok_or(AuthError::Unauthorized)?;
    let user = state.gate().authenticate(token).await?;

    let meta = ClientMeta::from_request(&req);
    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(meta);

    Ok(next.run(req).await)
}

/// Never rejects; inserts `MaybeUser(None)` when authentication fails.
pub async fn optional_auth<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request,
    next: Next,
) -> Response
where
    R: IdentityRepository,
{
    let token = extract_bearer(req.headers());
    let user = state.gate().authenticate_optional(token).await;

    req.extensions_mut().insert(MaybeUser(user));
    next.run(req).await
}

/// Must run after `require_auth`. 403 unless the caller's role is allowed.
pub async fn require_roles(
    State(allowed): State<&'static [UserRole]>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let CurrentUser(user) = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::Unauthorized)?;

    require_role(user, allowed)?;
    Ok(next.run(req).await)
}
