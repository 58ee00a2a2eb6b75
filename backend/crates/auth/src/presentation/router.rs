//! Auth Router

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::repository::IdentityRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{ADMIN_ONLY, require_auth, require_roles};

/// Auth and admin routes, to be nested under `/api`.
pub fn auth_router<R>(repo: Arc<R>, config: AuthConfig) -> Router
where
    R: IdentityRepository,
{
    let state = AuthAppState::new(repo, config);

    let public = Router::new()
        .route("/auth/register", post(handlers::register::<R>))
        .route("/auth/login", post(handlers::login::<R>))
        .route("/auth/refresh", post(handlers::refresh::<R>));

    let authenticated = Router::new()
        .route("/auth/me", get(handlers::me).put(handlers::update_me::<R>))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth::<R>));

    // Layers run bottom-up: authenticate first, then check the role
    let admin = Router::new()
        .route("/admin/users", get(handlers::admin_list_users::<R>))
        .route("/admin/users/{id}", get(handlers::admin_get_user::<R>).delete(handlers::admin_delete_user::<R>))
        .route("/admin/users/{id}/role", put(handlers::admin_update_role::<R>))
        .route("/admin/users/{id}/status", put(handlers::admin_update_status::<R>))
        .route("/admin/activity-logs", get(handlers::admin_activity_logs::<R>))
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, require_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth::<R>));

    public.merge(authenticated).merge(admin).with_state(state)
}
