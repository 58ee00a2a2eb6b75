//! End-to-end tests over the HTTP router, both backends in memory.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::routing::get;
use axum::{Extension, Router, middleware};
use chrono::{Duration, Utc};
use platform::retry::Backoff;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::application::TokenService;
use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{UserId, user_name::UserName, user_role::UserRole};
use crate::infra::StorageRouter;
use crate::infra::memory::MemoryBackend;
use crate::presentation::handlers::AuthAppState;
use crate::presentation::middleware::{MaybeUser, optional_auth};
use crate::presentation::router::auth_router;

type TestRouter = StorageRouter<MemoryBackend, MemoryBackend>;

struct TestApp {
    app: Router,
    repo: Arc<TestRouter>,
    config: AuthConfig,
}

fn test_config() -> AuthConfig {
    AuthConfig {
        health_retry: Backoff::none(),
        ..AuthConfig::development()
    }
}

fn test_app() -> TestApp {
    let config = test_config();
    let repo = Arc::new(StorageRouter::new(
        MemoryBackend::new("primary"),
        MemoryBackend::new("secondary"),
        config.health_retry,
        config.health_timeout,
    ));
    let app = Router::new().nest("/api", auth_router(repo.clone(), config.clone()));
    TestApp { app, repo, config }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, challenge, value)
}

async fn register(app: &Router, username: &str, email: &str) -> Value {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": email,
            "password": "correct-horse-battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    body
}

fn token(body: &Value, field: &str) -> String {
    body[field].as_str().unwrap().to_string()
}

fn user_id(body: &Value) -> UserId {
    body["user"]["id"].as_str().unwrap().parse().unwrap()
}

/// Registers a user and promotes it directly in storage.
async fn admin(test: &TestApp) -> (String, UserId) {
    let body = register(&test.app, "root", "root@example.com").await;
    let id = user_id(&body);
    assert!(test.repo.set_role(&id, UserRole::Admin, Utc::now()).await.unwrap());
    (token(&body, "access_token"), id)
}

// ============================================================================
// Auth flow
// ============================================================================

#[tokio::test]
async fn test_register_login_me_refresh() {
    let test = test_app();

    let registered = register(&test.app, "Alice", "Alice@Example.com").await;
    assert_eq!(registered["token_type"], "bearer");
    assert_eq!(registered["expires_in"], 900);
    assert_eq!(registered["user"]["email"], "alice@example.com");
    assert_eq!(registered["user"]["display_name"], "Alice");
    assert_eq!(registered["user"]["role"], "member");
    assert_eq!(registered["user"]["login_count"], 1);
    assert!(registered["user"].get("password_hash").is_none());

    let (status, _, logged_in) = send(
        &test.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged_in["user"]["login_count"], 2);

    let access = token(&logged_in, "access_token");
    let (status, _, me) = send(&test.app, Method::GET, "/api/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "Alice");
    assert_eq!(me["preferences"]["language"], "en");

    let refresh = token(&logged_in, "refresh_token");
    let (status, _, refreshed) =
        send(&test.app, Method::POST, "/api/auth/refresh", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::OK);
    // Refresh does not count as a login
    assert_eq!(refreshed["user"]["login_count"], 2);

    let new_access = token(&refreshed, "access_token");
    let (status, _, _) = send(&test.app, Method::GET, "/api/auth/me", Some(&new_access), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_duplicates() {
    let test = test_app();
    register(&test.app, "alice", "alice@example.com").await;

    let (status, _, body) = send(
        &test.app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "someone",
            "email": "ALICE@example.com",
            "password": "correct-horse-battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "User with this email already exists");

    let (status, _, body) = send(
        &test.app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ALICE",
            "email": "other@example.com",
            "password": "correct-horse-battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "User with this username already exists");
}

#[tokio::test]
async fn test_register_validates_input() {
    let test = test_app();
    let (status, _, _) = send(
        &test.app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "bob", "email": "not-an-email", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &test.app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "bob", "email": "bob@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &test.app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "correct-horse-battery",
            "display_name": "b".repeat(51),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("display_name"));
    assert_eq!(test.repo.primary().user_count(), 0);
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let test = test_app();
    register(&test.app, "alice", "alice@example.com").await;

    for (email, password) in [
        ("alice@example.com", "wrong-password-here"),
        ("nobody@example.com", "correct-horse-battery"),
        ("garbage", "correct-horse-battery"),
    ] {
        let (status, challenge, body) = send(
            &test.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(challenge.as_deref(), Some("Bearer"));
        assert_eq!(body["detail"], "Invalid email or password");
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[tokio::test]
async fn test_bad_tokens_are_401_with_challenge() {
    let test = test_app();
    let registered = register(&test.app, "alice", "alice@example.com").await;
    let tokens = TokenService::new(&test.config);

    let expired = tokens
        .issue_access_at(
            &user_id(&registered),
            &UserName::new("alice").unwrap(),
            UserRole::Member,
            Utc::now() - Duration::hours(1),
        )
        .unwrap();
    let unknown_user = tokens
        .issue_access(&UserId::new(), &UserName::new("ghost").unwrap(), UserRole::Admin)
        .unwrap();
    let refresh_as_access = token(&registered, "refresh_token");

    for bad in [
        "garbage".to_string(),
        expired,
        unknown_user,
        refresh_as_access,
    ] {
        let (status, challenge, _) = send(&test.app, Method::GET, "/api/auth/me", Some(&bad), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(challenge.as_deref(), Some("Bearer"));
    }

    let (status, _, _) = send(&test.app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let test = test_app();
    let registered = register(&test.app, "alice", "alice@example.com").await;

    let access = token(&registered, "access_token");
    let (status, _, _) = send(&test.app, Method::POST, "/api/auth/refresh", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&test.app, Method::POST, "/api/auth/refresh", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_update_profile() {
    let test = test_app();
    let registered = register(&test.app, "alice", "alice@example.com").await;
    let access = token(&registered, "access_token");

    let (status, _, updated) = send(
        &test.app,
        Method::PUT,
        "/api/auth/me",
        Some(&access),
        Some(json!({
            "display_name": "  Alice A.  ",
            "bio": "hello",
            "preferences": {"language": "ja", "theme": "light"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["display_name"], "Alice A.");
    assert_eq!(updated["bio"], "hello");
    assert_eq!(updated["preferences"]["language"], "ja");
    assert_eq!(updated["preferences"]["theme"], "light");
    // Omitted preference fields take their defaults
    assert_eq!(updated["preferences"]["notifications"], true);

    let (status, _, _) = send(
        &test.app,
        Method::PUT,
        "/api/auth/me",
        Some(&access),
        Some(json!({"display_name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let test = test_app();
    let member = register(&test.app, "alice", "alice@example.com").await;
    let member_token = token(&member, "access_token");
    let member_id = user_id(&member);

    let uri = format!("/api/admin/users/{member_id}");
    let (status, challenge, _) = send(&test.app, Method::GET, &uri, Some(&member_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(challenge.is_none());

    let (status, _, _) = send(&test.app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (admin_token, _) = admin(&test).await;
    let (status, _, body) = send(&test.app, Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let missing = format!("/api/admin/users/{}", UserId::new());
    let (status, _, _) = send(&test.app, Method::GET, &missing, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) =
        send(&test.app, Method::GET, "/api/admin/users/not-a-uuid", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_lists_users() {
    let test = test_app();
    let alice = register(&test.app, "alice", "alice@example.com").await;
    register(&test.app, "bob", "bob@example.com").await;
    let (admin_token, _) = admin(&test).await;
    assert!(
        test.repo
            .set_active(&user_id(&alice), false, Utc::now())
            .await
            .unwrap()
    );

    let list = |uri: &'static str| send(&test.app, Method::GET, uri, Some(&admin_token), None);

    let (status, _, body) = list("/api/admin/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["total_pages"], 1);
    assert!(body["users"][0].get("password_hash").is_none());

    let (_, _, body) = list("/api/admin/users?is_active=false").await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["users"][0]["username"], "alice");

    let (_, _, body) = list("/api/admin/users?role=admin").await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["users"][0]["username"], "root");

    let (_, _, body) = list("/api/admin/users?search=BOB%40").await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["users"][0]["email"], "bob@example.com");

    let (_, _, body) = list("/api/admin/users?page=2&limit=2").await;
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);

    for bad in [
        "/api/admin/users?page=0",
        "/api/admin/users?limit=0",
        "/api/admin/users?limit=101",
        "/api/admin/users?role=owner",
    ] {
        let (status, _, _) = list(bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
    }

    let member = register(&test.app, "carol", "carol@example.com").await;
    let (status, _, _) = send(
        &test.app,
        Method::GET,
        "/api/admin/users",
        Some(&token(&member, "access_token")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_role_change_is_audited() {
    let test = test_app();
    let member = register(&test.app, "alice", "alice@example.com").await;
    let member_id = user_id(&member);
    let (admin_token, admin_id) = admin(&test).await;

    let uri = format!("/api/admin/users/{member_id}/role");
    let (status, _, _) = send(
        &test.app,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({"role": "superuser"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &test.app,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({"role": "moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _, body) =
        send(&test.app, Method::GET, "/api/admin/activity-logs", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    let entry = &body["logs"][0];
    assert_eq!(entry["action"], "update_role");
    assert_eq!(entry["admin_user_id"], admin_id.to_string());
    assert_eq!(entry["target_type"], "user");
    assert_eq!(entry["target_id"], member_id.to_string());
    assert_eq!(entry["details"]["old_role"], "member");
    assert_eq!(entry["details"]["new_role"], "moderator");
}

#[tokio::test]
async fn test_deactivation_revokes_live_tokens() {
    let test = test_app();
    let member = register(&test.app, "alice", "alice@example.com").await;
    let member_token = token(&member, "access_token");
    let member_id = user_id(&member);
    let (admin_token, _) = admin(&test).await;

    let (status, _, body) = send(
        &test.app,
        Method::PUT,
        &format!("/api/admin/users/{member_id}/status"),
        Some(&admin_token),
        Some(json!({"is_active": false, "reason": "spam"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User account disabled successfully");

    let (status, _, _) = send(&test.app, Method::GET, "/api/auth/me", Some(&member_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &test.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "User account is deactivated");
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let test = test_app();
    let member = register(&test.app, "alice", "alice@example.com").await;
    let member_id = user_id(&member);
    let (admin_token, admin_id) = admin(&test).await;

    let (status, _, _) = send(
        &test.app,
        Method::DELETE,
        &format!("/api/admin/users/{admin_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &test.app,
        Method::DELETE,
        &format!("/api/admin/users/{member_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Soft delete: the record stays, disabled
    let (_, _, body) = send(
        &test.app,
        Method::GET,
        &format!("/api/admin/users/{member_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn test_activity_log_limit_range() {
    let test = test_app();
    let (admin_token, _) = admin(&test).await;

    for limit in ["0", "501"] {
        let uri = format!("/api/admin/activity-logs?limit={limit}");
        let (status, _, _) = send(&test.app, Method::GET, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit={limit}");
    }

    for limit in ["1", "500"] {
        let uri = format!("/api/admin/activity-logs?limit={limit}");
        let (status, _, body) = send(&test.app, Method::GET, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK, "limit={limit}");
        assert_eq!(body["total_count"], 0);
    }
}

// ============================================================================
// Storage fallback
// ============================================================================

#[tokio::test]
async fn test_requests_survive_primary_outage() {
    let test = test_app();
    test.repo.primary().set_available(false);

    let registered = register(&test.app, "alice", "alice@example.com").await;
    assert_eq!(test.repo.primary().user_count(), 0);
    assert_eq!(test.repo.secondary().user_count(), 1);

    let access = token(&registered, "access_token");
    let (status, _, me) = send(&test.app, Method::GET, "/api/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn test_both_backends_down_is_503() {
    let test = test_app();
    test.repo.primary().set_available(false);
    test.repo.secondary().set_available(false);

    let (status, _, body) = send(
        &test.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Storage backend unavailable");
}

// ============================================================================
// Optional authentication
// ============================================================================

async fn whoami(Extension(MaybeUser(user)): Extension<MaybeUser>) -> String {
    user.map(|u| u.username.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

#[tokio::test]
async fn test_optional_auth_never_rejects() {
    let test = test_app();
    let registered = register(&test.app, "alice", "alice@example.com").await;
    let access = token(&registered, "access_token");

    let state = AuthAppState::new(test.repo.clone(), test.config.clone());
    let app = Router::new()
        .route("/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth::<TestRouter>,
        ))
        .with_state(state);

    for (bearer, expected) in [
        (Some(access.as_str()), "alice"),
        (Some("garbage"), "anonymous"),
        (None, "anonymous"),
    ] {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], expected.as_bytes());
    }
}
