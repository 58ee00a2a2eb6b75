//! Liveness endpoint

use std::sync::Arc;

use auth::StorageRouter;
use auth::domain::repository::BackendHealth;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub primary_backend: &'static str,
    pub secondary_backend: &'static str,
    pub version: &'static str,
}

/// Always 200 while the process serves requests; backend state is reported,
/// not enforced.
async fn health<P, S>(State(router): State<Arc<StorageRouter<P, S>>>) -> Json<HealthResponse>
where
    P: BackendHealth + Send + Sync + 'static,
    S: BackendHealth + Send + Sync + 'static,
{
    let status = router.status().await;
    Json(HealthResponse {
        status: "healthy",
        primary_backend: status.primary.label(),
        secondary_backend: status.secondary.label(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn health_router<P, S>(router: Arc<StorageRouter<P, S>>) -> Router
where
    P: BackendHealth + Send + Sync + 'static,
    S: BackendHealth + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health::<P, S>))
        .with_state(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::{AuthError, AuthResult, Backoff};
    use std::time::Duration;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct Fixed {
        name: &'static str,
        up: bool,
    }

    impl BackendHealth for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn ping(&self) -> AuthResult<()> {
            if self.up {
                Ok(())
            } else {
                Err(AuthError::BackendUnavailable)
            }
        }
    }

    #[tokio::test]
    async fn test_health_reports_backends() {
        let router = StorageRouter::new(
            Fixed { name: "postgres", up: false },
            Fixed { name: "mongodb", up: true },
            Backoff::none(),
            Duration::from_millis(100),
        );
        let app = health_router(Arc::new(router));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["primary_backend"], "disconnected");
        assert_eq!(body["secondary_backend"], "connected");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
