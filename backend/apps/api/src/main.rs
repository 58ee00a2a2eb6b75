//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod health;

use anyhow::Context;
use auth::{AuthConfig, MongoIdentityBackend, PgIdentityBackend, StorageRouter, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_MONGO_DB_NAME: &str = "hub";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hub_api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let auth_config = AuthConfig::from_env().context("Invalid auth configuration")?;
    tracing::info!(config = ?auth_config, "Auth configuration loaded");

    // Primary: Postgres, connected lazily
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(3))
        .connect_lazy(&database_url)
        .context("Invalid DATABASE_URL")?;

    match sqlx::migrate!("../../../database/migrations").run(&pool).await {
        Ok(()) => tracing::info!("Migrations completed"),
        Err(e) => tracing::warn!(error = %e, "Migrations failed, continuing with fallback available"),
    }

    // Secondary: MongoDB
    let mongo_url = env::var("MONGO_URL").context("MONGO_URL must be set")?;
    let mongo_db = env::var("MONGO_DB_NAME").unwrap_or_else(|_| DEFAULT_MONGO_DB_NAME.to_string());
    let mongo = MongoIdentityBackend::connect(&mongo_url, &mongo_db)
        .await
        .context("Invalid MONGO_URL")?;

    if let Err(e) = mongo.ensure_indexes().await {
        tracing::warn!(error = %e, "MongoDB index setup failed, continuing anyway");
    }

    let identity = Arc::new(StorageRouter::new(
        PgIdentityBackend::new(pool),
        mongo,
        auth_config.health_retry,
        auth_config.health_timeout,
    ));

    // CORS configuration
    let cors = match env::var("FRONTEND_ORIGINS") {
        Ok(frontend_origins) => {
            let allowed_origins: Vec<http::HeaderValue> = frontend_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods(AllowMethods::list([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ]))
                .allow_headers(AllowHeaders::list([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                ]))
                .allow_credentials(true)
        }
        Err(_) => {
            tracing::warn!("FRONTEND_ORIGINS not set, allowing any origin");
            CorsLayer::permissive()
        }
    };

    // Build router
    let app = Router::new()
        .nest("/api", auth_router(identity.clone(), auth_config))
        .merge(health::health_router(identity))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .context("BIND_ADDR must be host:port")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
