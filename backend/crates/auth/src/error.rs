//! Auth error types
//!
//! Every failure inside the crate is an [`AuthError`]. At the HTTP boundary
//! it is logged once and converted into a `kernel` [`AppError`]; internal
//! details never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::bearer::BEARER_CHALLENGE;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input, with the offending field
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Email or username already registered
    #[error("User with this {field} already exists")]
    DuplicateIdentity { field: &'static str },

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Correct password, disabled account
    #[error("User account is deactivated")]
    AccountDeactivated,

    /// Bad, expired or wrong-kind token; missing or inactive account
    #[error("Could not validate credentials")]
    Unauthorized,

    /// Authenticated but the role is not allowed
    #[error("Insufficient permissions")]
    Forbidden,

    /// Target of an admin operation does not exist
    #[error("User not found")]
    UserNotFound,

    /// Admin tried to delete their own account
    #[error("Cannot delete your own admin account")]
    SelfTarget,

    /// Neither persistence backend could serve the request
    #[error("Storage backend unavailable")]
    BackendUnavailable,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation { .. }
            | AuthError::DuplicateIdentity { .. }
            | AuthError::SelfTarget => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::AccountDeactivated
            | AuthError::Unauthorized => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::BackendUnavailable => ErrorKind::ServiceUnavailable,
            AuthError::Database(e) => match kernel::error::conversions::classify_sqlx(e) {
                ErrorKind::ServiceUnavailable => ErrorKind::ServiceUnavailable,
                _ => ErrorKind::InternalServerError,
            },
            AuthError::Document(e) => classify_document(e),
            AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Client-facing form. Server-side causes get a generic message.
    pub fn to_app_error(&self) -> AppError {
        let kind = self.kind();
        let err = match self {
            AuthError::Database(_) | AuthError::Document(_) | AuthError::Internal(_) => {
                if kind == ErrorKind::ServiceUnavailable {
                    AppError::service_unavailable("Storage backend unavailable")
                        .with_action("Please try again later")
                } else {
                    AppError::internal("Internal server error")
                }
            }
            AuthError::BackendUnavailable => AppError::service_unavailable(self.to_string())
                .with_action("Please try again later"),
            _ => AppError::new(kind, self.to_string()),
        };

        if kind == ErrorKind::Unauthorized {
            err.with_header("WWW-Authenticate", BEARER_CHALLENGE)
        } else {
            err
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => tracing::error!(error = %e, "Auth database error"),
            AuthError::Document(e) => tracing::error!(error = %e, "Auth document store error"),
            AuthError::Internal(msg) => tracing::error!(message = %msg, "Auth internal error"),
            AuthError::BackendUnavailable => tracing::error!("No storage backend available"),
            AuthError::InvalidCredentials => tracing::warn!("Invalid login attempt"),
            AuthError::AccountDeactivated => tracing::warn!("Login attempt on deactivated account"),
            AuthError::Forbidden => tracing::warn!("Role check failed"),
            _ => tracing::debug!(error = %self, "Auth error"),
        }
    }
}

/// Unreachable server, dropped connection or pool reset means the store
/// is down, not that the request was wrong.
fn classify_document(err: &mongodb::error::Error) -> ErrorKind {
    use mongodb::error::ErrorKind as MongoKind;

    match err.kind.as_ref() {
        MongoKind::ServerSelection { .. }
        | MongoKind::Io(_)
        | MongoKind::ConnectionPoolCleared { .. }
        | MongoKind::DnsResolve { .. } => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::InternalServerError,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("Blocking task failed: {err}"))
    }
}
