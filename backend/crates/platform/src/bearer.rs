//! `Authorization: Bearer` handling

use axum::http::{HeaderMap, header};

/// Value for `WWW-Authenticate` on 401 responses.
pub const BEARER_CHALLENGE: &str = "Bearer";

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Empty tokens and other schemes
/// yield `None`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
