//! Client identification from request headers
//!
//! Feeds the admin audit trail; nothing here is used for authentication.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Longest user agent kept verbatim.
const MAX_USER_AGENT_LEN: usize = 512;

/// Client IP, preferring the first `X-Forwarded-For` hop over the socket
/// address.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or(direct_ip)
}

/// `User-Agent`, truncated on a char boundary.
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    let ua = headers.get(header::USER_AGENT)?.to_str().ok()?.trim();
    if ua.is_empty() {
        return None;
    }
    let end = ua
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= MAX_USER_AGENT_LEN)
        .last()
        .unwrap_or(0);
    Some(ua[..end].to_string())
}
