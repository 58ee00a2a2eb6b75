//! Token Service
//!
//! HS256 access and refresh tokens. Each kind has its own key and lifetime,
//! and carries its kind in the `type` claim, so one can never stand in for
//! the other.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::application::config::AuthConfig;
use crate::domain::entity::User;
use crate::domain::value_object::{UserId, user_name::UserName, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload. `iat` and `exp` are integer epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn subject(&self) -> AuthResult<UserId> {
        self.user_id.parse().map_err(|_| AuthError::Unauthorized)
    }

    /// Role claim; anything unrecognized is the lowest privilege.
    pub fn role(&self) -> UserRole {
        self.role
            .as_deref()
            .map(UserRole::from_code_or_lowest)
            .unwrap_or(UserRole::Banned)
    }
}

/// Freshly minted access + refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access lifetime in seconds
    pub expires_in: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn from_secret(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an injectable clock instead
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            access: KeyPair::from_secret(&config.access_secret, config.access_ttl),
            refresh: KeyPair::from_secret(&config.refresh_secret, config.refresh_ttl),
            validation,
        }
    }

    /// Access and refresh token for `user`, from its stored role.
    pub fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access(&user.id, &user.username, user.role)?,
            refresh_token: self.issue_refresh(&user.id)?,
            expires_in: self.access.ttl.as_secs() as i64,
        })
    }

    pub fn issue_access(&self, user_id: &UserId, username: &UserName, role: UserRole) -> AuthResult<String> {
        self.issue_access_at(user_id, username, role, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        user_id: &UserId,
        username: &UserName,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            username: Some(username.as_str().to_string()),
            role: Some(role.code().to_string()),
            kind: TokenKind::Access,
            iat: now.timestamp(),
            exp: expiry(now, self.access.ttl),
        };
        sign(&claims, &self.access.encoding)
    }

    pub fn issue_refresh(&self, user_id: &UserId) -> AuthResult<String> {
        self.issue_refresh_at(user_id, Utc::now())
    }

    pub fn issue_refresh_at(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            username: None,
            role: None,
            kind: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: expiry(now, self.refresh.ttl),
        };
        sign(&claims, &self.refresh.encoding)
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify_access_at(token, Utc::now())
    }

    pub fn verify_access_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        self.verify(token, TokenKind::Access, &self.access.decoding, now)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify_refresh_at(token, Utc::now())
    }

    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        self.verify(token, TokenKind::Refresh, &self.refresh.decoding, now)
    }

    /// Every failure is the same `Unauthorized`; the reason is only logged.
    fn verify(
        &self,
        token: &str,
        expected: TokenKind,
        key: &DecodingKey,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenClaims> {
        let claims = decode::<TokenClaims>(token, key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, kind = ?expected, "Token rejected");
                AuthError::Unauthorized
            })?
            .claims;

        if claims.kind != expected {
            tracing::debug!(kind = ?claims.kind, expected = ?expected, "Token kind mismatch");
            return Err(AuthError::Unauthorized);
        }
        if claims.exp <= now.timestamp() {
            tracing::debug!(exp = claims.exp, "Token expired");
            return Err(AuthError::Unauthorized);
        }

        Ok(claims)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> i64 {
    now.timestamp().saturating_add(ttl.as_secs() as i64)
}

fn sign(claims: &TokenClaims, key: &EncodingKey) -> AuthResult<String> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AuthError::Internal(format!("Token signing failed: {e}")))
}
