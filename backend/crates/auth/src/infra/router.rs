//! Storage router
//!
//! Sends each repository call to the primary backend when it answers a
//! health check, otherwise to the secondary. Selection is made per call;
//! nothing about a previous outcome is remembered.

use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::retry::Backoff;

use crate::domain::entity::{AdminActivityLog, ProfilePatch, User};
use crate::domain::repository::{
    AuditLogRepository, BackendHealth, UserListFilter, UserPage, UserRepository,
};
use crate::domain::value_object::{UserId, email::Email, user_name::UserName, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Liveness of one backend as reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStatus {
    pub name: &'static str,
    pub connected: bool,
}

impl BackendStatus {
    pub fn label(&self) -> &'static str {
        if self.connected { "connected" } else { "disconnected" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStatus {
    pub primary: BackendStatus,
    pub secondary: BackendStatus,
}

enum Selected<'a, P, S> {
    Primary(&'a P),
    Secondary(&'a S),
}

pub struct StorageRouter<P, S> {
    primary: P,
    secondary: S,
    health_retry: Backoff,
    health_timeout: Duration,
}

impl<P, S> StorageRouter<P, S>
where
    P: BackendHealth + Sync,
    S: BackendHealth + Sync,
{
    pub fn new(primary: P, secondary: S, health_retry: Backoff, health_timeout: Duration) -> Self {
        tracing::info!(
            primary = primary.name(),
            secondary = secondary.name(),
            max_attempts = health_retry.max_attempts,
            timeout_ms = health_timeout.as_millis() as u64,
            "Storage router configured"
        );
        Self {
            primary,
            secondary,
            health_retry,
            health_timeout,
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Pings the primary with bounded retry and exponential backoff.
    ///
    /// Each ping is cut off after `health_timeout`, so a hung primary costs
    /// at most `max_attempts` timeouts plus the backoff delays.
    pub async fn is_primary_healthy(&self) -> bool {
        let primary = &self.primary;
        let timeout = self.health_timeout;
        self.health_retry
            .retry(move || ping_within(primary, timeout))
            .await
            .is_ok()
    }

    /// Both backends, checked once each (the primary with retry).
    pub async fn status(&self) -> RouterStatus {
        let primary_ok = self.is_primary_healthy().await;
        let secondary_ok = ping_within(&self.secondary, self.health_timeout)
            .await
            .is_ok();
        RouterStatus {
            primary: BackendStatus {
                name: self.primary.name(),
                connected: primary_ok,
            },
            secondary: BackendStatus {
                name: self.secondary.name(),
                connected: secondary_ok,
            },
        }
    }

    async fn select(&self) -> Selected<'_, P, S> {
        if self.is_primary_healthy().await {
            Selected::Primary(&self.primary)
        } else {
            tracing::warn!(
                primary = self.primary.name(),
                secondary = self.secondary.name(),
                "Primary backend unreachable, using fallback"
            );
            Selected::Secondary(&self.secondary)
        }
    }
}

async fn ping_within<B: BackendHealth + Sync>(backend: &B, timeout: Duration) -> AuthResult<()> {
    match tokio::time::timeout(timeout, backend.ping()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(backend = backend.name(), "Health ping timed out");
            Err(AuthError::BackendUnavailable)
        }
    }
}

/// Runs the same call on whichever backend `select` picked.
macro_rules! routed {
    ($router:expr, |$backend:ident| $call:expr) => {
        match $router.select().await {
            Selected::Primary($backend) => $call.await,
            Selected::Secondary($backend) => $call.await,
        }
    };
}

impl<P, S> UserRepository for StorageRouter<P, S>
where
    P: UserRepository + BackendHealth + Sync,
    S: UserRepository + BackendHealth + Sync,
{
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        routed!(self, |backend| backend.insert_user(user))
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        routed!(self, |backend| backend.find_by_email(email))
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        routed!(self, |backend| backend.find_by_id(user_id))
    }

    async fn find_by_username(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        routed!(self, |backend| backend.find_by_username(user_name))
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        routed!(self, |backend| backend.record_login(user_id, at))
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        routed!(self, |backend| backend.update_profile(user_id, patch, at))
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole, at: DateTime<Utc>) -> AuthResult<bool> {
        routed!(self, |backend| backend.set_role(user_id, role, at))
    }

    async fn set_active(&self, user_id: &UserId, is_active: bool, at: DateTime<Utc>) -> AuthResult<bool> {
        routed!(self, |backend| backend.set_active(user_id, is_active, at))
    }

    async fn list_users(&self, filter: &UserListFilter) -> AuthResult<UserPage> {
        routed!(self, |backend| backend.list_users(filter))
    }
}

impl<P, S> AuditLogRepository for StorageRouter<P, S>
where
    P: AuditLogRepository + BackendHealth + Sync,
    S: AuditLogRepository + BackendHealth + Sync,
{
    async fn append(&self, entry: &AdminActivityLog) -> AuthResult<()> {
        routed!(self, |backend| backend.append(entry))
    }

    async fn recent(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>> {
        routed!(self, |backend| backend.recent(limit))
    }
}
