//! Admin Use Case
//!
//! Account moderation. Every mutating action leaves an audit entry; a
//! failure to write that entry is logged but does not undo the action.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::domain::entity::{AdminActivityLog, AdminActor, User};
use crate::domain::repository::{AuditLogRepository, UserListFilter, UserPage, UserRepository};
use crate::domain::value_object::{UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

pub const ACTIVITY_LOG_DEFAULT_LIMIT: u32 = 100;
pub const ACTIVITY_LOG_MAX_LIMIT: u32 = 500;
pub const USER_LIST_DEFAULT_LIMIT: u32 = 20;
pub const USER_LIST_MAX_LIMIT: u32 = 100;

const TARGET_USER: &str = "user";

pub struct AdminUseCase<R>
where
    R: UserRepository + AuditLogRepository,
{
    repo: Arc<R>,
}

impl<R> AdminUseCase<R>
where
    R: UserRepository + AuditLogRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn get_user(&self, user_id: &UserId) -> AuthResult<User> {
        self.repo.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Filtered, paginated listing, newest accounts first.
    ///
    /// A blank search is ignored.
    pub async fn list_users(&self, mut filter: UserListFilter) -> AuthResult<UserPage> {
        if filter.page < 1 {
            return Err(AuthError::validation("page", "Must be at least 1"));
        }
        if !(1..=USER_LIST_MAX_LIMIT).contains(&filter.limit) {
            return Err(AuthError::validation(
                "limit",
                format!("Must be between 1 and {USER_LIST_MAX_LIMIT}"),
            ));
        }
        filter.search = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        self.repo.list_users(&filter).await
    }

    pub async fn change_role(
        &self,
        actor: &AdminActor,
        user_id: &UserId,
        role: UserRole,
    ) -> AuthResult<()> {
        let target = self.get_user(user_id).await?;

        if !self.repo.set_role(user_id, role, Utc::now()).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(
            admin_id = %actor.user_id,
            user_id = %user_id,
            old_role = %target.role,
            new_role = %role,
            "User role changed"
        );
        self.audit(
            actor,
            "update_role",
            user_id,
            details(json!({ "old_role": target.role.code(), "new_role": role.code() })),
        )
        .await;
        Ok(())
    }

    pub async fn change_status(
        &self,
        actor: &AdminActor,
        user_id: &UserId,
        is_active: bool,
        reason: Option<String>,
    ) -> AuthResult<()> {
        let target = self.get_user(user_id).await?;

        if !self.repo.set_active(user_id, is_active, Utc::now()).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(admin_id = %actor.user_id, user_id = %user_id, is_active, "User status changed");
        self.audit(
            actor,
            "update_status",
            user_id,
            details(json!({
                "old_status": target.is_active,
                "new_status": is_active,
                "reason": reason,
            })),
        )
        .await;
        Ok(())
    }

    /// Soft delete: the account is disabled, never removed.
    pub async fn delete_user(&self, actor: &AdminActor, user_id: &UserId) -> AuthResult<()> {
        let target = self.get_user(user_id).await?;
        if target.id == actor.user_id {
            return Err(AuthError::SelfTarget);
        }

        if !self.repo.set_active(user_id, false, Utc::now()).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(admin_id = %actor.user_id, user_id = %user_id, "User account deleted");
        self.audit(
            actor,
            "delete_user",
            user_id,
            details(json!({ "action": "account_deletion" })),
        )
        .await;
        Ok(())
    }

    /// Newest first. `limit` must already be within range.
    pub async fn activity_logs(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>> {
        if !(1..=ACTIVITY_LOG_MAX_LIMIT).contains(&limit) {
            return Err(AuthError::validation(
                "limit",
                format!("Must be between 1 and {ACTIVITY_LOG_MAX_LIMIT}"),
            ));
        }
        self.repo.recent(limit).await
    }

    async fn audit(&self, actor: &AdminActor, action: &str, target: &UserId, details: Map<String, Value>) {
        let entry = AdminActivityLog::record(actor, action, TARGET_USER, target.to_string(), details);
        if let Err(e) = self.repo.append(&entry).await {
            tracing::error!(action, target_id = %target, error = %e, "Failed to write admin activity log");
        }
    }
}

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
