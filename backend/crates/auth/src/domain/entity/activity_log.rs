//! Admin activity log entry

use chrono::{DateTime, Utc};
use kernel::id::{AuditEntryId, UserId};
use serde_json::{Map, Value};

/// What an admin did to which target. Append-only.
#[derive(Debug, Clone)]
pub struct AdminActivityLog {
    pub id: AuditEntryId,
    pub admin_user_id: UserId,
    pub admin_username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub details: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who performed an admin action and from where.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub user_id: UserId,
    pub username: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AdminActivityLog {
    pub fn record(
        actor: &AdminActor,
        action: &str,
        target_type: &str,
        target_id: impl Into<String>,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            admin_user_id: actor.user_id,
            admin_username: actor.username.clone(),
            action: action.to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.into(),
            details,
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}
