//! In-memory backend for tests
//!
//! Behaves like a real backend, unique constraints included, and can be
//! switched "unreachable" to exercise the router's fallback.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::entity::{AdminActivityLog, ProfilePatch, User};
use crate::domain::repository::{
    AuditLogRepository, BackendHealth, UserListFilter, UserPage, UserRepository,
};
use crate::domain::value_object::{UserId, email::Email, user_name::UserName, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

pub struct MemoryBackend {
    name: &'static str,
    users: Mutex<HashMap<UserId, User>>,
    logs: Mutex<Vec<AdminActivityLog>>,
    available: AtomicBool,
    pings: AtomicU32,
    ping_delay_ms: AtomicU64,
}

impl MemoryBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            users: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            pings: AtomicU32::new(0),
            ping_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every ping hang this long before answering.
    pub fn set_ping_delay(&self, delay: Duration) {
        self.ping_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check(&self) -> AuthResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::BackendUnavailable)
        }
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> AuthResult<Option<User>> {
        self.check()?;
        Ok(self.users.lock().unwrap().values().find(|u| pred(u)).cloned())
    }

    fn modify(&self, user_id: &UserId, f: impl FnOnce(&mut User)) -> AuthResult<Option<User>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(user_id).map(|user| {
            f(user);
            user.clone()
        }))
    }
}

impl UserRepository for MemoryBackend {
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::DuplicateIdentity { field: "email" });
        }
        if users
            .values()
            .any(|u| u.username.canonical() == user.username.canonical())
        {
            return Err(AuthError::DuplicateIdentity { field: "username" });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.find(|u| &u.email == email)
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        self.find(|u| &u.id == user_id)
    }

    async fn find_by_username(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        let canonical = user_name.canonical();
        self.find(|u| u.username.canonical() == canonical)
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        self.modify(user_id, |u| u.record_login(at))?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        self.modify(user_id, |u| u.apply(patch, at))
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole, at: DateTime<Utc>) -> AuthResult<bool> {
        let updated = self.modify(user_id, |u| {
            u.role = role;
            u.updated_at = at;
        })?;
        Ok(updated.is_some())
    }

    async fn set_active(&self, user_id: &UserId, is_active: bool, at: DateTime<Utc>) -> AuthResult<bool> {
        let updated = self.modify(user_id, |u| {
            u.is_active = is_active;
            u.updated_at = at;
        })?;
        Ok(updated.is_some())
    }

    async fn list_users(&self, filter: &UserListFilter) -> AuthResult<UserPage> {
        self.check()?;
        let users = self.users.lock().unwrap();
        let mut matching: Vec<&User> = users.values().filter(|u| filter_matches(filter, u)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(UserPage {
            total_count: matching.len() as u64,
            users: matching
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.limit as usize)
                .cloned()
                .collect(),
        })
    }
}

fn filter_matches(filter: &UserListFilter, user: &User) -> bool {
    if filter.role.is_some_and(|role| role != user.role) {
        return false;
    }
    if filter.is_active.is_some_and(|active| active != user.is_active) {
        return false;
    }
    let Some(search) = &filter.search else {
        return true;
    };
    let needle = search.to_lowercase();
    [
        Some(user.username.as_str()),
        Some(user.email.as_str()),
        user.display_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

impl AuditLogRepository for MemoryBackend {
    async fn append(&self, entry: &AdminActivityLog) -> AuthResult<()> {
        self.check()?;
        self.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>> {
        self.check()?;
        let logs = self.logs.lock().unwrap();
        Ok(logs.iter().rev().take(limit as usize).cloned().collect())
    }
}

impl BackendHealth for MemoryBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn ping(&self) -> AuthResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let delay = self.ping_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check()
    }
}
