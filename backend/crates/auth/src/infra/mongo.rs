//! MongoDB backend (fallback)
//!
//! One document per user with preferences embedded, plus an append-only
//! activity log collection. Ids are stored as their string form in `_id`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, DateTime as BsonDateTime, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::entity::{AdminActivityLog, ProfilePatch, User, UserPreferences};
use crate::domain::repository::{
    AuditLogRepository, BackendHealth, UserListFilter, UserPage, UserRepository,
};
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const USERS: &str = "users";
const ACTIVITY_LOGS: &str = "admin_activity_logs";
const DUPLICATE_KEY: i32 = 11000;
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct MongoIdentityBackend {
    db: Database,
}

impl MongoIdentityBackend {
    /// Parses the URI and builds a client. No round trip happens here.
    pub async fn connect(uri: &str, db_name: &str) -> AuthResult<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("hub-api".to_string());
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(options)?;
        Ok(Self::new(client.database(db_name)))
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Unique indexes backing the duplicate-identity guarantee.
    pub async fn ensure_indexes(&self) -> AuthResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        let users = self.users();

        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username_canonical": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.activity_logs()
            .create_index(IndexModel::builder().keys(doc! { "created_at": -1 }).build())
            .await?;

        tracing::info!(database = %self.db.name(), "Document store indexes ensured");
        Ok(())
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS)
    }

    fn activity_logs(&self) -> Collection<ActivityLogDocument> {
        self.db.collection(ACTIVITY_LOGS)
    }

    async fn find_user(&self, filter: Document) -> AuthResult<Option<User>> {
        self.users()
            .find_one(filter)
            .await?
            .map(UserDocument::into_user)
            .transpose()
    }
}

fn to_bson_datetime(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: BsonDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

fn to_bson<T: Serialize>(value: &T) -> AuthResult<Bson> {
    bson::to_bson(value).map_err(|e| AuthError::Internal(format!("BSON encoding failed: {e}")))
}

/// `$and` of the supplied criteria; search is a case-insensitive literal
/// match on username, email or display name.
fn user_list_query(filter: &UserListFilter) -> Document {
    let mut query = Document::new();
    if let Some(role) = filter.role {
        query.insert("role", role.code());
    }
    if let Some(is_active) = filter.is_active {
        query.insert("is_active", is_active);
    }
    if let Some(search) = &filter.search {
        let pattern = escape_regex(search);
        query.insert(
            "$or",
            ["username", "email", "display_name"]
                .iter()
                .map(|field| {
                    let mut clause = Document::new();
                    clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
                    clause
                })
                .collect::<Vec<_>>(),
        );
    }
    query
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_insert_error(err: mongodb::error::Error) -> AuthError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY {
            let field = if write_error.message.contains("username") {
                "username"
            } else {
                "email"
            };
            return AuthError::DuplicateIdentity { field };
        }
    }
    AuthError::Document(err)
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for MongoIdentityBackend {
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        self.users()
            .insert_one(UserDocument::from_user(user))
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.find_user(doc! { "email": email.as_str() }).await
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        self.find_user(doc! { "_id": user_id.to_string() }).await
    }

    async fn find_by_username(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        self.find_user(doc! { "username_canonical": user_name.canonical() })
            .await
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let at = to_bson_datetime(at);
        self.users()
            .update_one(
                doc! { "_id": user_id.to_string() },
                doc! {
                    "$inc": { "login_count": 1_i64 },
                    "$set": { "last_login": at, "updated_at": at },
                },
            )
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let mut set = doc! { "updated_at": to_bson_datetime(at) };
        if let Some(display_name) = &patch.display_name {
            set.insert("display_name", display_name.as_str());
        }
        if let Some(bio) = &patch.bio {
            set.insert("bio", bio.as_str());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            set.insert("avatar_url", avatar_url.as_str());
        }
        if let Some(preferences) = &patch.preferences {
            set.insert("preferences", to_bson(preferences)?);
        }

        self.users()
            .find_one_and_update(doc! { "_id": user_id.to_string() }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .map(UserDocument::into_user)
            .transpose()
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole, at: DateTime<Utc>) -> AuthResult<bool> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id.to_string() },
                doc! { "$set": { "role": role.code(), "updated_at": to_bson_datetime(at) } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn set_active(&self, user_id: &UserId, is_active: bool, at: DateTime<Utc>) -> AuthResult<bool> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id.to_string() },
                doc! { "$set": { "is_active": is_active, "updated_at": to_bson_datetime(at) } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn list_users(&self, filter: &UserListFilter) -> AuthResult<UserPage> {
        let query = user_list_query(filter);
        let total_count = self.users().count_documents(query.clone()).await?;

        let mut cursor = self
            .users()
            .find(query)
            .sort(doc! { "created_at": -1, "_id": 1 })
            .skip(filter.offset())
            .limit(i64::from(filter.limit))
            .await?;

        let mut users = Vec::new();
        while cursor.advance().await? {
            users.push(cursor.deserialize_current()?.into_user()?);
        }
        Ok(UserPage { users, total_count })
    }
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for MongoIdentityBackend {
    async fn append(&self, entry: &AdminActivityLog) -> AuthResult<()> {
        self.activity_logs()
            .insert_one(ActivityLogDocument::from_entry(entry))
            .await?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>> {
        let mut cursor = self
            .activity_logs()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .limit(i64::from(limit))
            .await?;

        let mut entries = Vec::new();
        while cursor.advance().await? {
            entries.push(cursor.deserialize_current()?.into_entry()?);
        }
        Ok(entries)
    }
}

impl BackendHealth for MongoIdentityBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> AuthResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

// ============================================================================
// Document Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    username_canonical: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    role: String,
    steam_id: Option<String>,
    #[serde(default)]
    preferences: UserPreferences,
    is_active: bool,
    is_verified: bool,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
    last_login: Option<BsonDateTime>,
    #[serde(default)]
    login_count: i64,
}

impl UserDocument {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            username_canonical: user.username.canonical(),
            email: user.email.as_str().to_string(),
            password_hash: user.password_hash.as_phc_string().to_string(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            role: user.role.code().to_string(),
            steam_id: user.steam_id.clone(),
            preferences: user.preferences.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: to_bson_datetime(user.created_at),
            updated_at: to_bson_datetime(user.updated_at),
            last_login: user.last_login.map(to_bson_datetime),
            login_count: user.login_count,
        }
    }

    fn into_user(self) -> AuthResult<User> {
        let id = self
            .id
            .parse::<UserId>()
            .map_err(|e| AuthError::Internal(format!("Invalid user id in document store: {e}")))?;

        Ok(User {
            id,
            username: UserName::from_db(self.username),
            email: Email::from_db(self.email),
            password_hash: UserPassword::from_db(self.password_hash)?,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            bio: self.bio,
            role: UserRole::from_code_or_lowest(&self.role),
            steam_id: self.steam_id,
            preferences: self.preferences,
            is_active: self.is_active,
            is_verified: self.is_verified,
            created_at: from_bson_datetime(self.created_at),
            updated_at: from_bson_datetime(self.updated_at),
            last_login: self.last_login.map(from_bson_datetime),
            login_count: self.login_count,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivityLogDocument {
    #[serde(rename = "_id")]
    id: String,
    admin_user_id: String,
    admin_username: String,
    action: String,
    target_type: String,
    target_id: String,
    #[serde(default)]
    details: Map<String, Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: BsonDateTime,
}

impl ActivityLogDocument {
    fn from_entry(entry: &AdminActivityLog) -> Self {
        Self {
            id: entry.id.to_string(),
            admin_user_id: entry.admin_user_id.to_string(),
            admin_username: entry.admin_username.clone(),
            action: entry.action.clone(),
            target_type: entry.target_type.clone(),
            target_id: entry.target_id.clone(),
            details: entry.details.clone(),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            created_at: to_bson_datetime(entry.created_at),
        }
    }

    fn into_entry(self) -> AuthResult<AdminActivityLog> {
        let parse_err = |e| AuthError::Internal(format!("Invalid id in activity log: {e}"));
        Ok(AdminActivityLog {
            id: self.id.parse().map_err(parse_err)?,
            admin_user_id: self.admin_user_id.parse().map_err(parse_err)?,
            admin_username: self.admin_username,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: from_bson_datetime(self.created_at),
        })
    }
}
