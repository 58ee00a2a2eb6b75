//! PostgreSQL backend (primary)

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::entity::{AdminActivityLog, ProfilePatch, User, UserPreferences};
use crate::domain::repository::{
    AuditLogRepository, BackendHealth, UserListFilter, UserPage, UserRepository,
};
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const SELECT_USER: &str = r#"
    SELECT
        u.id,
        u.username,
        u.email,
        u.password_hash,
        u.display_name,
        u.avatar_url,
        u.bio,
        u.role,
        u.steam_id,
        u.is_active,
        u.is_verified,
        u.created_at,
        u.updated_at,
        u.last_login,
        u.login_count,
        p.language,
        p.theme,
        p.custom_theme,
        p.notifications,
        p.steam_profile_public
    FROM users u
    LEFT JOIN user_preferences p ON p.user_id = u.id
"#;

/// `$1` role, `$2` active flag, `$3` search text; NULL disables a criterion
const USER_LIST_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR u.role = $1)
      AND ($2::boolean IS NULL OR u.is_active = $2)
      AND (
        $3::text IS NULL
        OR strpos(lower(u.username), lower($3)) > 0
        OR strpos(lower(u.email), lower($3)) > 0
        OR strpos(lower(u.display_name), lower($3)) > 0
      )
"#;

/// PostgreSQL-backed identity store
#[derive(Clone)]
pub struct PgIdentityBackend {
    pool: PgPool,
}

impl PgIdentityBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, predicate: &str, bind: String) -> AuthResult<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE {predicate}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }
}

/// Unique violations become `DuplicateIdentity`, naming the column.
fn map_insert_error(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("username") => "username",
                _ => "email",
            };
            return AuthError::DuplicateIdentity { field };
        }
    }
    AuthError::Database(err)
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgIdentityBackend {
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                username,
                username_canonical,
                email,
                password_hash,
                display_name,
                avatar_url,
                bio,
                role,
                steam_id,
                is_active,
                is_verified,
                created_at,
                updated_at,
                last_login,
                login_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.username.as_str())
        .bind(user.username.canonical())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.bio)
        .bind(user.role.code())
        .bind(&user.steam_id)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login)
        .bind(user.login_count)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        upsert_preferences(&mut tx, user.id.as_uuid(), &user.preferences).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.fetch_user("u.email = $1", email.as_str().to_string()).await
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_username(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        self.fetch_user("u.username_canonical = $1", user_name.canonical())
            .await
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                login_count = login_count + 1,
                last_login = $2,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
        at: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&patch.display_name)
        .bind(&patch.bio)
        .bind(&patch.avatar_url)
        .bind(at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(preferences) = &patch.preferences {
            upsert_preferences(&mut tx, user_id.as_uuid(), preferences).await?;
        }

        tx.commit().await?;
        self.find_by_id(user_id).await
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole, at: DateTime<Utc>) -> AuthResult<bool> {
        let updated = sqlx::query("UPDATE users SET role = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(role.code())
            .bind(at)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated > 0)
    }

    async fn set_active(&self, user_id: &UserId, is_active: bool, at: DateTime<Utc>) -> AuthResult<bool> {
        let updated = sqlx::query("UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(is_active)
            .bind(at)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated > 0)
    }

    async fn list_users(&self, filter: &UserListFilter) -> AuthResult<UserPage> {
        let role = filter.role.map(|role| role.code());
        let search = filter.search.as_deref();

        let count_sql = format!("SELECT COUNT(*) FROM users u {USER_LIST_FILTER}");
        let total_count = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(role)
            .bind(filter.is_active)
            .bind(search)
            .fetch_one(&self.pool)
            .await?;

        let page_sql = format!(
            "{SELECT_USER} {USER_LIST_FILTER} ORDER BY u.created_at DESC, u.id LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, UserRow>(&page_sql)
            .bind(role)
            .bind(filter.is_active)
            .bind(search)
            .bind(i64::from(filter.limit))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(UserPage {
            users: rows
                .into_iter()
                .map(UserRow::into_user)
                .collect::<AuthResult<_>>()?,
            total_count: u64::try_from(total_count).unwrap_or_default(),
        })
    }
}

async fn upsert_preferences(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &Uuid,
    preferences: &UserPreferences,
) -> AuthResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_preferences (
            user_id,
            language,
            theme,
            custom_theme,
            notifications,
            steam_profile_public
        ) VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            language = EXCLUDED.language,
            theme = EXCLUDED.theme,
            custom_theme = EXCLUDED.custom_theme,
            notifications = EXCLUDED.notifications,
            steam_profile_public = EXCLUDED.steam_profile_public
        "#,
    )
    .bind(user_id)
    .bind(&preferences.language)
    .bind(&preferences.theme)
    .bind(preferences.custom_theme.clone().map(Json))
    .bind(preferences.notifications)
    .bind(preferences.steam_profile_public)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for PgIdentityBackend {
    async fn append(&self, entry: &AdminActivityLog) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_activity_logs (
                id,
                admin_user_id,
                admin_username,
                action,
                target_type,
                target_id,
                details,
                ip_address,
                user_agent,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.admin_user_id.as_uuid())
        .bind(&entry.admin_username)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(Json(&entry.details))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> AuthResult<Vec<AdminActivityLog>> {
        let rows = sqlx::query_as::<_, ActivityLogRow>(
            r#"
            SELECT
                id,
                admin_user_id,
                admin_username,
                action,
                target_type,
                target_id,
                details,
                ip_address,
                user_agent,
                created_at
            FROM admin_activity_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityLogRow::into_entry).collect())
    }
}

impl BackendHealth for PgIdentityBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AuthResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    role: String,
    steam_id: Option<String>,
    is_active: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    login_count: i64,
    // Nullable: LEFT JOIN
    language: Option<String>,
    theme: Option<String>,
    custom_theme: Option<Json<Map<String, Value>>>,
    notifications: Option<bool>,
    steam_profile_public: Option<bool>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let defaults = UserPreferences::default();
        let preferences = UserPreferences {
            language: self.language.unwrap_or(defaults.language),
            theme: self.theme.unwrap_or(defaults.theme),
            custom_theme: self.custom_theme.map(|Json(theme)| theme),
            notifications: self.notifications.unwrap_or(defaults.notifications),
            steam_profile_public: self
                .steam_profile_public
                .unwrap_or(defaults.steam_profile_public),
        };

        Ok(User {
            id: UserId::from_uuid(self.id),
            username: UserName::from_db(self.username),
            email: Email::from_db(self.email),
            password_hash: UserPassword::from_db(self.password_hash)?,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            bio: self.bio,
            role: UserRole::from_code_or_lowest(&self.role),
            steam_id: self.steam_id,
            preferences,
            is_active: self.is_active,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login: self.last_login,
            login_count: self.login_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActivityLogRow {
    id: Uuid,
    admin_user_id: Uuid,
    admin_username: String,
    action: String,
    target_type: String,
    target_id: String,
    details: Json<Map<String, Value>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl ActivityLogRow {
    fn into_entry(self) -> AdminActivityLog {
        AdminActivityLog {
            id: self.id.into(),
            admin_user_id: self.admin_user_id.into(),
            admin_username: self.admin_username,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            details: self.details.0,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        }
    }
}
