use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::error::AppResult;
use crate::session::ROLE_ADMIN;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_active, created_at, updated_at";

pub async fn create_user<'e, E>(
    executor: E,
    username: &str,
    email: &str,
    password_hash: &str,
    role: &str,
) -> AppResult<i64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("INSERT INTO users (username, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)")
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .execute(executor)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Looks a user up by username, then by email.
pub async fn find_by_login(pool: &SqlitePool, login: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1 ORDER BY username = ?1 DESC LIMIT 1");
    Ok(sqlx::query_as::<_, User>(&sql).bind(login).fetch_optional(pool).await?)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(pool).await?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(pool).await?)
}

pub async fn list_users(pool: &SqlitePool) -> AppResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
    Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
}

pub async fn count_users(pool: &SqlitePool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?)
}

pub async fn has_admin(pool: &SqlitePool) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?1")
        .bind(ROLE_ADMIN)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Returns `false` when no user has that id.
pub async fn set_active<'e, E>(executor: E, user_id: i64, active: bool) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(active)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_password(pool: &SqlitePool, user_id: i64, password_hash: &str) -> AppResult<()> {
    sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(password_hash)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_reset_token(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("INSERT INTO password_reset_tokens (user_id, token, expires_at) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(token)
        .bind(format_timestamp(expires_at))
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks an unused, unexpired token as used and returns its user. A single statement,
/// so two concurrent resets cannot both consume the same token.
pub async fn consume_reset_token(pool: &SqlitePool, token: &str) -> AppResult<Option<i64>> {
    let user_id: Option<i64> = sqlx::query_scalar(
        "UPDATE password_reset_tokens SET used = 1 \
         WHERE token = ?1 AND used = 0 AND expires_at > ?2 RETURNING user_id",
    )
    .bind(token)
    .bind(format_timestamp(Utc::now()))
    .fetch_optional(pool)
    .await?;
    Ok(user_id)
}
