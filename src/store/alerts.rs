use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    ApogeeReached,
    ApogeeEnded,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::LowStock => "low_stock",
            AlertType::ApogeeReached => "apogee_reached",
            AlertType::ApogeeEnded => "apogee_ended",
        }
    }
}

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DISMISSED: &str = "dismissed";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub wine_id: i64,
    pub alert_type: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub dismissed_at: Option<String>,
}

const ALERT_COLUMNS: &str = "id, wine_id, alert_type, message, status, created_at, dismissed_at";

pub async fn list_active(pool: &SqlitePool) -> AppResult<Vec<Alert>> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE status = ?1 ORDER BY created_at DESC, id DESC");
    Ok(sqlx::query_as::<_, Alert>(&sql).bind(STATUS_ACTIVE).fetch_all(pool).await?)
}

pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Alert>> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id");
    Ok(sqlx::query_as::<_, Alert>(&sql).fetch_all(pool).await?)
}

pub async fn has_active(pool: &SqlitePool, wine_id: i64, alert_type: AlertType) -> AppResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE wine_id = ?1 AND alert_type = ?2 AND status = ?3")
            .bind(wine_id)
            .bind(alert_type.as_str())
            .bind(STATUS_ACTIVE)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn create_alert(pool: &SqlitePool, wine_id: i64, alert_type: AlertType, message: &str) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO alerts (wine_id, alert_type, message, status) VALUES (?1, ?2, ?3, ?4)")
        .bind(wine_id)
        .bind(alert_type.as_str())
        .bind(message)
        .bind(STATUS_ACTIVE)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Returns `false` when there is no active alert with that id.
pub async fn dismiss(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("UPDATE alerts SET status = ?1, dismissed_at = ?2 WHERE id = ?3 AND status = ?4")
        .bind(STATUS_DISMISSED)
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .bind(STATUS_ACTIVE)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_active(pool: &SqlitePool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE status = ?1")
        .bind(STATUS_ACTIVE)
        .fetch_one(pool)
        .await?)
}
