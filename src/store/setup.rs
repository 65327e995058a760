use chrono::Utc;
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::error::AppResult;

/// Setup counts as complete when the most recent wizard row says so.
pub async fn is_setup_complete(pool: &SqlitePool) -> AppResult<bool> {
    let completed: Option<bool> =
        sqlx::query_scalar("SELECT completed FROM setup_wizard ORDER BY created_at DESC, id DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(completed.unwrap_or(false))
}

/// Claims setup completion. Returns `false` when a completed row already exists, in
/// which case nothing is written.
pub async fn mark_setup_complete<'e, E>(executor: E) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = format_timestamp(Utc::now());
    let result = sqlx::query(
        "INSERT INTO setup_wizard (completed, completed_at, created_at) SELECT 1, ?1, ?1 \
         WHERE NOT EXISTS (SELECT 1 FROM setup_wizard WHERE completed = 1)",
    )
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
