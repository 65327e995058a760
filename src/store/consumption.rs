use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::wines::{check_text, parse_date};
use crate::error::{AppError, AppResult};

const MAX_COMMENT_LEN: usize = 2000;

/// One tasting: bottles taken out of stock, with optional notes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Consumption {
    pub id: i64,
    pub wine_id: i64,
    pub quantity: i64,
    pub rating: Option<f64>,
    pub comment: Option<String>,
    pub reason: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    pub created_at: String,
}

/// A history row joined with the name of its wine, for the tasting CSV.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TastingRecord {
    pub id: i64,
    pub wine_id: i64,
    pub wine_name: String,
    pub quantity: i64,
    pub rating: Option<f64>,
    pub comment: Option<String>,
    pub date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionInput {
    pub wine_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

impl ConsumptionInput {
    pub fn validate(&self) -> AppResult<()> {
        if self.quantity < 1 {
            return Err(AppError::validation("quantity", "Must be at least 1"));
        }
        if let Some(rating) = self.rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(AppError::validation("rating", "Must be between 0 and 5"));
            }
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_LEN {
                return Err(AppError::validation("comment", "Must be at most 2000 characters"));
            }
        }
        if let Some(reason) = &self.reason {
            check_text("reason", reason, false)?;
        }
        if let Some(date) = &self.date {
            parse_date("date", date)?;
        }
        Ok(())
    }
}

const CONSUMPTION_COLUMNS: &str = "id, wine_id, quantity, rating, comment, reason, date, created_at";

/// Takes the bottles out of stock and records the tasting in one transaction.
///
/// Unknown wines are `NotFound`; asking for more bottles than the wine has is a
/// validation error on `quantity` and changes nothing.
pub async fn record_consumption(pool: &SqlitePool, input: &ConsumptionInput) -> AppResult<Consumption> {
    let date = input.date.clone().unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    let mut tx = pool.begin().await?;
    let updated = sqlx::query("UPDATE wines SET quantity = quantity - ?1 WHERE id = ?2 AND quantity >= ?1")
        .bind(input.quantity)
        .bind(input.wine_id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        let stock: Option<i64> = sqlx::query_scalar("SELECT quantity FROM wines WHERE id = ?1")
            .bind(input.wine_id)
            .fetch_optional(&mut *tx)
            .await?;
        return Err(match stock {
            None => AppError::NotFound("Wine not found".to_string()),
            Some(stock) => AppError::validation("quantity", format!("Only {} bottle(s) left in stock", stock)),
        });
    }

    let sql = format!(
        "INSERT INTO consumption_history (wine_id, quantity, rating, comment, reason, date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {CONSUMPTION_COLUMNS}"
    );
    let record = sqlx::query_as::<_, Consumption>(&sql)
        .bind(input.wine_id)
        .bind(input.quantity)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(&input.reason)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(record)
}

/// Most recent tasting first.
pub async fn history_for_wine(pool: &SqlitePool, wine_id: i64) -> AppResult<Vec<Consumption>> {
    let sql = format!(
        "SELECT {CONSUMPTION_COLUMNS} FROM consumption_history WHERE wine_id = ?1 ORDER BY date DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Consumption>(&sql).bind(wine_id).fetch_all(pool).await?)
}

pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Consumption>> {
    let sql = format!("SELECT {CONSUMPTION_COLUMNS} FROM consumption_history ORDER BY id");
    Ok(sqlx::query_as::<_, Consumption>(&sql).fetch_all(pool).await?)
}

pub async fn tasting_records(pool: &SqlitePool) -> AppResult<Vec<TastingRecord>> {
    Ok(sqlx::query_as::<_, TastingRecord>(
        "SELECT h.id, h.wine_id, w.name AS wine_name, h.quantity, h.rating, h.comment, h.date, h.created_at \
         FROM consumption_history h JOIN wines w ON w.id = h.wine_id ORDER BY h.date DESC, h.id DESC",
    )
    .fetch_all(pool)
    .await?)
}
