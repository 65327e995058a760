use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

pub const WINE_TYPES: &[&str] = &["Red", "White", "Rosé", "Sparkling", "Beer", "Spirit"];
const MAX_TEXT_LEN: usize = 255;
const MIN_VINTAGE: i64 = 1900;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wine {
    pub id: i64,
    pub name: String,
    pub producer: Option<String>,
    pub region: String,
    pub vintage: Option<i64>,
    pub wine_type: String,
    pub quantity: i64,
    pub min_apogee_date: Option<String>,
    pub max_apogee_date: Option<String>,
    pub comments: Option<String>,
    pub cell_id: Option<i64>,
    pub created_at: String,
}

/// Body of create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WineInput {
    pub name: String,
    #[serde(default)]
    pub producer: Option<String>,
    pub region: String,
    #[serde(default)]
    pub vintage: Option<i64>,
    pub wine_type: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_apogee_date: Option<String>,
    #[serde(default)]
    pub max_apogee_date: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    /// Storage cell; `None` leaves the wine unplaced.
    #[serde(default)]
    pub cell_id: Option<i64>,
}

pub fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::validation(field, "Must be a date in YYYY-MM-DD format"))
}

pub(crate) fn check_text(field: &str, value: &str, required: bool) -> AppResult<()> {
    if required && value.trim().is_empty() {
        return Err(AppError::validation(field, "Must not be empty"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::validation(field, "Must be at most 255 characters"));
    }
    Ok(())
}

impl WineInput {
    pub fn validate(&self) -> AppResult<()> {
        check_text("name", &self.name, true)?;
        check_text("region", &self.region, true)?;
        if let Some(producer) = &self.producer {
            check_text("producer", producer, false)?;
        }
        if let Some(vintage) = self.vintage {
            let current_year = i64::from(Utc::now().year());
            if !(MIN_VINTAGE..=current_year).contains(&vintage) {
                return Err(AppError::validation(
                    "vintage",
                    format!("Must be between {} and {}", MIN_VINTAGE, current_year),
                ));
            }
        }
        if !WINE_TYPES.contains(&self.wine_type.as_str()) {
            return Err(AppError::validation("wine_type", format!("Must be one of {}", WINE_TYPES.join(", "))));
        }
        if self.quantity < 0 {
            return Err(AppError::validation("quantity", "Must not be negative"));
        }

        let min = self.min_apogee_date.as_deref().map(|d| parse_date("min_apogee_date", d)).transpose()?;
        let max = self.max_apogee_date.as_deref().map(|d| parse_date("max_apogee_date", d)).transpose()?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(AppError::validation("max_apogee_date", "Must not be before min_apogee_date"));
            }
        }
        Ok(())
    }
}

const WINE_COLUMNS: &str = "id, name, producer, region, vintage, wine_type, quantity, \
min_apogee_date, max_apogee_date, comments, cell_id, created_at";

/// Query-string filters of `GET /wines/search`. Text filters match substrings.
#[derive(Debug, Default, Deserialize)]
pub struct WineFilter {
    pub name: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub wine_type: Option<String>,
    pub vintage: Option<i64>,
}

pub async fn list_wines(pool: &SqlitePool) -> AppResult<Vec<Wine>> {
    let sql = format!("SELECT {WINE_COLUMNS} FROM wines ORDER BY name COLLATE NOCASE, id");
    Ok(sqlx::query_as::<_, Wine>(&sql).fetch_all(pool).await?)
}

pub async fn get_wine(pool: &SqlitePool, id: i64) -> AppResult<Option<Wine>> {
    let sql = format!("SELECT {WINE_COLUMNS} FROM wines WHERE id = ?1");
    Ok(sqlx::query_as::<_, Wine>(&sql).bind(id).fetch_optional(pool).await?)
}

/// Unset and empty filters match everything.
pub async fn search_wines(pool: &SqlitePool, filter: &WineFilter) -> AppResult<Vec<Wine>> {
    fn text(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
    let sql = format!(
        "SELECT {WINE_COLUMNS} FROM wines WHERE (?1 IS NULL OR name LIKE ?1) AND (?2 IS NULL OR region LIKE ?2) \
         AND (?3 IS NULL OR wine_type = ?3) AND (?4 IS NULL OR vintage = ?4) ORDER BY created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Wine>(&sql)
        .bind(text(&filter.name).map(|v| format!("%{}%", v)))
        .bind(text(&filter.region).map(|v| format!("%{}%", v)))
        .bind(text(&filter.wine_type))
        .bind(filter.vintage.filter(|v| *v > 0))
        .fetch_all(pool)
        .await?)
}

/// Wines in stock whose drinking window contains `today`. A window without an end
/// stays open.
pub async fn drinkable_wines(pool: &SqlitePool, today: NaiveDate) -> AppResult<Vec<Wine>> {
    let sql = format!(
        "SELECT {WINE_COLUMNS} FROM wines WHERE quantity > 0 AND min_apogee_date IS NOT NULL \
         AND min_apogee_date <= ?1 AND (max_apogee_date IS NULL OR max_apogee_date >= ?1) \
         ORDER BY max_apogee_date IS NULL, max_apogee_date, id"
    );
    let today = today.format("%Y-%m-%d").to_string();
    Ok(sqlx::query_as::<_, Wine>(&sql).bind(today).fetch_all(pool).await?)
}

pub async fn list_wines_in_cave(pool: &SqlitePool, cave_id: i64) -> AppResult<Vec<Wine>> {
    let sql = format!(
        "SELECT {WINE_COLUMNS} FROM wines WHERE cell_id IN (SELECT id FROM cells WHERE cave_id = ?1) \
         ORDER BY name COLLATE NOCASE, id"
    );
    Ok(sqlx::query_as::<_, Wine>(&sql).bind(cave_id).fetch_all(pool).await?)
}

/// Inserts without validating; callers validate first.
pub async fn create_wine<'e, E>(executor: E, input: &WineInput) -> AppResult<i64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO wines (name, producer, region, vintage, wine_type, quantity, min_apogee_date, max_apogee_date, comments, cell_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&input.name)
    .bind(&input.producer)
    .bind(&input.region)
    .bind(input.vintage)
    .bind(&input.wine_type)
    .bind(input.quantity)
    .bind(&input.min_apogee_date)
    .bind(&input.max_apogee_date)
    .bind(&input.comments)
    .bind(input.cell_id)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Returns `false` when no wine has that id.
pub async fn update_wine(pool: &SqlitePool, id: i64, input: &WineInput) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE wines SET name = ?1, producer = ?2, region = ?3, vintage = ?4, wine_type = ?5, quantity = ?6, \
         min_apogee_date = ?7, max_apogee_date = ?8, comments = ?9, cell_id = ?10 WHERE id = ?11",
    )
    .bind(&input.name)
    .bind(&input.producer)
    .bind(&input.region)
    .bind(input.vintage)
    .bind(&input.wine_type)
    .bind(input.quantity)
    .bind(&input.min_apogee_date)
    .bind(&input.max_apogee_date)
    .bind(&input.comments)
    .bind(input.cell_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_wine(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM wines WHERE id = ?1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_wines(pool: &SqlitePool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM wines").fetch_one(pool).await?)
}

pub async fn total_bottles(pool: &SqlitePool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM wines").fetch_one(pool).await?)
}
