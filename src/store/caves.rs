use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::wines::check_text;
use crate::error::{AppError, AppResult};

/// A cellar. `current` counts the bottles of every wine placed in one of its cells.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cave {
    pub id: i64,
    pub name: String,
    pub model: Option<String>,
    pub location: String,
    pub capacity: i64,
    pub current: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaveInput {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub capacity: i64,
}

impl CaveInput {
    pub fn validate(&self) -> AppResult<()> {
        check_text("name", &self.name, true)?;
        check_text("location", &self.location, false)?;
        if let Some(model) = &self.model {
            check_text("model", model, false)?;
        }
        if self.capacity < 0 {
            return Err(AppError::validation("capacity", "Must not be negative"));
        }
        Ok(())
    }
}

/// A compartment of a cave that wines can be placed in.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cell {
    pub id: i64,
    pub cave_id: i64,
    pub location: String,
    pub capacity: i64,
    pub current: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellInput {
    pub cave_id: i64,
    pub location: String,
    #[serde(default = "default_cell_capacity")]
    pub capacity: i64,
}

fn default_cell_capacity() -> i64 {
    1
}

impl CellInput {
    pub fn validate(&self) -> AppResult<()> {
        check_text("location", &self.location, true)?;
        if self.capacity < 1 {
            return Err(AppError::validation("capacity", "Must be at least 1"));
        }
        Ok(())
    }
}

const CAVE_SELECT: &str = "SELECT id, name, model, location, capacity, \
(SELECT COALESCE(SUM(w.quantity), 0) FROM wines w JOIN cells c ON c.id = w.cell_id WHERE c.cave_id = caves.id) AS current, \
created_at FROM caves";

const CELL_SELECT: &str = "SELECT id, cave_id, location, capacity, \
(SELECT COALESCE(SUM(w.quantity), 0) FROM wines w WHERE w.cell_id = cells.id) AS current, \
created_at FROM cells";

pub async fn list_caves(pool: &SqlitePool) -> AppResult<Vec<Cave>> {
    let sql = format!("{CAVE_SELECT} ORDER BY name COLLATE NOCASE, id");
    Ok(sqlx::query_as::<_, Cave>(&sql).fetch_all(pool).await?)
}

pub async fn get_cave(pool: &SqlitePool, id: i64) -> AppResult<Option<Cave>> {
    let sql = format!("{CAVE_SELECT} WHERE id = ?1");
    Ok(sqlx::query_as::<_, Cave>(&sql).bind(id).fetch_optional(pool).await?)
}

pub async fn create_cave(pool: &SqlitePool, input: &CaveInput) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO caves (name, model, location, capacity) VALUES (?1, ?2, ?3, ?4)")
        .bind(&input.name)
        .bind(&input.model)
        .bind(&input.location)
        .bind(input.capacity)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Returns `false` when no cave has that id.
pub async fn update_cave(pool: &SqlitePool, id: i64, input: &CaveInput) -> AppResult<bool> {
    let result = sqlx::query("UPDATE caves SET name = ?1, model = ?2, location = ?3, capacity = ?4 WHERE id = ?5")
        .bind(&input.name)
        .bind(&input.model)
        .bind(&input.location)
        .bind(input.capacity)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_cells(pool: &SqlitePool, cave_id: i64) -> AppResult<Vec<Cell>> {
    let sql = format!("{CELL_SELECT} WHERE cave_id = ?1 ORDER BY location COLLATE NOCASE, id");
    Ok(sqlx::query_as::<_, Cell>(&sql).bind(cave_id).fetch_all(pool).await?)
}

pub async fn list_all_cells(pool: &SqlitePool) -> AppResult<Vec<Cell>> {
    let sql = format!("{CELL_SELECT} ORDER BY cave_id, id");
    Ok(sqlx::query_as::<_, Cell>(&sql).fetch_all(pool).await?)
}

pub async fn get_cell(pool: &SqlitePool, id: i64) -> AppResult<Option<Cell>> {
    let sql = format!("{CELL_SELECT} WHERE id = ?1");
    Ok(sqlx::query_as::<_, Cell>(&sql).bind(id).fetch_optional(pool).await?)
}

/// Inserts the cell; callers check that the cave exists.
pub async fn create_cell(pool: &SqlitePool, input: &CellInput) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO cells (cave_id, location, capacity) VALUES (?1, ?2, ?3)")
        .bind(input.cave_id)
        .bind(&input.location)
        .bind(input.capacity)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn cell_exists<'e, E>(executor: E, id: i64) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cells WHERE id = ?1").bind(id).fetch_one(executor).await?;
    Ok(count > 0)
}

pub async fn count_caves(pool: &SqlitePool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM caves").fetch_one(pool).await?)
}
