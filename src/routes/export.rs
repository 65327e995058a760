use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiJson;
use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    state::AppState,
    store::{
        alerts::{self, Alert},
        caves::{self, Cave, Cell},
        consumption::{self, Consumption, TastingRecord},
        settings::{self, Settings},
        wines::{self, Wine, WineInput},
    },
};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct ExportData {
    pub exported_at: String,
    pub version: &'static str,
    pub settings: Settings,
    pub caves: Vec<Cave>,
    pub cells: Vec<Cell>,
    pub wines: Vec<Wine>,
    pub alerts: Vec<Alert>,
    pub consumption_history: Vec<Consumption>,
}

/// Accepts an export document; only `wines` is imported, other keys are ignored.
/// A wine's `cell_id` must name an existing cell.
#[derive(Debug, Deserialize)]
pub struct ImportData {
    #[serde(default)]
    pub wines: Vec<WineInput>,
}

fn attachment(mut response: Response, content_type: &'static str, filename: &str) -> Response {
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(header_val) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, header_val);
    }
    response
}

fn export_filename(kind: &str, extension: &str) -> String {
    format!("glou_{}_{}.{}", kind, chrono::Utc::now().format("%Y%m%d_%H%M%S"), extension)
}

pub async fn export_json(State(state): State<AppState>) -> AppResult<Response> {
    let data = ExportData {
        exported_at: chrono::Utc::now().to_rfc3339(),
        version: EXPORT_VERSION,
        settings: settings::get_settings(&state.db).await?,
        caves: caves::list_caves(&state.db).await?,
        cells: caves::list_all_cells(&state.db).await?,
        wines: wines::list_wines(&state.db).await?,
        alerts: alerts::list_all(&state.db).await?,
        consumption_history: consumption::list_all(&state.db).await?,
    };
    Ok(attachment(Json(data).into_response(), "application/json; charset=utf-8", &export_filename("export", "json")))
}

const WINE_CSV_HEADER: &str =
    "ID,Name,Producer,Region,Vintage,Type,Quantity,Cell ID,Min Apogee Date,Max Apogee Date,Comments,Created At\n";

fn format_wine_csv(wine: &Wine) -> String {
    format!(
        "{},\"{}\",\"{}\",\"{}\",{},\"{}\",{},{},{},{},\"{}\",{}\n",
        wine.id,
        escape_csv(&wine.name),
        escape_csv(wine.producer.as_deref().unwrap_or("")),
        escape_csv(&wine.region),
        wine.vintage.map(|v| v.to_string()).unwrap_or_default(),
        escape_csv(&wine.wine_type),
        wine.quantity,
        wine.cell_id.map(|id| id.to_string()).unwrap_or_default(),
        wine.min_apogee_date.as_deref().unwrap_or(""),
        wine.max_apogee_date.as_deref().unwrap_or(""),
        escape_csv(wine.comments.as_deref().unwrap_or("")),
        wine.created_at,
    )
}

pub async fn export_wines_csv(State(state): State<AppState>) -> AppResult<Response> {
    let mut csv_content = String::from(WINE_CSV_HEADER);
    for wine in wines::list_wines(&state.db).await? {
        csv_content.push_str(&format_wine_csv(&wine));
    }
    Ok(attachment(csv_content.into_response(), "text/csv; charset=utf-8", &export_filename("wines", "csv")))
}

const CAVE_CSV_HEADER: &str = "ID,Name,Model,Location,Total Capacity,Current Count,Created At\n";

fn format_cave_csv(cave: &Cave) -> String {
    format!(
        "{},\"{}\",\"{}\",\"{}\",{},{},{}\n",
        cave.id,
        escape_csv(&cave.name),
        escape_csv(cave.model.as_deref().unwrap_or("")),
        escape_csv(&cave.location),
        cave.capacity,
        cave.current,
        cave.created_at,
    )
}

pub async fn export_caves_csv(State(state): State<AppState>) -> AppResult<Response> {
    let mut csv_content = String::from(CAVE_CSV_HEADER);
    for cave in caves::list_caves(&state.db).await? {
        csv_content.push_str(&format_cave_csv(&cave));
    }
    Ok(attachment(csv_content.into_response(), "text/csv; charset=utf-8", &export_filename("caves", "csv")))
}

const TASTING_CSV_HEADER: &str = "ID,Wine ID,Wine Name,Quantity Consumed,Rating,Notes,Tasting Date,Created At\n";

fn format_tasting_csv(record: &TastingRecord) -> String {
    format!(
        "{},{},\"{}\",{},{},\"{}\",{},{}\n",
        record.id,
        record.wine_id,
        escape_csv(&record.wine_name),
        record.quantity,
        record.rating.map(|r| r.to_string()).unwrap_or_default(),
        escape_csv(record.comment.as_deref().unwrap_or("")),
        record.date,
        record.created_at,
    )
}

pub async fn export_tasting_history_csv(State(state): State<AppState>) -> AppResult<Response> {
    let mut csv_content = String::from(TASTING_CSV_HEADER);
    for record in consumption::tasting_records(&state.db).await? {
        csv_content.push_str(&format_tasting_csv(&record));
    }
    Ok(attachment(
        csv_content.into_response(),
        "text/csv; charset=utf-8",
        &export_filename("tasting_history", "csv"),
    ))
}

/// Imports all wines in one transaction; a single invalid entry rejects the whole file.
pub async fn import_json(
    State(state): State<AppState>,
    admin: CurrentUser,
    ApiJson(data): ApiJson<ImportData>,
) -> AppResult<impl IntoResponse> {
    for (index, wine) in data.wines.iter().enumerate() {
        wine.validate().map_err(|e| match e {
            AppError::ValidationError { field, message } => {
                AppError::validation(&format!("wines[{}].{}", index, field), message)
            }
            other => other,
        })?;
    }

    let mut tx = state.db.begin().await?;
    for (index, wine) in data.wines.iter().enumerate() {
        if let Some(cell_id) = wine.cell_id {
            if !caves::cell_exists(&mut *tx, cell_id).await? {
                return Err(AppError::validation(&format!("wines[{}].cell_id", index), "Cell does not exist"));
            }
        }
        wines::create_wine(&mut *tx, wine).await?;
    }
    tx.commit().await?;

    tracing::info!(user_id = admin.user_id, imported = data.wines.len(), "wines imported");
    Ok(Json(json!({ "success": true, "imported": data.wines.len() })))
}

fn escape_csv(s: &str) -> String {
    // Double quotes become two double quotes; newlines and control chars become spaces
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['"', '"'],
            '\n' | '\r' => vec![' '],
            c if c.is_control() => vec![' '],
            c => vec![c],
        })
        .collect()
}
