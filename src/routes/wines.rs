use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::ApiJson;
use crate::{
    error::{AppError, AppResult, OptionExt},
    middleware::CurrentUser,
    state::AppState,
    store::{
        caves,
        wines::{self, WineFilter, WineInput},
    },
};

/// Validates the body and that its cell, if any, exists.
async fn check_input(state: &AppState, input: &WineInput) -> AppResult<()> {
    input.validate()?;
    if let Some(cell_id) = input.cell_id {
        if !caves::cell_exists(&state.db, cell_id).await? {
            return Err(AppError::validation("cell_id", "Cell does not exist"));
        }
    }
    Ok(())
}

pub async fn list_wines(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(wines::list_wines(&state.db).await?))
}

pub async fn search_wines(
    State(state): State<AppState>,
    Query(filter): Query<WineFilter>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(wines::search_wines(&state.db, &filter).await?))
}

/// Wines in stock that are inside their drinking window today.
pub async fn drinkable_wines(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(wines::drinkable_wines(&state.db, chrono::Utc::now().date_naive()).await?))
}

pub async fn get_wine(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let wine = wines::get_wine(&state.db, id).await?.ok_or_not_found("Wine")?;
    Ok(Json(wine))
}

pub async fn create_wine(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<WineInput>,
) -> AppResult<impl IntoResponse> {
    check_input(&state, &input).await?;
    let id = wines::create_wine(&state.db, &input).await?;
    tracing::info!(wine_id = id, user_id = user.user_id, "wine created");
    let wine = wines::get_wine(&state.db, id).await?.ok_or_not_found("Wine")?;
    Ok((StatusCode::CREATED, Json(wine)))
}

pub async fn update_wine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<WineInput>,
) -> AppResult<impl IntoResponse> {
    check_input(&state, &input).await?;
    if !wines::update_wine(&state.db, id, &input).await? {
        return Err(AppError::NotFound("Wine not found".to_string()));
    }
    let wine = wines::get_wine(&state.db, id).await?.ok_or_not_found("Wine")?;
    Ok(Json(wine))
}

pub async fn delete_wine(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if !wines::delete_wine(&state.db, id).await? {
        return Err(AppError::NotFound("Wine not found".to_string()));
    }
    tracing::info!(wine_id = id, user_id = user.user_id, "wine deleted");
    Ok(StatusCode::NO_CONTENT)
}
