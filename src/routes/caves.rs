use axum::{
    extract::{Path, State},
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
        caves::{self, CaveInput, CellInput},
        wines,
    },
};

pub async fn list_caves(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(caves::list_caves(&state.db).await?))
}

pub async fn get_cave(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(caves::get_cave(&state.db, id).await?.ok_or_not_found("Cave")?))
}

pub async fn create_cave(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CaveInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let id = caves::create_cave(&state.db, &input).await?;
    tracing::info!(cave_id = id, user_id = user.user_id, "cave created");
    let cave = caves::get_cave(&state.db, id).await?.ok_or_not_found("Cave")?;
    Ok((StatusCode::CREATED, Json(cave)))
}

pub async fn update_cave(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<CaveInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if !caves::update_cave(&state.db, id, &input).await? {
        return Err(AppError::NotFound("Cave not found".to_string()));
    }
    Ok(Json(caves::get_cave(&state.db, id).await?.ok_or_not_found("Cave")?))
}

pub async fn list_cells(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    caves::get_cave(&state.db, id).await?.ok_or_not_found("Cave")?;
    Ok(Json(caves::list_cells(&state.db, id).await?))
}

/// Wines placed in any cell of the cave.
pub async fn list_cave_wines(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    caves::get_cave(&state.db, id).await?.ok_or_not_found("Cave")?;
    Ok(Json(wines::list_wines_in_cave(&state.db, id).await?))
}

pub async fn create_cell(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CellInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if caves::get_cave(&state.db, input.cave_id).await?.is_none() {
        return Err(AppError::validation("cave_id", "Cave does not exist"));
    }
    let id = caves::create_cell(&state.db, &input).await?;
    tracing::info!(cell_id = id, cave_id = input.cave_id, user_id = user.user_id, "cell created");
    let cell = caves::get_cell(&state.db, id).await?.ok_or_not_found("Cell")?;
    Ok((StatusCode::CREATED, Json(cell)))
}
