use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    store::alerts,
};

pub async fn list_alerts(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(alerts::list_active(&state.db).await?))
}

pub async fn dismiss_alert(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    if !alerts::dismiss(&state.db, id).await? {
        return Err(AppError::NotFound("Alert not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
