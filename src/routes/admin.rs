use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::ApiJson;
use crate::{
    error::{AppError, AppResult, OptionExt},
    middleware::CurrentUser,
    state::AppState,
    store::{alerts, caves, settings, users, wines},
};

pub async fn get_settings(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(settings::get_settings(&state.db).await?))
}

/// Merge-patches the stored settings with a JSON object.
pub async fn update_settings(
    State(state): State<AppState>,
    admin: CurrentUser,
    ApiJson(patch): ApiJson<Value>,
) -> AppResult<impl IntoResponse> {
    let Value::Object(patch) = patch else {
        return Err(AppError::BadRequest("Settings patch must be a JSON object".to_string()));
    };
    let current = settings::get_settings(&state.db).await?;
    let updated = current.merged(&patch)?;
    let stored = settings::save_settings(&state.db, &updated).await?;

    let keys: Vec<&str> = patch.keys().map(String::as_str).collect();
    tracing::info!(user_id = admin.user_id, keys = ?keys, "settings updated");
    Ok(Json(stored))
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(users::list_users(&state.db).await?))
}

/// Activates an account, typically one registered while `require_approval` was on.
pub async fn approve_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    if !users::set_active(&state.db, id, true).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = id, admin_id = admin.user_id, "user approved");
    let user = users::find_by_id(&state.db, id).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let wine_count = wines::count_wines(&state.db).await?;
    let bottle_count = wines::total_bottles(&state.db).await?;
    let user_count = users::count_users(&state.db).await?;
    let active_alerts = alerts::count_active(&state.db).await?;
    let cave_count = caves::count_caves(&state.db).await?;
    Ok(Json(json!({
        "caves": cave_count,
        "wines": wine_count,
        "bottles": bottle_count,
        "users": user_count,
        "active_alerts": active_alerts,
        "tracked_clients": state.rate_limiter.len().await,
    })))
}
