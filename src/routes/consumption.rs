use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::ApiJson;
use crate::{
    error::{AppResult, OptionExt},
    middleware::CurrentUser,
    state::AppState,
    store::{
        consumption::{self, ConsumptionInput},
        wines,
    },
};

pub async fn record_consumption(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<ConsumptionInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let record = consumption::record_consumption(&state.db, &input).await?;
    tracing::info!(
        wine_id = record.wine_id,
        quantity = record.quantity,
        user_id = user.user_id,
        "consumption recorded"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn wine_history(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    wines::get_wine(&state.db, id).await?.ok_or_not_found("Wine")?;
    Ok(Json(consumption::history_for_wine(&state.db, id).await?))
}
