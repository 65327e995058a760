use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

// Liveness plus a bounded database ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    let database = match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => "ok",
        Ok(Err(e)) => {
            tracing::warn!("Health check database error: {}", e);
            "error"
        }
        Err(_) => "timeout",
    };
    let status = if database == "ok" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
