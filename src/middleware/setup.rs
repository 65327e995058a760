use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{state::AppState, store};

/// Paths that stay reachable while the first-run setup is pending.
pub const SETUP_EXEMPT_PATHS: &[&str] = &["/setup", "/api/setup/check", "/api/setup/complete"];

/// Redirects to `/setup` (303) until the setup wizard has been completed.
pub async fn setup_gate_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if SETUP_EXEMPT_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    match store::setup::is_setup_complete(&state.db).await {
        Ok(true) => next.run(req).await,
        Ok(false) => Redirect::to("/setup").into_response(),
        Err(e) => {
            tracing::error!("Setup status check failed: {}", e);
            e.into_response()
        }
    }
}
