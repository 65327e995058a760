//! Route registration: each (path, methods) pair gets a handler and a stage chain.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{delete, get, options, post, put, MethodRouter},
    Router,
};
use tower_http::timeout::TimeoutLayer;

use crate::error::AppError;
use crate::middleware::chain::{self, Stage, ADMIN, PREFLIGHT, PROTECTED, PUBLIC};
use crate::routes;
use crate::state::AppState;

pub struct Server {
    state: AppState,
    router: Router<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state, router: Router::new() }
    }

    /// Registers `method_router` at `path` behind `stages`. Registering the same path
    /// again with other methods merges the two.
    pub fn route(mut self, path: &str, method_router: MethodRouter<AppState>, stages: &[Stage]) -> Self {
        let wrapped = chain::wrap(method_router, stages, &self.state);
        self.router = self.router.route(path, wrapped);
        self
    }

    /// Like [`Server::route`], plus an `OPTIONS` route behind the preflight chain.
    pub fn api(self, path: &str, method_router: MethodRouter<AppState>, stages: &[Stage]) -> Self {
        self.route(path, method_router, stages).route(path, options(preflight), PREFLIGHT)
    }

    pub fn into_router(self) -> Router {
        let timeout = Duration::from_secs(self.state.config.server.request_timeout_seconds.max(1));
        let max_body = self.state.config.security.max_request_body_size;
        self.router
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(max_body))
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
            .with_state(self.state)
    }
}

/// Never reached in practice: the CORS stage answers `OPTIONS` itself.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// The full application router.
pub fn build_app(state: AppState) -> Router {
    use routes::{admin, alerts, auth, caves, consumption, export, health, setup, wines};

    Server::new(state)
        .route("/health", get(health::health), PUBLIC)
        .api("/api/setup/check", get(setup::check_setup), &[])
        .api("/api/setup/complete", post(setup::complete_setup), PUBLIC)
        .api("/api/auth/login", post(auth::login), PUBLIC)
        .api("/api/auth/logout", post(auth::logout), PUBLIC)
        .api("/api/auth/register", post(auth::register), PUBLIC)
        .api("/api/auth/forgot-password", post(auth::forgot_password), PUBLIC)
        .api("/api/auth/reset-password", post(auth::reset_password), PUBLIC)
        .api("/api/auth/status", get(auth::status), PUBLIC)
        .api("/api/csrf", get(auth::csrf_token), PROTECTED)
        .api("/wines", get(wines::list_wines).post(wines::create_wine), PROTECTED)
        .api("/wines/search", get(wines::search_wines), PROTECTED)
        .api("/wines/drinkable", get(wines::drinkable_wines), PROTECTED)
        .api(
            "/wines/{id}",
            get(wines::get_wine).put(wines::update_wine).delete(wines::delete_wine),
            PROTECTED,
        )
        .api("/wines/{id}/history", get(consumption::wine_history), PROTECTED)
        .api("/consumption", post(consumption::record_consumption), PROTECTED)
        .api("/caves", get(caves::list_caves).post(caves::create_cave), PROTECTED)
        .api("/caves/{id}", get(caves::get_cave).put(caves::update_cave), PROTECTED)
        .api("/caves/{id}/cells", get(caves::list_cells), PROTECTED)
        .api("/caves/{id}/wines", get(caves::list_cave_wines), PROTECTED)
        .api("/cells", post(caves::create_cell), PROTECTED)
        .api("/alerts", get(alerts::list_alerts), PROTECTED)
        .api("/alerts/{id}", delete(alerts::dismiss_alert), PROTECTED)
        .api("/api/admin/settings", get(admin::get_settings).put(admin::update_settings), ADMIN)
        .api("/api/admin/users", get(admin::list_users), ADMIN)
        .api("/api/admin/users/{id}/approve", put(admin::approve_user), ADMIN)
        .api("/api/admin/stats", get(admin::stats), ADMIN)
        .api("/api/export/json", get(export::export_json), ADMIN)
        .api("/api/export/wines-csv", get(export::export_wines_csv), ADMIN)
        .api("/api/export/caves-csv", get(export::export_caves_csv), ADMIN)
        .api("/api/export/tasting-history-csv", get(export::export_tasting_history_csv), ADMIN)
        .api("/api/import/json", post(export::import_json), ADMIN)
        .into_router()
}
