use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::session::{CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use crate::state::AppState;
use crate::{db, server, store};

pub const TEST_SECRET: &str = "test-secret-0123456789abcdef0123456789";
pub const TEST_CSRF: &str = "csrf-test-value";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.security.session_secret = TEST_SECRET.to_string();
    config
}

pub async fn state_with(config: AppConfig) -> AppState {
    // one connection, otherwise every connection gets its own empty in-memory database
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    db::init_db(&pool).await.unwrap();
    AppState::new(pool, config).unwrap()
}

pub async fn test_state() -> AppState {
    state_with(test_config()).await
}

pub fn app(state: &AppState) -> Router {
    server::build_app(state.clone())
}

pub async fn complete_setup(state: &AppState) {
    store::setup::mark_setup_complete(&state.db).await.unwrap();
}

pub fn admin_token(state: &AppState) -> String {
    state.sessions.issue_default(42, "alice", "admin")
}

pub fn user_token(state: &AppState) -> String {
    state.sessions.issue_default(7, "bob", "user")
}

/// Cookie header carrying a session and the test CSRF value.
pub fn session_cookies(token: &str) -> String {
    format!("{}={}; {}={}", SESSION_COOKIE, token, CSRF_COOKIE, TEST_CSRF)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, session_cookies(token));
    }
    builder.body(Body::empty()).unwrap()
}

/// A JSON request with the session and a matching CSRF header.
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(CSRF_HEADER, TEST_CSRF);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, session_cookies(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
