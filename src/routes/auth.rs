use std::time::Duration;

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::ApiJson;
use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    notifier::ResetNotice,
    password::{check_password_policy, hash_password, verify_password, verify_unknown_account},
    session::{self, read_cookie, SESSION_COOKIE},
    state::AppState,
    store::{settings, users},
};

/// Slows down credential guessing; applied to every failed login.
const FAILED_LOGIN_DELAY: Duration = Duration::from_millis(200);
const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub(crate) fn validate_account(username: &str, email: &str, password: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AppError::validation("username", "Must be between 3 and 50 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::validation("username", "Only letters, digits, '_' and '-' are allowed"));
    }
    if !email.contains('@') || email.len() > 255 {
        return Err(AppError::validation("email", "Must be a valid email address"));
    }
    check_password_policy(password).map_err(|msg| AppError::validation("password", msg))
}

pub(crate) type SessionCookies = AppendHeaders<[(HeaderName, String); 2]>;

/// The two `Set-Cookie` headers that open a session, and the CSRF value they carry.
pub(crate) fn session_cookies(
    state: &AppState,
    user_id: i64,
    username: &str,
    role: &str,
) -> (SessionCookies, String) {
    let secure = state.secure_cookies();
    let token = state.sessions.issue_default(user_id, username, role);
    let csrf = session::new_csrf_token();
    let headers = AppendHeaders([
        (SET_COOKIE, session::session_cookie(token, secure).to_string()),
        (SET_COOKIE, session::csrf_cookie(csrf.clone(), secure).to_string()),
    ]);
    (headers, csrf)
}

async fn reject_login() -> AppError {
    tokio::time::sleep(FAILED_LOGIN_DELAY).await;
    AppError::Unauthorized("Invalid credentials".to_string())
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let login = req.username.trim();
    if login.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Username and password are required".to_string()));
    }

    let Some(user) = users::find_by_login(&state.db, login).await? else {
        verify_unknown_account(&req.password);
        return Err(reject_login().await);
    };
    if !verify_password(&req.password, &user.password_hash) {
        tracing::warn!(username = %user.username, "failed login attempt");
        return Err(reject_login().await);
    }
    if !user.is_active {
        tracing::warn!(user_id = user.id, "login to inactive account refused");
        return Err(AppError::forbidden("ACCOUNT_INACTIVE", "Account is awaiting approval or disabled"));
    }
    if user.role != session::ROLE_ADMIN && settings::get_settings(&state.db).await?.maintenance_mode {
        return Err(AppError::maintenance());
    }

    let (cookies, csrf) = session_cookies(&state, user.id, &user.username, &user.role);
    tracing::info!(user_id = user.id, username = %user.username, "user logged in");
    Ok((
        cookies,
        Json(json!({
            "success": true,
            "user": { "id": user.id, "username": user.username, "role": user.role },
            "csrf_token": csrf,
        })),
    ))
}

/// Clears both cookies. The session token itself stays valid until it expires.
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, session::clear_session_cookie().to_string()),
            (SET_COOKIE, session::clear_csrf_cookie().to_string()),
        ]),
        Json(json!({ "success": true })),
    )
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let settings = settings::get_settings(&state.db).await?;
    if !settings.allow_registration {
        return Err(AppError::forbidden("REGISTRATION_DISABLED", "Registration is disabled"));
    }

    let username = req.username.trim();
    let email = req.email.trim();
    validate_account(username, email, &req.password)?;

    let hash = hash_password(&req.password)?;
    let mut tx = state.db.begin().await?;
    let user_id = users::create_user(&mut *tx, username, email, &hash, session::ROLE_USER)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Username or email already exists".to_string()),
            other => other,
        })?;
    // approval pending: the account exists but cannot sign in yet
    if settings.require_approval {
        users::set_active(&mut *tx, user_id, false).await?;
    }
    tx.commit().await?;

    tracing::info!(user_id, username, pending_approval = settings.require_approval, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user_id": user_id, "pending_approval": settings.require_approval })),
    ))
}

/// Always answers with the same message whether or not the address is known.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(AppError::validation("email", "Valid email is required"));
    }

    let settings = settings::get_settings(&state.db).await?;
    if !settings.smtp_configured {
        return Err(AppError::ServiceUnavailable("Email service is not configured".to_string()));
    }

    if let Some(user) = users::find_by_email(&state.db, email).await?.filter(|u| u.is_active) {
        let token = session::random_token();
        let expires_at = Utc::now() + chrono::Duration::hours(RESET_TOKEN_TTL_HOURS);
        users::create_reset_token(&state.db, user.id, &token, expires_at).await?;

        let notice = ResetNotice { user_id: user.id, username: user.username, email: user.email, token, expires_at };
        if let Err(e) = state.notifier.send_reset(&notice).await {
            tracing::error!(user_id = notice.user_id, "Failed to deliver reset token: {}", e);
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "If an account exists for this email, a reset link has been sent",
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    if req.token.trim().is_empty() {
        return Err(AppError::BadRequest("Token is required".to_string()));
    }
    check_password_policy(&req.new_password).map_err(|msg| AppError::validation("new_password", msg))?;

    let user_id = users::consume_reset_token(&state.db, req.token.trim())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;

    let hash = hash_password(&req.new_password)?;
    users::update_password(&state.db, user_id, &hash).await?;
    tracing::info!(user_id, "password reset");
    Ok(Json(json!({ "success": true, "message": "Password has been reset" })))
}

/// Session status without requiring a session.
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let claims = read_cookie(&headers, SESSION_COOKIE).and_then(|token| state.sessions.validate(&token));
    match claims {
        Some(c) => Json(json!({
            "authenticated": true,
            "user": { "id": c.user_id, "username": c.username, "role": c.role },
        })),
        None => Json(json!({ "authenticated": false, "user": null })),
    }
}

/// Issues a fresh CSRF cookie and hands the same value to the client script.
pub async fn csrf_token(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    let token = session::new_csrf_token();
    tracing::debug!(user_id = user.user_id, "issued CSRF token");
    (
        AppendHeaders([(SET_COOKIE, session::csrf_cookie(token.clone(), state.secure_cookies()).to_string())]),
        Json(json!({ "csrf_token": token })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account() {
        assert!(validate_account("alice", "alice@example.com", "cellar2024").is_ok());
        assert!(validate_account("al", "alice@example.com", "cellar2024").is_err());
        assert!(validate_account(&"a".repeat(51), "alice@example.com", "cellar2024").is_err());
        assert!(validate_account("alice smith", "alice@example.com", "cellar2024").is_err());
        assert!(validate_account("alice", "alice.example.com", "cellar2024").is_err());
        assert!(validate_account("alice", "alice@example.com", "nodigits").is_err());
        assert!(validate_account("j-doe_2", "j@example.com", "abcdefg1").is_ok());
    }
}
