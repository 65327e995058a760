use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::{auth::session_cookies, auth::validate_account, ApiJson};
use crate::{
    error::{AppError, AppResult},
    password::hash_password,
    session::ROLE_ADMIN,
    state::AppState,
    store::{settings, setup, users},
};

/// First-run wizard: the admin account plus optional branding.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetupRequest {
    pub username: String,
    pub email: String,
    pub password: String,

    pub app_title: String,
    pub app_slogan: String,
    pub logo_url: String,
    pub favicon_url: String,
    pub theme_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub public_domain: String,
    pub public_protocol: String,
    pub proxy_mode: bool,
    pub language: String,
}

impl SetupRequest {
    /// Copies every non-empty branding field onto `target`.
    fn apply_branding(&self, target: &mut settings::Settings) {
        let fields = [
            (&self.app_title, &mut target.app_title),
            (&self.app_slogan, &mut target.app_slogan),
            (&self.logo_url, &mut target.logo_url),
            (&self.favicon_url, &mut target.favicon_url),
            (&self.theme_color, &mut target.theme_color),
            (&self.secondary_color, &mut target.secondary_color),
            (&self.accent_color, &mut target.accent_color),
            (&self.public_domain, &mut target.public_domain),
            (&self.public_protocol, &mut target.public_protocol),
            (&self.language, &mut target.language),
        ];
        for (value, slot) in fields {
            if !value.trim().is_empty() {
                *slot = value.trim().to_string();
            }
        }
        target.proxy_mode = self.proxy_mode;
    }
}

pub async fn check_setup(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let complete = setup::is_setup_complete(&state.db).await?;
    let has_admin = users::has_admin(&state.db).await?;
    Ok(Json(json!({
        "setup_complete": complete,
        "has_admin": has_admin,
        "needs_setup": !complete,
    })))
}

fn already_completed() -> AppError {
    AppError::Conflict("Setup has already been completed".to_string())
}

/// Creates the admin, stores the branding and marks setup complete in one
/// transaction. The completion row is claimed first, so a concurrent second
/// request waits on the write lock and then finds setup complete.
pub async fn complete_setup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetupRequest>,
) -> AppResult<impl IntoResponse> {
    if setup::is_setup_complete(&state.db).await? {
        return Err(already_completed());
    }

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    validate_account(&username, &email, &req.password)?;

    let mut current = settings::get_settings(&state.db).await?;
    req.apply_branding(&mut current);
    current.validate()?;

    let hash = hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;
    if !setup::mark_setup_complete(&mut *tx).await? {
        return Err(already_completed());
    }
    let user_id = users::create_user(&mut *tx, &username, &email, &hash, ROLE_ADMIN)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Username or email already exists".to_string()),
            other => other,
        })?;
    settings::save_settings(&mut *tx, &current).await?;
    tx.commit().await?;

    let (cookies, csrf) = session_cookies(&state, user_id, &username, ROLE_ADMIN);
    tracing::info!(user_id, username = %username, "setup completed");
    Ok((
        StatusCode::CREATED,
        cookies,
        Json(json!({
            "success": true,
            "user": { "id": user_id, "username": username, "role": ROLE_ADMIN },
            "csrf_token": csrf,
        })),
    ))
}
