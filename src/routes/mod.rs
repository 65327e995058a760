//! HTTP route handlers for the Glou API.
//!
//! Handlers are thin: they validate input, call into [`crate::store`] and shape the
//! JSON answer. Authentication, CSRF and the other cross-cutting checks have already
//! run in the route's middleware chain.
//!
//! - `admin`: settings, user list and approval, counts
//! - `alerts`: active alerts and dismissal
//! - `auth`: login, logout, registration, password reset, session status, CSRF token
//! - `caves`: caves and their cells
//! - `consumption`: tastings and per-wine history
//! - `export`: JSON and CSV export, JSON import
//! - `health`: liveness and database check
//! - `setup`: first-run wizard
//! - `wines`: inventory CRUD, search and the drinkable list

pub mod admin;
pub mod alerts;
pub mod auth;
pub mod caves;
pub mod consumption;
pub mod export;
pub mod health;
pub mod setup;
pub mod wines;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::state::AppState;

/// `Json` extractor whose rejections use the application error body. An oversized
/// body surfaces as 413 `PAYLOAD_TOO_LARGE`.
pub struct ApiJson<T>(pub T);

impl<T> FromRequest<AppState> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection, state.config.security.max_request_body_size)),
        }
    }
}

fn json_rejection(rejection: JsonRejection, max_bytes: usize) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(max_bytes, "request body too large while reading");
        return AppError::PayloadTooLarge { max_bytes };
    }
    AppError::BadRequest(rejection.body_text())
}
