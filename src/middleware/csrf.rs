//! Double-submit CSRF protection.
//!
//! `GET /api/csrf` hands out a random value as the `glou_csrf` cookie. State-changing
//! requests must echo that value in the `X-CSRF-Token` header; a cross-site page can
//! make the browser send the cookie but cannot read it to fill in the header.

use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::session::{read_cookie, CSRF_COOKIE, CSRF_HEADER};

/// Endpoints that are reachable before a CSRF cookie can exist.
pub const CSRF_EXEMPT_PATHS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/forgot-password",
    "/api/auth/reset-password",
    "/api/auth/logout",
    "/api/setup/complete",
];

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

pub fn is_exempt(path: &str) -> bool {
    CSRF_EXEMPT_PATHS.contains(&path)
}

/// Header and cookie must both be present, non-empty and equal.
fn validate_csrf_pair(headers: &HeaderMap) -> bool {
    let header = match headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        Some(h) if !h.is_empty() => h,
        _ => return false,
    };
    let cookie = match read_cookie(headers, CSRF_COOKIE) {
        Some(c) if !c.is_empty() => c,
        _ => return false,
    };
    bool::from(header.as_bytes().ct_eq(cookie.as_bytes()))
}

pub async fn csrf_middleware(req: Request, next: Next) -> Response {
    if is_safe_method(req.method()) || is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    if !validate_csrf_pair(req.headers()) {
        tracing::warn!(method = %req.method(), path = %req.uri().path(), "CSRF validation failed");
        return AppError::forbidden("CSRF_INVALID", "Invalid or missing CSRF token").into_response();
    }

    next.run(req).await
}
