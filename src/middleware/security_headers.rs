//! Security headers applied to every response of the public and protected chains.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

pub const DEFAULT_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self' data:; \
connect-src 'self'; frame-ancestors 'none'";

/// Sets the fixed header set after the inner handler ran, so rejections from inner
/// stages carry the headers too.
///
/// `Content-Security-Policy` can be replaced through `security.csp`; HSTS is only sent
/// when `security.enable_hsts` is on. JSON responses are marked `no-store`.
pub async fn security_headers_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let sec = &state.config.security;
    let headers = res.headers_mut();

    headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    let csp = sec
        .csp
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .and_then(|c| HeaderValue::from_str(c).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CSP));
    headers.insert(HeaderName::from_static("content-security-policy"), csp);

    if sec.enable_hsts.unwrap_or(false) {
        let value = format!("max-age={}", sec.hsts_max_age.unwrap_or(31_536_000));
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("max-age=31536000")),
        );
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|s| s.starts_with("application/json"))
        .unwrap_or(false);
    if is_json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    res
}
