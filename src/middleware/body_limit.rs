use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::Limited;

use crate::{error::AppError, state::AppState};

/// Caps the request body at `security.max_request_body_size`.
///
/// A declared `Content-Length` above the cap is answered with 413 before any body
/// byte is read. Everything else is wrapped in [`Limited`], so an extractor that reads
/// past the cap fails with a length-limit error and axum answers 413 as well.
pub async fn body_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let max = state.config.security.max_request_body_size;

    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    if let Some(len) = declared {
        if len > max as u64 {
            tracing::warn!(path = %req.uri().path(), declared = len, max, "request body too large");
            return AppError::PayloadTooLarge { max_bytes: max }.into_response();
        }
    }

    let (parts, body) = req.into_parts();
    let req = Request::from_parts(parts, Body::new(Limited::new(body, max)));
    next.run(req).await
}
