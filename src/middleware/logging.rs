use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use super::ip::client_id_for;
use crate::state::AppState;

/// Logs each request once it has been answered. Never short-circuits.
pub async fn logging_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = sanitize_for_logging(req.uri().path());
    let client = client_id_for(&req, state.config.security.trust_proxy_headers);
    let started = Instant::now();

    tracing::debug!(%method, %path, %client, "request started");
    let res = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        %client,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    res
}

/// Strips control characters, caps the length at 200 chars and escapes quotes, so
/// client-supplied text cannot forge log lines.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
