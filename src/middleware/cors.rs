use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AppConfig;
use crate::session::CSRF_HEADER;

const MAX_AGE: Duration = Duration::from_secs(3600);

/// Credentialed CORS for the origins `security.allowed_origins` admits.
///
/// A rejected origin is logged and gets no CORS headers, so the browser blocks the
/// response. `OPTIONS` is answered by the layer itself and never reaches CSRF or auth.
pub fn cors_layer(config: Arc<AppConfig>) -> CorsLayer {
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
        let allowed = origin.to_str().map(|o| config.security.is_origin_allowed(o)).unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, path = %parts.uri.path(), "rejected CORS origin");
        }
        allowed
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, HeaderName::from_static(CSRF_HEADER)])
        .allow_credentials(true)
        .max_age(MAX_AGE)
}
