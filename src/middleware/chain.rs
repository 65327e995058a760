//! Ordered composition of the middleware stages around a route.
//!
//! A chain is a slice of [`Stage`]s listed outermost first. [`wrap`] layers them onto a
//! `MethodRouter` so that a request passes the stages in list order and the response
//! passes them in reverse. A stage that rejects answers once and never calls the rest.

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::MethodRouter;

use super::{auth, body_limit, cors, csrf, logging, rate_limit, security_headers, setup};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Logging,
    SecurityHeaders,
    BodyLimit,
    RateLimit,
    Cors,
    Csrf,
    AuthRequired,
    SetupGate,
    AdminRequired,
}

/// Unauthenticated endpoints.
pub const PUBLIC: &[Stage] =
    &[Stage::Logging, Stage::SecurityHeaders, Stage::BodyLimit, Stage::RateLimit, Stage::Cors, Stage::Csrf];

/// Endpoints that need a valid session.
pub const PROTECTED: &[Stage] = &[
    Stage::Logging,
    Stage::SecurityHeaders,
    Stage::BodyLimit,
    Stage::RateLimit,
    Stage::Cors,
    Stage::Csrf,
    Stage::AuthRequired,
];

/// Endpoints that need an admin session and a completed setup.
pub const ADMIN: &[Stage] = &[
    Stage::Logging,
    Stage::SecurityHeaders,
    Stage::BodyLimit,
    Stage::RateLimit,
    Stage::Cors,
    Stage::Csrf,
    Stage::AuthRequired,
    Stage::SetupGate,
    Stage::AdminRequired,
];

/// `OPTIONS` routes: answered by the CORS stage, never rate limited or authenticated.
pub const PREFLIGHT: &[Stage] = &[Stage::Logging, Stage::Cors];

fn apply(router: MethodRouter<AppState>, stage: Stage, state: &AppState) -> MethodRouter<AppState> {
    match stage {
        Stage::Logging => router.layer(from_fn_with_state(state.clone(), logging::logging_middleware)),
        Stage::SecurityHeaders => {
            router.layer(from_fn_with_state(state.clone(), security_headers::security_headers_middleware))
        }
        Stage::BodyLimit => router.layer(from_fn_with_state(state.clone(), body_limit::body_limit_middleware)),
        Stage::RateLimit => router.layer(from_fn_with_state(state.clone(), rate_limit::rate_limit_middleware)),
        Stage::Cors => router.layer(cors::cors_layer(state.config.clone())),
        Stage::Csrf => router.layer(from_fn(csrf::csrf_middleware)),
        Stage::AuthRequired => router.layer(from_fn_with_state(state.clone(), auth::auth_required_middleware)),
        Stage::SetupGate => router.layer(from_fn_with_state(state.clone(), setup::setup_gate_middleware)),
        Stage::AdminRequired => router.layer(from_fn(auth::admin_required_middleware)),
    }
}

/// Layers `stages` onto `router`, first stage outermost.
pub fn wrap(router: MethodRouter<AppState>, stages: &[Stage], state: &AppState) -> MethodRouter<AppState> {
    // the last layer added runs first
    stages.iter().rev().fold(router, |router, stage| apply(router, *stage, state))
}
