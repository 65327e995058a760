//! Middleware stages for HTTP request processing.
//!
//! Each stage is an axum `from_fn` middleware, except CORS, which is tower-http's
//! `CorsLayer`. Routes do not layer them by hand: they pick a preset from [`chain`]
//! and the server composes it.

pub mod auth;
pub mod body_limit;
pub mod chain;
pub mod cors;
pub mod csrf;
pub mod ip;
pub mod logging;
pub mod rate_limit;
pub mod security_headers;
pub mod setup;

pub use auth::CurrentUser;
pub use chain::Stage;
pub use rate_limit::RateLimiter;
