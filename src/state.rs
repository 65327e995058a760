use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::notifier::{LogNotifier, ResetNotifier};
use crate::session::SessionCodec;

/// The shared application state.
///
/// Cloned into every middleware stage and handler. The rate limiter and the session
/// codec live here rather than in globals, so each router (and each test) owns its own.
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub rate_limiter: RateLimiter,
    pub sessions: SessionCodec,
    pub notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    /// Builds the state from a validated configuration.
    ///
    /// Fails only when the session secret cannot key the HMAC.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let sessions = SessionCodec::from_config_secret(&config.security.session_secret)?;
        let rate_limiter =
            RateLimiter::new(config.security.rate_limit_requests, config.security.rate_limit_window_seconds);
        Ok(Self { db, config: Arc::new(config), rate_limiter, sessions, notifier: Arc::new(LogNotifier) })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Whether cookies get the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.config.security.environment.is_production()
    }
}
