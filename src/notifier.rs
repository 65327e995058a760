//! Delivery of password-reset tokens.
//!
//! Handlers only hand the token to a [`ResetNotifier`]; the transport behind it is
//! swappable. [`LogNotifier`] records that a token was issued without sending anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A freshly issued reset token and its recipient.
#[derive(Debug, Clone)]
pub struct ResetNotice {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(&self, notice: &ResetNotice) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(&self, notice: &ResetNotice) -> anyhow::Result<()> {
        // never log the token itself
        tracing::info!(
            user_id = notice.user_id,
            username = %notice.username,
            expires_at = %notice.expires_at,
            "Password reset token issued"
        );
        Ok(())
    }
}
