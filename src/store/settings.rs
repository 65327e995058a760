//! Application settings, stored as one JSON document in a single row.
//!
//! Updates are merge patches: the keys of a JSON object overwrite the matching fields of
//! the current document. Unknown keys are rejected instead of being silently dropped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::error::{AppError, AppResult};

const READ_ONLY_KEYS: &[&str] = &["updated_at"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub app_title: String,
    pub app_slogan: String,
    pub logo_url: String,
    pub favicon_url: String,
    pub support_email: String,
    pub theme_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub dark_mode_default: bool,
    pub public_domain: String,
    pub public_protocol: String,
    pub proxy_mode: bool,
    pub allow_registration: bool,
    pub require_approval: bool,
    pub enable_notifications: bool,
    pub maintenance_mode: bool,
    pub rows_per_page: u32,
    pub date_format: String,
    pub language: String,
    /// Minutes.
    pub session_timeout: u32,
    pub smtp_configured: bool,
    pub updated_at: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_title: "Glou".to_string(),
            app_slogan: "Wine Management System".to_string(),
            logo_url: String::new(),
            favicon_url: String::new(),
            support_email: String::new(),
            theme_color: "#007bff".to_string(),
            secondary_color: "#6c757d".to_string(),
            accent_color: "#28a745".to_string(),
            dark_mode_default: false,
            public_domain: String::new(),
            public_protocol: "http".to_string(),
            proxy_mode: false,
            allow_registration: false,
            require_approval: false,
            enable_notifications: true,
            maintenance_mode: false,
            rows_per_page: 10,
            date_format: "YYYY-MM-DD".to_string(),
            language: "en".to_string(),
            session_timeout: 1440,
            smtp_configured: false,
            updated_at: None,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

impl Settings {
    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("theme_color", &self.theme_color),
            ("secondary_color", &self.secondary_color),
            ("accent_color", &self.accent_color),
        ] {
            if !is_hex_color(value) {
                return Err(AppError::validation(field, "Must be a hex color such as #1a2b3c"));
            }
        }
        if !matches!(self.public_protocol.as_str(), "http" | "https") {
            return Err(AppError::validation("public_protocol", "Must be http or https"));
        }
        if !(1..=500).contains(&self.rows_per_page) {
            return Err(AppError::validation("rows_per_page", "Must be between 1 and 500"));
        }
        if !matches!(self.language.as_str(), "en" | "fr") {
            return Err(AppError::validation("language", "Must be en or fr"));
        }
        if self.app_title.trim().is_empty() {
            return Err(AppError::validation("app_title", "Must not be empty"));
        }
        Ok(())
    }

    /// Applies a merge patch and validates the result. `self` is left untouched.
    pub fn merged(&self, patch: &Map<String, Value>) -> AppResult<Settings> {
        let mut doc = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(AppError::Internal(anyhow::anyhow!("settings did not serialize to an object"))),
            Err(e) => return Err(AppError::Internal(e.into())),
        };

        for (key, value) in patch {
            if READ_ONLY_KEYS.contains(&key.as_str()) || !doc.contains_key(key) {
                return Err(AppError::BadRequest(format!("Unknown or read-only setting '{}'", key)));
            }
            doc.insert(key.clone(), value.clone());
        }

        let updated: Settings = serde_json::from_value(Value::Object(doc))
            .map_err(|e| AppError::BadRequest(format!("Invalid settings value: {}", e)))?;
        updated.validate()?;
        Ok(updated)
    }
}

/// Current settings, or the defaults when nothing has been stored yet.
pub async fn get_settings(pool: &SqlitePool) -> AppResult<Settings> {
    let doc: Option<String> = sqlx::query_scalar("SELECT document FROM settings WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    match doc {
        Some(doc) => serde_json::from_str(&doc)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt settings document: {}", e))),
        None => Ok(Settings::default()),
    }
}

pub async fn save_settings<'e, E>(executor: E, settings: &Settings) -> AppResult<Settings>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = format_timestamp(Utc::now());
    let mut stored = settings.clone();
    stored.updated_at = Some(now.clone());
    let doc = serde_json::to_string(&stored).map_err(|e| AppError::Internal(e.into()))?;
    sqlx::query(
        "INSERT INTO settings (id, document, updated_at) VALUES (1, ?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
    )
    .bind(doc)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(stored)
}
