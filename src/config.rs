use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const DEFAULTS: &str = include_str!("../config/default.toml");
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Deployment environment. Anything other than `Production` permits every CORS origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: usize,
    pub rate_limit_window_seconds: u64,
    pub max_request_body_size: usize,
    pub session_secret: String,
    pub trust_proxy_headers: bool,
    pub csp: Option<String>,
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
}

impl SecurityConfig {
    /// Origin check for the CORS stage.
    ///
    /// Outside production every origin is accepted. This is meant for local
    /// development behind a trusted boundary and must never be the setting of
    /// an exposed deployment.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if !self.environment.is_production() {
            return true;
        }
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid server.port: {0}")]
    InvalidPort(u16),
    #[error("security.allowed_origins must not be empty")]
    NoAllowedOrigins,
    #[error("security.rate_limit_requests and security.rate_limit_window_seconds must be > 0")]
    InvalidRateLimit,
    #[error("security.max_request_body_size must be > 0")]
    InvalidBodySize,
    #[error("invalid logging.level: {0}")]
    InvalidLogLevel(String),
    #[error("security.session_secret is required in production")]
    MissingSessionSecret,
    #[error("security.session_secret must be at least 32 characters")]
    WeakSessionSecret,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> Result<AppConfig, ConfigError> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: glou.toml (in CWD)
        .add_source(::config::File::with_name("glou").required(false));

    if let Ok(custom_path) = std::env::var("GLOU_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("GLOU")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("security.allowed_origins"),
    );

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::InvalidPort(cfg.server.port));
    }
    let sec = &cfg.security;
    if sec.allowed_origins.iter().all(|o| o.trim().is_empty()) {
        return Err(ConfigError::NoAllowedOrigins);
    }
    if sec.rate_limit_requests == 0 || sec.rate_limit_window_seconds == 0 {
        return Err(ConfigError::InvalidRateLimit);
    }
    if sec.max_request_body_size == 0 {
        return Err(ConfigError::InvalidBodySize);
    }

    if !matches!(cfg.logging.level.as_str(), "debug" | "info" | "warn" | "error") {
        return Err(ConfigError::InvalidLogLevel(cfg.logging.level.clone()));
    }

    if sec.environment.is_production() {
        if sec.session_secret.is_empty() {
            return Err(ConfigError::MissingSessionSecret);
        }
        if sec.session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::WeakSessionSecret);
        }
    }

    Ok(())
}

/// Accepted but hazardous settings, logged by the caller once tracing is up.
pub fn warnings(cfg: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if cfg!(unix) && cfg.server.port < 1024 {
        warnings.push(format!("Using privileged port {} - may require elevated permissions", cfg.server.port));
    }

    let sec = &cfg.security;
    if !sec.environment.is_production() {
        if !sec.session_secret.is_empty() && sec.session_secret.len() < MIN_SESSION_SECRET_LEN {
            warnings.push(format!(
                "security.session_secret is shorter than {} characters; accepted outside production only",
                MIN_SESSION_SECRET_LEN
            ));
        }
        warnings.push("CORS accepts every origin because security.environment is not production".to_string());
    }
    warnings
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            return Ok(());
        }
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.url, "sqlite://data/glou.db");
        assert_eq!(cfg.security.environment, Environment::Development);
        assert_eq!(cfg.security.rate_limit_requests, 100);
        assert_eq!(cfg.security.rate_limit_window_seconds, 60);
        assert_eq!(cfg.security.max_request_body_size, 1024 * 1024);
        assert!(!cfg.security.trust_proxy_headers);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut cfg = AppConfig::default();
        cfg.security.session_secret = "short".to_string();
        let warnings = warnings(&cfg);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("session_secret"));
        assert!(warnings[1].contains("CORS accepts every origin"));

        cfg.security.environment = Environment::Production;
        cfg.security.session_secret = "x".repeat(32);
        assert!(super::warnings(&cfg).is_empty());

        cfg.server.port = 80;
        assert_eq!(super::warnings(&cfg).len(), usize::from(cfg!(unix)));
    }

    #[test]
    fn test_production_requires_strong_secret() {
        let mut cfg = AppConfig::default();
        cfg.security.environment = Environment::Production;
        assert!(matches!(validate(&cfg), Err(ConfigError::MissingSessionSecret)));

        cfg.security.session_secret = "short".to_string();
        assert!(matches!(validate(&cfg), Err(ConfigError::WeakSessionSecret)));

        cfg.security.session_secret = "x".repeat(32);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(validate(&cfg).unwrap_err().to_string().contains("invalid server.port"));

        let mut cfg = AppConfig::default();
        cfg.security.rate_limit_requests = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidRateLimit)));

        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".to_string();
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidLogLevel(_))));

        let mut cfg = AppConfig::default();
        cfg.security.allowed_origins.clear();
        assert!(matches!(validate(&cfg), Err(ConfigError::NoAllowedOrigins)));
    }

    #[test]
    fn test_origin_policy() {
        let mut sec = AppConfig::default().security;
        assert!(sec.is_origin_allowed("https://evil.example"));

        sec.environment = Environment::Production;
        assert!(sec.is_origin_allowed("http://localhost:8080"));
        assert!(!sec.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("GLOU__SERVER__PORT", Some("3000")),
                ("GLOU__SECURITY__ALLOWED_ORIGINS", Some("https://a.example,https://b.example")),
                ("GLOU__SECURITY__TRUST_PROXY_HEADERS", Some("true")),
            ],
            || {
                let cfg = load().unwrap();
                assert_eq!(cfg.server.port, 3000);
                assert_eq!(
                    cfg.security.allowed_origins,
                    vec!["https://a.example".to_string(), "https://b.example".to_string()]
                );
                assert!(cfg.security.trust_proxy_headers);
            },
        );
    }
}
