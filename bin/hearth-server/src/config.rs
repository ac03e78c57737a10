//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use hearth_core::backend::ollama::{DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

/// Runtime configuration for hearth-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. Settings that may change while running (profile toggle,
/// default model) live in the settings table instead.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:8080"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://hearth.db"`); the file is created
    /// if missing.
    pub database_url: String,

    /// Base URL of the Ollama server.
    pub ollama_url: String,

    /// Seeds the `default_model` setting on first start.
    pub default_model: String,

    /// Bound on establishing the backend connection.
    pub connect_timeout: Duration,

    /// Bound on each read of the streamed reply.
    pub read_timeout: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated allowed origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve `/swagger-ui` and `/api-docs/openapi.json`.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("HEARTH_BIND", &defaults.bind_address),
            database_url: env_or("HEARTH_DATABASE_URL", &defaults.database_url),
            ollama_url: env_or("HEARTH_OLLAMA_URL", &defaults.ollama_url),
            default_model: env_or("HEARTH_DEFAULT_MODEL", &defaults.default_model),
            connect_timeout: Duration::from_secs(parse_env(
                "HEARTH_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            read_timeout: Duration::from_secs(parse_env(
                "HEARTH_READ_TIMEOUT_SECS",
                defaults.read_timeout.as_secs(),
            )),
            log_level: env_or("HEARTH_LOG", &defaults.log_level),
            log_json: env_flag("HEARTH_LOG_JSON", defaults.log_json),
            cors_allowed_origins: std::env::var("HEARTH_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_swagger: env_flag("HEARTH_ENABLE_SWAGGER", defaults.enable_swagger),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_owned(),
            database_url: "sqlite://hearth.db".to_owned(),
            ollama_url: DEFAULT_BASE_URL.to_owned(),
            default_model: "deepseek-coder:6.7b".to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
