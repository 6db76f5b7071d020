//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use starchat_coze::api::{DEFAULT_BASE_URL, DEFAULT_POLL_ATTEMPTS};

/// Runtime configuration for starchat-server.
///
/// Every field has a sensible default so the server starts without any
/// environment variables set. The chat route reports itself unconfigured
/// until `COZE_API_TOKEN` and `COZE_BOT_ID` are provided.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Directory holding the website files, served for unmatched paths.
    pub static_dir: Option<String>,

    /// Coze API base URL.
    pub coze_base_url: String,

    /// Coze personal access token.
    pub coze_token: String,

    /// Coze bot to chat with.
    pub coze_bot_id: String,

    /// Maximum status polls for non-streaming chats.
    pub poll_attempts: usize,

    /// Delay before each status poll.
    pub poll_interval: Duration,

    /// Timeout for each non-streaming upstream request.
    pub upstream_timeout: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("STARCHAT_BIND", "0.0.0.0:3000"),
            log_level: env_or("STARCHAT_LOG", "info"),
            log_json: env_flag("STARCHAT_LOG_JSON", false),
            cors_allowed_origins: env_opt("STARCHAT_CORS_ORIGINS"),
            enable_swagger: env_flag("STARCHAT_ENABLE_SWAGGER", true),
            static_dir: env_opt("STARCHAT_STATIC_DIR"),
            coze_base_url: env_or("COZE_API_BASE_URL", DEFAULT_BASE_URL),
            coze_token: env_or("COZE_API_TOKEN", ""),
            coze_bot_id: env_or("COZE_BOT_ID", ""),
            poll_attempts: parse_env("COZE_POLL_ATTEMPTS", DEFAULT_POLL_ATTEMPTS),
            poll_interval: Duration::from_millis(parse_env("COZE_POLL_INTERVAL_MS", 1000)),
            upstream_timeout: Duration::from_secs(parse_env("COZE_TIMEOUT_SECS", 60)),
        }
    }

    /// `true` when both the token and the bot id are set.
    pub fn coze_configured(&self) -> bool {
        !self.coze_token.trim().is_empty() && !self.coze_bot_id.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            log_level: "info".into(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: true,
            static_dir: None,
            coze_base_url: DEFAULT_BASE_URL.into(),
            coze_token: String::new(),
            coze_bot_id: String::new(),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(1000),
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
