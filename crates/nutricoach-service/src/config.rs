//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use nutricoach_core::{Handle, DEFAULT_TRIAL_HOURS};

/// Default language model base URL (OpenAI-compatible).
pub const DEFAULT_AI_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model order: primary first, then fallbacks.
pub const DEFAULT_AI_MODELS: &[&str] = &[
    "deepseek/deepseek-chat",
    "openai/gpt-4o-mini",
    "anthropic/claude-3-haiku",
];

/// Longest accepted trial, one year.
pub const MAX_TRIAL_HOURS: i64 = 24 * 365;

/// Service configuration loaded from environment variables.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL URL. `None` selects the in-memory store.
    pub database_url: Option<String>,

    /// Pool size (default: 10).
    pub database_max_connections: u32,

    /// Startup connection attempts before giving up (default: 5).
    pub database_connect_attempts: u32,

    /// Telegram bot token; signs Mini-App init data.
    pub bot_secret: String,

    /// Handle that bypasses entitlement checks and may manage promo codes.
    pub admin_handle: Option<Handle>,

    /// Trial length granted on first `/start` (default: 24).
    pub trial_duration_hours: i64,

    /// Shared key the bot process presents in `X-Api-Key`.
    pub service_api_key: Option<String>,

    /// Language model API key. The AI client is disabled without it.
    pub ai_api_key: Option<String>,

    /// Language model base URL.
    pub ai_base_url: String,

    /// Model ids, tried in order.
    pub ai_models: Vec<String>,

    /// Per-request timeout for the language model, in seconds.
    pub ai_timeout_seconds: u64,

    /// Telegram Bot API base URL.
    pub telegram_api_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Secrets file structure. Every field is optional; missing ones fall back
/// to the environment.
#[derive(Debug, Default, Deserialize)]
struct Secrets {
    #[serde(default)]
    bot_secret: Option<String>,
    #[serde(default)]
    ai_api_key: Option<String>,
    #[serde(default)]
    service_api_key: Option<String>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ServiceConfig {
    /// Load configuration from environment variables and the secrets file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no bot secret is configured and
    /// `ConfigError::Invalid` for an out-of-range trial length.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secrets = load_secrets();
        let defaults = Self::default();

        let bot_secret = secrets
            .bot_secret
            .or_else(|| env("BOT_SECRET"))
            .ok_or(ConfigError::Missing("BOT_SECRET"))?;

        Ok(Self {
            listen_addr: env("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: env("DATABASE_URL"),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            database_connect_attempts: parsed("DATABASE_CONNECT_ATTEMPTS")
                .unwrap_or(defaults.database_connect_attempts),
            bot_secret,
            admin_handle: Handle::parse_opt(env("ADMIN_HANDLE").as_deref()),
            trial_duration_hours: trial_hours(env("TRIAL_DURATION_HOURS").as_deref())?,
            service_api_key: secrets.service_api_key.or_else(|| env("SERVICE_API_KEY")),
            ai_api_key: secrets.ai_api_key.or_else(|| env("AI_API_KEY")),
            ai_base_url: env("AI_BASE_URL").unwrap_or(defaults.ai_base_url),
            ai_models: env("AI_MODELS")
                .map(|s| split_list(&s))
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.ai_models),
            ai_timeout_seconds: parsed("AI_TIMEOUT_SECONDS").unwrap_or(defaults.ai_timeout_seconds),
            telegram_api_url: env("TELEGRAM_API_URL").unwrap_or(defaults.telegram_api_url),
            cors_origins: env("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: parsed("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parsed("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        })
    }

    /// Trial length as a duration.
    #[must_use]
    pub fn trial_duration(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.trial_duration_hours.clamp(0, MAX_TRIAL_HOURS))
            .unwrap_or_else(chrono::Duration::zero)
    }

    /// Whether `handle` is the configured admin.
    #[must_use]
    pub fn is_admin(&self, handle: Option<&Handle>) -> bool {
        matches!((handle, &self.admin_handle), (Some(h), Some(admin)) if h == admin)
    }
}

/// Read a non-empty environment variable.
fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}

fn trial_hours(raw: Option<&str>) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TRIAL_HOURS);
    };
    let invalid = |reason: String| ConfigError::Invalid {
        name: "TRIAL_DURATION_HOURS",
        reason,
    };
    let hours: i64 = raw
        .parse()
        .map_err(|_| invalid(format!("{raw:?} is not a whole number of hours")))?;
    if !(0..=MAX_TRIAL_HOURS).contains(&hours) {
        return Err(invalid(format!("{hours} is outside 0..={MAX_TRIAL_HOURS}")));
    }
    Ok(hours)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load secrets from the first secrets file found.
fn load_secrets() -> Secrets {
    let secret_paths = [
        ".secrets/nutricoach.json",
        "nutricoach/.secrets/nutricoach.json",
        "../.secrets/nutricoach.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<Secrets>(path) {
            tracing::info!(path = %path, "Loaded secrets from file");
            return secrets;
        }
    }

    tracing::debug!("Secrets file not found, using environment variables");
    Secrets::default()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn redacted(secret: Option<&str>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("listen_addr", &self.listen_addr)
            .field("database_url", &redacted(self.database_url.as_deref()))
            .field("database_max_connections", &self.database_max_connections)
            .field("database_connect_attempts", &self.database_connect_attempts)
            .field(
                "bot_secret",
                &redacted(Some(self.bot_secret.as_str()).filter(|s| !s.is_empty())),
            )
            .field("admin_handle", &self.admin_handle)
            .field("trial_duration_hours", &self.trial_duration_hours)
            .field("service_api_key", &redacted(self.service_api_key.as_deref()))
            .field("ai_api_key", &redacted(self.ai_api_key.as_deref()))
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_models", &self.ai_models)
            .field("ai_timeout_seconds", &self.ai_timeout_seconds)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("cors_origins", &self.cors_origins)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            database_connect_attempts: 5,
            bot_secret: String::new(),
            admin_handle: None,
            trial_duration_hours: DEFAULT_TRIAL_HOURS,
            service_api_key: None,
            ai_api_key: None,
            ai_base_url: DEFAULT_AI_BASE_URL.into(),
            ai_models: DEFAULT_AI_MODELS.iter().map(|m| (*m).to_string()).collect(),
            ai_timeout_seconds: 60,
            telegram_api_url: "https://api.telegram.org".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" a/b , ,c/d,"),
            vec!["a/b".to_string(), "c/d".to_string()]
        );
    }

    #[test]
    fn admin_match_is_normalised() {
        let config = ServiceConfig {
            admin_handle: Handle::parse("@Coach"),
            ..ServiceConfig::default()
        };
        assert!(config.is_admin(Handle::parse("coach").as_ref()));
        assert!(!config.is_admin(Handle::parse("other").as_ref()));
        assert!(!config.is_admin(None));
        assert!(!ServiceConfig::default().is_admin(Handle::parse("coach").as_ref()));
    }

    #[test]
    fn defaults_use_the_documented_model_order() {
        let config = ServiceConfig::default();
        assert_eq!(config.ai_models[0], "deepseek/deepseek-chat");
        assert_eq!(config.ai_models.len(), 3);
        assert_eq!(config.trial_duration(), chrono::Duration::hours(24));
    }

    #[test]
    fn trial_hours_are_validated() {
        assert_eq!(trial_hours(None).unwrap(), DEFAULT_TRIAL_HOURS);
        assert_eq!(trial_hours(Some("48")).unwrap(), 48);
        assert_eq!(trial_hours(Some("0")).unwrap(), 0);
        assert!(matches!(
            trial_hours(Some("-1")),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(trial_hours(Some("9223372036854775807")).is_err());
        assert!(trial_hours(Some("a day")).is_err());
    }

    #[test]
    fn trial_duration_never_panics() {
        let config = ServiceConfig {
            trial_duration_hours: i64::MAX,
            ..ServiceConfig::default()
        };
        assert_eq!(
            config.trial_duration(),
            chrono::Duration::hours(MAX_TRIAL_HOURS)
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ServiceConfig {
            database_url: Some("postgres://app:hunter2@db/nutricoach".into()),
            bot_secret: "123456:BOT-TOKEN".into(),
            service_api_key: Some("service-key".into()),
            ai_api_key: Some("sk-live".into()),
            ..ServiceConfig::default()
        };
        let printed = format!("{config:?}");
        for secret in ["hunter2", "BOT-TOKEN", "service-key", "sk-live"] {
            assert!(!printed.contains(secret), "{secret} leaked: {printed}");
        }
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("0.0.0.0:8080"));
    }
}
