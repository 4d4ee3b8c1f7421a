//! # ff-config
//!
//! Layered settings for Firefly: built-in defaults, an optional
//! `firefly.toml`, then `FIREFLY__SECTION__KEY` environment variables
//! (a `.env` file is loaded first when present).

use chrono::Duration;
use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
    #[serde(default)]
    pub mail: MailSettings,
    #[serde(default)]
    pub tasks: TaskSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { url: "sqlite://firefly.db".to_string(), max_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HMAC key for every token the service signs.
    pub secret_key: SecretString,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_email_token_ttl")]
    pub email_token_ttl_secs: i64,
    /// Re-issuing a token pair revokes the previous one.
    #[serde(default = "default_true")]
    pub single_session: bool,
}

fn default_access_ttl() -> i64 {
    3600
}

fn default_refresh_ttl() -> i64 {
    3600 * 24 * 31
}

fn default_email_token_ttl() -> i64 {
    3600
}

fn default_true() -> bool {
    true
}

impl AuthSettings {
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret_key: SecretString::from(secret.to_string()),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            email_token_ttl_secs: default_email_token_ttl(),
            single_session: true,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl_secs)
    }

    pub fn email_token_ttl(&self) -> Duration {
        Duration::seconds(self.email_token_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub per_page: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self { per_page: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub sender: String,
    pub subject_prefix: String,
    /// Registering with this address grants the Administrator role.
    pub admin: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: "Firefly Admin <noreply@firefly.local>".to_string(),
            subject_prefix: "[Firefly]".to_string(),
            admin: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self { max_attempts: 5, base_backoff_ms: 500 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

impl Settings {
    /// Loads `.env`, `firefly.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_config(
            Config::builder()
                .add_source(File::with_name("firefly").required(false))
                .add_source(Environment::with_prefix("FIREFLY").separator("__").try_parsing(true))
                .build()?,
        )
    }

    /// Builds settings from an already assembled source stack.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults around a given signing secret.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            database: DatabaseSettings::default(),
            auth: AuthSettings::with_secret(secret),
            pagination: PaginationSettings::default(),
            mail: MailSettings::default(),
            tasks: TaskSettings::default(),
            log: LogSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use secrecy::ExposeSecret;

        if self.auth.secret_key.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.secret_key must not be empty".into()));
        }
        if self.auth.access_ttl_secs <= 0 || self.auth.refresh_ttl_secs <= 0 {
            return Err(ConfigError::Invalid("token ttls must be positive".into()));
        }
        if self.pagination.per_page == 0 {
            return Err(ConfigError::Invalid("pagination.per_page must be positive".into()));
        }
        if self.tasks.max_attempts == 0 {
            return Err(ConfigError::Invalid("tasks.max_attempts must be positive".into()));
        }
        Ok(())
    }
}
