//! Run configuration.
//!
//! Settings are read once at startup from an optional TOML file
//! (`~/.config/chirpmail/config.toml` unless `--config` is given) and then
//! overlaid with `CHIRPMAIL_*` environment variables, which is where the API
//! secrets normally live. The result is validated into a [`Config`] that is
//! passed to the pipeline; nothing reads the environment after that.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "CHIRPMAIL_";
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1";
pub const DEFAULT_INITIAL_COUNT: u32 = 5;
pub const DEFAULT_FROM_ADDRESS: &str = "chirpmail@noreply.invalid";
pub const DEFAULT_SUBJECT: &str = "Recent posts";
pub const DEFAULT_SMTP_HOST: &str = "localhost";
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// OAuth 1.0a user-context credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub to: String,
    pub from: String,
    pub subject: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Validated configuration, constant for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: ApiCredentials,
    pub api_base: String,
    /// Posts to fetch when there is no checkpoint yet.
    pub initial_count: u32,
    pub record_path: PathBuf,
    pub email: EmailConfig,
    pub smtp: SmtpConfig,
    pub timezone: Tz,
    /// Treat a non-200 timeline response as a failed run instead of an empty one.
    pub strict_fetch_status: bool,
}

/// Raw settings as they appear in the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub record_path: Option<PathBuf>,
    pub timezone: Option<String>,
    pub strict_fetch_status: Option<bool>,
    pub api: ApiSettings,
    pub email: EmailSettings,
    pub smtp: SmtpSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub base_url: Option<String>,
    pub initial_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub to: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load from `path` (or the default location) plus the process environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Settings::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Settings::from_file(&path)?,
                _ => Settings::default(),
            },
        };

        settings
            .with_env(|key| std::env::var(key).ok())?
            .validate()
    }

    /// `~/.config/chirpmail/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chirpmail").join("config.toml"))
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overlay values found through `lookup`, keyed by full variable name.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        overlay(&mut self.api.consumer_key, var("CONSUMER_KEY"));
        overlay(&mut self.api.consumer_secret, var("CONSUMER_SECRET"));
        overlay(&mut self.api.access_token, var("ACCESS_TOKEN"));
        overlay(&mut self.api.access_token_secret, var("ACCESS_TOKEN_SECRET"));
        overlay(&mut self.api.base_url, var("API_BASE"));
        overlay(&mut self.record_path, var("RECORD_PATH").map(PathBuf::from));
        overlay(&mut self.email.to, var("EMAIL_ADDRESS"));
        overlay(&mut self.email.from, var("FROM_ADDRESS"));
        overlay(&mut self.email.subject, var("SUBJECT"));
        overlay(&mut self.timezone, var("TIMEZONE"));
        overlay(&mut self.smtp.host, var("SMTP_HOST"));
        overlay(&mut self.smtp.username, var("SMTP_USERNAME"));
        overlay(&mut self.smtp.password, var("SMTP_PASSWORD"));

        if let Some(port) = var("SMTP_PORT") {
            self.smtp.port = Some(parse_number("SMTP_PORT", &port)?);
        }
        if let Some(count) = var("INITIAL_COUNT") {
            self.api.initial_count = Some(parse_number("INITIAL_COUNT", &count)?);
        }
        if let Some(strict) = var("STRICT_FETCH_STATUS") {
            self.strict_fetch_status = Some(parse_bool("STRICT_FETCH_STATUS", &strict)?);
        }

        Ok(self)
    }

    pub fn validate(self) -> Result<Config, ConfigError> {
        let credentials = ApiCredentials {
            consumer_key: required(self.api.consumer_key, "api.consumer_key")?,
            consumer_secret: required(self.api.consumer_secret, "api.consumer_secret")?,
            access_token: required(self.api.access_token, "api.access_token")?,
            access_token_secret: required(self.api.access_token_secret, "api.access_token_secret")?,
        };
        let record_path = required(self.record_path, "record_path")?;
        let to = required(self.email.to, "email.to")?;
        let tz_name = required(self.timezone, "timezone")?;
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name.clone()))?;

        let initial_count = self.api.initial_count.unwrap_or(DEFAULT_INITIAL_COUNT);
        if initial_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.initial_count",
                value: "0".into(),
            });
        }

        match (&self.smtp.username, &self.smtp.password) {
            (Some(_), None) => return Err(ConfigError::Missing("smtp.password")),
            (None, Some(_)) => return Err(ConfigError::Missing("smtp.username")),
            _ => {}
        }

        Ok(Config {
            credentials,
            api_base: self
                .api
                .base_url
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            initial_count,
            record_path,
            email: EmailConfig {
                to,
                from: self.email.from.unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
                subject: self.email.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            },
            smtp: SmtpConfig {
                host: self.smtp.host.unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: self.smtp.port.unwrap_or(DEFAULT_SMTP_PORT),
                username: self.smtp.username,
                password: self.smtp.password,
            },
            timezone,
            strict_fetch_status: self.strict_fetch_status.unwrap_or(false),
        })
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing(key))
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: name,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Unknown time zone {0:?}")]
    InvalidTimezone(String),

    #[error("Invalid value {value:?} for `{key}`")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
