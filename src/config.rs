use crate::error::{config_error, CalResult};
use chrono::{NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default location of the optional configuration file
pub const CONFIG_FILE: &str = "config/kalenteri.toml";

/// Default base URL of the remote event store
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/";

/// Where events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The remote REST event store
    Http,
    /// Process-local store, nothing survives a restart
    Memory,
}

impl FromStr for Backend {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Backend::Http),
            "memory" => Ok(Backend::Memory),
            other => Err(config_error(&format!("Unknown backend '{}'", other))),
        }
    }
}

/// Where the session token is persisted between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    File,
    Redis,
    Memory,
}

impl FromStr for TokenStoreKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenStoreKind::File),
            "redis" => Ok(TokenStoreKind::Redis),
            "memory" => Ok(TokenStoreKind::Memory),
            other => Err(config_error(&format!("Unknown token store '{}'", other))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API, auth and event endpoints hang off it
    pub api_base_url: Url,
    /// Event backend
    pub backend: Backend,
    /// Token persistence backend
    pub token_store: TokenStoreKind,
    /// Token file used by the file store
    pub token_path: PathBuf,
    /// Fixed name the token is stored under
    pub token_key: String,
    /// Redis connection used by the redis store
    pub redis_url: String,
    /// First day of the week in the month grid
    pub week_starts_on: Weekday,
    /// Timezone used to decide which day is today
    pub timezone: Tz,
    /// Per-request timeout for remote calls
    pub request_timeout: Duration,
    /// Locale for user-facing messages
    pub locale: String,
}

/// Keys accepted in the configuration file, all optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_url: Option<String>,
    backend: Option<String>,
    token_store: Option<String>,
    token_path: Option<String>,
    token_key: Option<String>,
    redis_url: Option<String>,
    week_start: Option<String>,
    timezone: Option<String>,
    request_timeout: Option<u64>,
    locale: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            backend: Backend::Http,
            token_store: TokenStoreKind::File,
            token_path: PathBuf::from("config/session_token"),
            token_key: "token".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            week_starts_on: Weekday::Sun,
            timezone: Tz::UTC,
            request_timeout: Duration::from_secs(10),
            locale: "en".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> CalResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = fs::read_to_string(CONFIG_FILE).ok();
        Self::from_sources(|key| env::var(key).ok(), file.as_deref())
    }

    /// Build a configuration from an environment lookup and optional TOML
    /// text. File values take precedence over the environment.
    pub fn from_sources<F>(lookup: F, file: Option<&str>) -> CalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match file {
            Some(content) => toml::from_str(content)?,
            None => FileConfig::default(),
        };
        let defaults = Config::default();

        let pick = |from_file: Option<String>, var: &str| from_file.or_else(|| lookup(var));

        let api_base_url = match pick(file.api_url, "KALENTERI_API_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => defaults.api_base_url,
        };

        let backend = match pick(file.backend, "KALENTERI_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let token_store = match pick(file.token_store, "KALENTERI_TOKEN_STORE") {
            Some(raw) => raw.parse()?,
            None => defaults.token_store,
        };

        let token_path = pick(file.token_path, "KALENTERI_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let token_key = pick(file.token_key, "KALENTERI_TOKEN_KEY").unwrap_or(defaults.token_key);
        if token_key.trim().is_empty() {
            return Err(config_error("Token key must not be empty"));
        }

        let redis_url = pick(file.redis_url, "REDIS_URL").unwrap_or(defaults.redis_url);

        let week_starts_on = match pick(file.week_start, "KALENTERI_WEEK_START") {
            Some(raw) => Weekday::from_str(raw.trim())
                .map_err(|_| config_error(&format!("Invalid week start '{}'", raw)))?,
            None => defaults.week_starts_on,
        };

        let timezone = match pick(file.timezone, "TIMEZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|_| config_error(&format!("Invalid timezone '{}'", raw)))?,
            None => defaults.timezone,
        };

        let request_timeout = match file.request_timeout {
            Some(secs) => Duration::from_secs(secs),
            None => match lookup("KALENTERI_REQUEST_TIMEOUT") {
                Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                    config_error(&format!("Invalid KALENTERI_REQUEST_TIMEOUT '{}'", raw))
                })?),
                None => defaults.request_timeout,
            },
        };

        let locale = pick(file.locale, "KALENTERI_LOCALE").unwrap_or(defaults.locale);

        Ok(Config {
            api_base_url,
            backend,
            token_store,
            token_path,
            token_key,
            redis_url,
            week_starts_on,
            timezone,
            request_timeout,
            locale,
        })
    }

    /// Today's date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

/// Parse the API base URL, making sure relative joins keep its path
fn parse_base_url(raw: &str) -> CalResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash)?;
    if url.cannot_be_a_base() {
        return Err(config_error(&format!("API URL '{}' cannot be a base", raw)));
    }
    Ok(url)
}
