use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MARKETS_URL: &str = "https://api.upbit.com/v1/market/all";
pub const DEFAULT_NOTICES_URL: &str = "https://upbit.com/service_center/notice";
pub const DEFAULT_ENV_FILE: &str = "tg.txt";

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]{20,}$").expect("token pattern is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TG_TOKEN is empty")]
    MissingToken,

    #[error(
        "TG_TOKEN has an invalid format (length={length}, edge code points={edges:?}); \
         expected <digits>:<key> without quotes or spaces"
    )]
    MalformedToken { length: usize, edges: Vec<u32> },

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub upbit: UpbitConfig,
    pub watcher: WatcherConfig,
    pub monitoring: MonitoringConfig,
    /// Dotenv file that was loaded, if one was found.
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UpbitConfig {
    pub markets_url: String,
    pub notices_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// Quote-currency prefixes, upper-cased and ending in `-`.
    pub filter_markets: Vec<String>,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub health_port: u16,
    pub log_level: String,
}

impl Config {
    /// Loads the dotenv file (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_file = env::var("ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
        let loaded = dotenv::from_filename(&env_file).ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.env_file = loaded;
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = validate_token(&lookup("TG_TOKEN").unwrap_or_default())?;
        let chat_id = lookup("TG_CHAT_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let poll_secs = parse_positive(&lookup, "POLL_INTERVAL_SEC", 60)?;
        let timeout_secs = parse_positive(&lookup, "HTTP_TIMEOUT_SEC", 30)?;
        let health_port = parse_positive(&lookup, "HEALTH_PORT", 8080)?;
        let health_port = u16::try_from(health_port).map_err(|_| ConfigError::InvalidNumber {
            key: "HEALTH_PORT",
            value: health_port.to_string(),
        })?;

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                chat_id,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            upbit: UpbitConfig {
                markets_url: lookup("UPBIT_MARKETS_URL")
                    .unwrap_or_else(|| DEFAULT_MARKETS_URL.to_string()),
                notices_url: lookup("UPBIT_NOTICES_URL")
                    .unwrap_or_else(|| DEFAULT_NOTICES_URL.to_string()),
                request_timeout: Duration::from_secs(timeout_secs),
            },
            watcher: WatcherConfig {
                poll_interval: Duration::from_secs(poll_secs),
                filter_markets: parse_filter_markets(
                    &lookup("FILTER_MARKETS").unwrap_or_else(|| "KRW,USDT".to_string()),
                ),
                cache_dir: lookup("CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            },
            monitoring: MonitoringConfig {
                health_port,
                log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
            env_file: None,
        })
    }
}

/// Strips surrounding whitespace and quotes, then checks the bot token shape.
pub fn validate_token(raw: &str) -> Result<String, ConfigError> {
    let token = raw.trim().trim_matches('"').trim_matches('\'');

    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }

    if !TOKEN_RE.is_match(token) {
        let edges = match (token.chars().next(), token.chars().last()) {
            (Some(first), Some(last)) => vec![first as u32, last as u32],
            _ => Vec::new(),
        };
        return Err(ConfigError::MalformedToken {
            length: token.chars().count(),
            edges,
        });
    }

    Ok(token.to_string())
}

pub fn parse_filter_markets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("{}-", p.to_uppercase()))
        .collect()
}

fn parse_positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { key, value }),
        },
    }
}
