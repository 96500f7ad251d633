use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::filter::{CapPolicy, DEFAULT_SCAN_CAP, PriceBand};
use crate::notify::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use crate::pipeline::DEFAULT_ITEM_PATH;

pub const DEFAULT_SEARCH_URL: &str = "https://www.facebook.com/marketplace/category/search?query=";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("price band minimum {min} exceeds maximum {max}")]
    PriceBand { min: u64, max: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    WebDriver,
    Http,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webdriver" => Ok(BackendKind::WebDriver),
            "http" => Ok(BackendKind::Http),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub notify_when_empty: bool,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Harvest
    pub search_terms: Vec<String>,
    pub band: PriceBand,
    pub scan_cap: usize,
    pub cap_policy: CapPolicy,
    pub poll_interval: Duration,
    pub store_path: PathBuf,
    pub search_url: String,
    pub item_path: String,

    // Browser
    pub backend: BackendKind,
    pub webdriver_url: String,
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub wait_timeout: Duration,
    pub settle_delay: Duration,

    /// `None` disables notification.
    pub email: Option<EmailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let search_terms = list(get("MARKETWATCH_SEARCH_TERMS").as_deref());
        if search_terms.is_empty() {
            return Err(ConfigError::Missing("MARKETWATCH_SEARCH_TERMS"));
        }

        let band = PriceBand::new(
            parse_opt(&get, "MARKETWATCH_PRICE_MIN")?,
            parse_opt(&get, "MARKETWATCH_PRICE_MAX")?,
        )?;

        let email = match (get("EMAIL_SENDER"), get("EMAIL_PASSWORD")) {
            (Some(sender), Some(password)) => Some(EmailConfig {
                sender,
                password,
                recipients: list(get("EMAIL_RECIPIENTS").as_deref()),
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                smtp_port: parse_or(&get, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                notify_when_empty: parse_or(&get, "NOTIFY_WHEN_EMPTY", false)?,
            }),
            _ => None,
        };

        Ok(Self {
            search_terms,
            band,
            scan_cap: parse_or(&get, "MARKETWATCH_SCAN_CAP", DEFAULT_SCAN_CAP)?,
            cap_policy: parse_or(&get, "MARKETWATCH_CAP_POLICY", CapPolicy::default())?,
            poll_interval: Duration::from_secs(parse_or(
                &get,
                "MARKETWATCH_POLL_INTERVAL_SECS",
                7200,
            )?),
            store_path: get("MARKETWATCH_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("listings.csv")),
            search_url: get("MARKETWATCH_SEARCH_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            item_path: get("MARKETWATCH_ITEM_PATH")
                .unwrap_or_else(|| DEFAULT_ITEM_PATH.to_string()),
            backend: parse_or(&get, "MARKETWATCH_BACKEND", BackendKind::WebDriver)?,
            webdriver_url: get("MARKETWATCH_WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            profile_dir: get("MARKETWATCH_PROFILE_DIR").map(PathBuf::from),
            headless: parse_or(&get, "MARKETWATCH_HEADLESS", false)?,
            wait_timeout: Duration::from_secs(parse_or(&get, "MARKETWATCH_WAIT_TIMEOUT_SECS", 20)?),
            settle_delay: Duration::from_secs(parse_or(&get, "MARKETWATCH_SETTLE_SECS", 5)?),
            email,
        })
    }
}

fn list(raw: Option<&str>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_opt<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}
