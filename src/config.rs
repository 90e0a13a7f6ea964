use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::scrapers::DEFAULT_WEBDRIVER_URL;

/// Scan configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub data_dir: PathBuf,
    /// Unset means the built-in catalog
    pub sites_file: Option<PathBuf>,
    pub state_db: PathBuf,
    pub webdriver_url: String,
    pub browser_settle: Duration,
    pub http_timeout: Duration,
    pub report_days: u32,
    pub honor_check_frequency: bool,
    pub word_boundary: bool,
}

impl MonitorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(lookup("TENDER_DATA_DIR").unwrap_or_else(|| "tender_data".to_string()));
        let state_db = lookup("TENDER_STATE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("site_state.db"));

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: lookup("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: lookup("TENDER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            sites_file: lookup("TENDER_SITES_FILE").map(PathBuf::from),
            state_db,
            data_dir,
            webdriver_url: lookup("WEBDRIVER_URL").unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            browser_settle: Duration::from_secs(parse_or(&lookup, "TENDER_BROWSER_SETTLE_SECS", 5)?),
            http_timeout: Duration::from_secs(parse_or(&lookup, "TENDER_HTTP_TIMEOUT_SECS", 30)?),
            report_days: parse_or(&lookup, "TENDER_REPORT_DAYS", 7)?,
            honor_check_frequency: parse_or(&lookup, "TENDER_HONOR_CHECK_FREQUENCY", false)?,
            word_boundary: parse_or(&lookup, "TENDER_WORD_BOUNDARY", false)?,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
