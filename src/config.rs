// Console configuration - environment driven
//
// Every knob has a default except the operator's staff id, which the session
// cannot be built without. A value that is present but malformed is an error;
// we never silently fall back when the operator clearly meant something.

use crate::session::{Role, Session};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    /// Rows per page for transaction lists
    pub page_size: u32,
    /// Rows per page inside the claim dialog
    pub search_page_size: u32,
    /// Wait between a statement upload and the refetch
    pub refetch_delay: Duration,
    pub journal_path: PathBuf,
    pub log_json: bool,
    pub log_file: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            page_size: 10,
            search_page_size: 5,
            refetch_delay: Duration::from_millis(3000),
            journal_path: PathBuf::from("donation-console.db"),
            log_json: false,
            log_file: PathBuf::from("donation-console.log"),
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConsoleConfig::default();

        let api_url = lookup("DONATION_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            bail!("DONATION_API_URL must be an http(s) URL, got '{api_url}'");
        }

        let timeout_secs: u64 = parse_or(&lookup, "DONATION_API_TIMEOUT_SECS", 120)?;
        let page_size: u32 = parse_or(&lookup, "DONATION_PAGE_SIZE", defaults.page_size)?;
        let search_page_size: u32 =
            parse_or(&lookup, "DONATION_SEARCH_PAGE_SIZE", defaults.search_page_size)?;
        if page_size == 0 || search_page_size == 0 {
            bail!("page sizes must be greater than zero");
        }
        let refetch_delay_ms: u64 = parse_or(&lookup, "DONATION_REFETCH_DELAY_MS", 3000)?;

        Ok(ConsoleConfig {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            page_size,
            search_page_size,
            refetch_delay: Duration::from_millis(refetch_delay_ms),
            journal_path: lookup("DONATION_JOURNAL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.journal_path),
            log_json: env_bool(&lookup, "DONATION_LOG_JSON", false)?,
            log_file: lookup("DONATION_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        })
    }
}

/// Build the operator session from the environment.
pub fn session_from_env() -> Result<Session> {
    session_from_lookup(|name| std::env::var(name).ok())
}

pub fn session_from_lookup<F>(lookup: F) -> Result<Session>
where
    F: Fn(&str) -> Option<String>,
{
    let staff_id = lookup("DONATION_STAFF_ID")
        .ok_or_else(|| anyhow!("DONATION_STAFF_ID is not set"))?
        .trim()
        .parse::<i64>()
        .context("DONATION_STAFF_ID must be an integer")?;

    let role = match lookup("DONATION_ROLE") {
        Some(raw) => raw.parse::<Role>().map_err(|e| anyhow!(e))?,
        None => Role::Staff,
    };

    let mut session = Session::new(staff_id, role);
    if let Some(token) = lookup("DONATION_ACCESS_TOKEN").filter(|t| !t.trim().is_empty()) {
        session = session.with_token(token.trim());
    }
    Ok(session)
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{name}='{raw}' is invalid: {e}")),
        None => Ok(default),
    }
}

fn env_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => bail!("{name}='{v}' is not a boolean"),
    }
}
