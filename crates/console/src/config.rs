//! Runtime configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use condo_observability::LogFormat;
use thiserror::Error;

use crate::list::{DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE};
use crate::notifications::DEFAULT_POLL_INTERVAL;
use crate::password_reset::DEFAULT_RESET_CODE_TTL_MINS;
use crate::storage::FileStorage;

pub const DEFAULT_API_URL: &str = "http://localhost:3333";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be an http(s) URL, got '{value}'")]
    InvalidUrl { name: &'static str, value: String },

    #[error("no storage path: set CONDO_STORAGE_PATH")]
    NoStoragePath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub storage_path: PathBuf,
    pub poll_interval: Duration,
    pub search_debounce: Duration,
    pub page_size: u32,
    pub reset_code_ttl: chrono::Duration,
    pub log_format: LogFormat,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Malformed numeric values fall back to their defaults with a warning;
    /// an unusable API URL or storage location is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("CONDO_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                name: "CONDO_API_URL",
                value: api_url,
            });
        }

        let storage_path = match lookup("CONDO_STORAGE_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => FileStorage::default_path().ok_or(ConfigError::NoStoragePath)?,
        };

        let poll_secs = parse_or(&lookup, "CONDO_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs());
        let debounce_ms = parse_or(
            &lookup,
            "CONDO_SEARCH_DEBOUNCE_MS",
            DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64,
        );
        let page_size = parse_or(&lookup, "CONDO_PAGE_SIZE", DEFAULT_PAGE_SIZE);
        let ttl_mins = parse_or(&lookup, "CONDO_RESET_CODE_TTL_MINS", DEFAULT_RESET_CODE_TTL_MINS);
        let log_format = parse_or(&lookup, "CONDO_LOG_FORMAT", LogFormat::default());

        Ok(Self {
            api_url,
            storage_path,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            search_debounce: Duration::from_millis(debounce_ms),
            page_size: page_size.max(1),
            reset_code_ttl: chrono::Duration::minutes(ttl_mins.max(1)),
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(variable = name, value = %raw, error = %e, "ignoring malformed setting");
            default
        }
    }
}
