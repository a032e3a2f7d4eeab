//! Central module for client configuration settings.
//!
//! This module loads the backend location, request timeouts, retry policy and
//! the path of the durable session file from environment variables.

use anyhow::{Context, Result};
use expanduser::expanduser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_SESSION_FILE: &str = "~/.coursehub/session.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
    pub upload_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub session_file: PathBuf,
}

/// Network settings handed to the request executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("COURSEHUB_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout_seconds = env::var("COURSEHUB_REQUEST_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("COURSEHUB_REQUEST_TIMEOUT_SECONDS must be a valid number")?;

        let upload_timeout_seconds = env::var("COURSEHUB_UPLOAD_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("COURSEHUB_UPLOAD_TIMEOUT_SECONDS must be a valid number")?;

        let retry_attempts = env::var("COURSEHUB_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .context("COURSEHUB_RETRY_ATTEMPTS must be a valid number")?;

        let retry_base_delay_ms = env::var("COURSEHUB_RETRY_BASE_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<u64>()
            .context("COURSEHUB_RETRY_BASE_DELAY_MS must be a valid number")?;

        let session_file = env::var("COURSEHUB_SESSION_FILE")
            .unwrap_or_else(|_| DEFAULT_SESSION_FILE.to_string());
        let session_file = expanduser(&session_file)
            .with_context(|| format!("COURSEHUB_SESSION_FILE is not a valid path: {}", session_file))?;

        Ok(Config {
            api_base_url,
            request_timeout_seconds,
            upload_timeout_seconds,
            retry_attempts,
            retry_base_delay_ms,
            session_file,
        })
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            base_url: self.api_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            upload_timeout: Duration::from_secs(self.upload_timeout_seconds),
            retry_attempts: self.retry_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ExecutorSettings::default();
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.upload_timeout, Duration::from_secs(60));
        assert_eq!(settings.retry_attempts, 3);
    }

    #[test]
    fn test_executor_settings_from_config() {
        let config = Config {
            api_base_url: "https://example.test/api".to_string(),
            request_timeout_seconds: 5,
            upload_timeout_seconds: 90,
            retry_attempts: 2,
            retry_base_delay_ms: 250,
            session_file: PathBuf::from("/tmp/session.json"),
        };
        let settings = config.executor_settings();
        assert_eq!(settings.base_url, "https://example.test/api");
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.upload_timeout, Duration::from_secs(90));
        assert_eq!(settings.retry_base_delay, Duration::from_millis(250));
    }
}
