use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_URL;
use crate::domain::AuthToken;
use crate::error::GdcError;
use crate::query::DEFAULT_PAGE_SIZE;
use crate::retry::{Backoff, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "kira-gdc.json";
pub const TOKEN_ENV: &str = "GDC_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// `0` disables the request timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryConfig {
    /// `0` retries without limit.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub backoff: Option<Backoff>,
    #[serde(default)]
    pub retry_client_errors: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub token: Option<AuthToken>,
    pub timeout: Option<Duration>,
    pub page_size: u32,
    pub retry: RetryPolicy,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `kira-gdc.json` in the current directory when present.
    /// A token from `GDC_TOKEN` takes precedence over the file.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GdcError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| GdcError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| GdcError::ConfigParse(err.to_string()))?
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Some(token) = std::env::var(TOKEN_ENV).ok().and_then(AuthToken::new) {
            resolved.token = Some(token);
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GdcError> {
        let token = match (config.token, config.token_file) {
            (Some(token), _) => AuthToken::new(token),
            (None, Some(path)) => {
                let content =
                    fs::read_to_string(&path).map_err(|_| GdcError::ConfigRead(path.clone()))?;
                AuthToken::new(content)
            }
            (None, None) => None,
        };

        let timeout = match config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(ResolvedConfig {
            api_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token,
            timeout,
            page_size: config.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            retry: resolve_retry(config.retry.unwrap_or_default()),
        })
    }
}

fn resolve_retry(config: RetryConfig) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: match config.max_attempts {
            Some(0) => None,
            Some(max) => Some(max),
            None => defaults.max_attempts,
        },
        max_elapsed: config.max_elapsed_secs.map(Duration::from_secs),
        delay: config
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay),
        backoff: config.backoff.unwrap_or(defaults.backoff),
        retry_client_errors: config
            .retry_client_errors
            .unwrap_or(defaults.retry_client_errors),
    }
}
