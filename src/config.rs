//! Runtime configuration.

use crate::{cache::DEFAULT_KEEP_UNUSED_FOR, guard::RouteGuard};
use std::{num::ParseIntError, time::Duration};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_BASE_URL_VAR: &str = "BUDTENDER_API_BASE_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "BUDTENDER_REQUEST_TIMEOUT_SECS";
pub const CACHE_GRACE_VAR: &str = "BUDTENDER_CACHE_GRACE_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Every endpoint path is appended to this.
    pub api_base_url: Url,
    pub request_timeout: Duration,
    /// How long cached query results outlive their last subscriber.
    pub keep_unused_for: Duration,
    pub routes: RouteGuard,
}

impl Config {
    /// Read the configuration from `BUDTENDER_*` environment variables,
    /// falling back to the defaults for anything that isn't set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup(API_BASE_URL_VAR) {
            config.api_base_url =
                Url::parse(&raw).map_err(|source| ConfigError::BadUrl {
                    value: raw.clone(),
                    source,
                })?;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_VAR) {
            config.request_timeout = seconds(REQUEST_TIMEOUT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(CACHE_GRACE_VAR) {
            config.keep_unused_for = seconds(CACHE_GRACE_VAR, &raw)?;
        }

        log::debug!("Loaded {:?}", config);
        Ok(config)
    }
}

fn seconds(variable: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|source| ConfigError::BadNumber {
            variable,
            value: raw.to_string(),
            source,
        })
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL)
                .expect("The default base URL is always valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keep_unused_for: DEFAULT_KEEP_UNUSED_FOR,
            routes: RouteGuard::default(),
        }
    }
}

/// A configuration value that couldn't be understood.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("\"{}\" is not a valid base URL", value)]
    BadUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{} should be a whole number of seconds, not \"{}\"", variable, value)]
    BadNumber {
        variable: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.api_base_url.as_str(), "http://localhost:3000/api");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.keep_unused_for, Duration::from_secs(60));
        assert_eq!(config.routes, RouteGuard::default());
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            (API_BASE_URL_VAR, "https://budtender.example.com/v1"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (CACHE_GRACE_VAR, " 0 "),
        ])
        .unwrap();

        assert_eq!(
            config.api_base_url.as_str(),
            "https://budtender.example.com/v1"
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.keep_unused_for, Duration::from_secs(0));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = config_from(&[(REQUEST_TIMEOUT_VAR, "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::BadNumber { variable, .. } if variable == REQUEST_TIMEOUT_VAR));

        let err = config_from(&[(API_BASE_URL_VAR, "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::BadUrl { .. }));
    }
}
