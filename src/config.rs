//! Client configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable holding the API base URL.
pub const BASE_URL_VAR: &str = "POSTS_API_URL";

/// Environment variable overriding the idle-eviction window, in seconds.
pub const KEEP_UNUSED_VAR: &str = "POSTS_API_KEEP_UNUSED_SECS";

/// How long an entry with no subscribers survives before eviction.
pub const DEFAULT_KEEP_UNUSED_FOR: Duration = Duration::from_secs(10);

/// When a mutation invalidates the tags it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationPolicy {
    /// Only after the server accepted the mutation.
    OnSuccess,
    /// Whatever the outcome, forcing dependent reads to re-check.
    Always,
}

/// Configuration for [`crate::PostApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub keep_unused_for: Duration,
    /// Policy for `delete_post`. Other mutations always use `OnSuccess`.
    pub delete_invalidation: InvalidationPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            keep_unused_for: DEFAULT_KEEP_UNUSED_FOR,
            delete_invalidation: InvalidationPolicy::Always,
        }
    }

    /// Build from the environment.
    ///
    /// `POSTS_API_URL` is required. `POSTS_API_KEEP_UNUSED_SECS` falls back to
    /// `DEFAULT_KEEP_UNUSED_FOR` when unset or not a number.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the base URL is missing or invalid
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BASE_URL_VAR)
            .map_err(|_| Error::ConfigError(format!("{} is not set", BASE_URL_VAR)))?;

        let keep_unused_for = std::env::var(KEEP_UNUSED_VAR)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KEEP_UNUSED_FOR);

        let config = ClientConfig {
            keep_unused_for,
            ..ClientConfig::new(base_url)
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL parses as an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        self.parsed_base_url().map(|_| ())
    }

    /// The base URL parsed and checked for an `http`/`https` scheme.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the URL does not parse or uses another
    /// scheme
    pub fn parsed_base_url(&self) -> Result<reqwest::Url> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::ConfigError(format!("invalid base URL {}: {}", self.base_url, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::ConfigError(format!(
                "unsupported base URL scheme: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:4000/");
        assert_eq!(config.keep_unused_for, Duration::from_secs(10));
        assert_eq!(config.delete_invalidation, InvalidationPolicy::Always);
        assert_eq!(
            config.parsed_base_url().map(|u| u.to_string()),
            Ok("http://localhost:4000/".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let err = ClientConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = ClientConfig::new("ftp://example.com").validate().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    // Both env cases live in one test so they do not race on the same variables.
    #[test]
    fn test_from_env() {
        std::env::remove_var(BASE_URL_VAR);
        assert!(matches!(
            ClientConfig::from_env(),
            Err(Error::ConfigError(_))
        ));

        std::env::set_var(BASE_URL_VAR, "http://api.local");
        std::env::set_var(KEEP_UNUSED_VAR, "60");
        let config = ClientConfig::from_env().expect("Failed to load config");
        assert_eq!(config.base_url, "http://api.local");
        assert_eq!(config.keep_unused_for, Duration::from_secs(60));

        std::env::set_var(KEEP_UNUSED_VAR, "soon");
        let config = ClientConfig::from_env().expect("Failed to load config");
        assert_eq!(config.keep_unused_for, DEFAULT_KEEP_UNUSED_FOR);

        std::env::remove_var(BASE_URL_VAR);
        std::env::remove_var(KEEP_UNUSED_VAR);
    }
}
