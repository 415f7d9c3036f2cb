//! Builder for [`PostApiClient`].

use crate::client::PostApiClient;
use crate::config::{ClientConfig, InvalidationPolicy};
use crate::credentials::{CredentialProvider, EnvToken, StaticToken};
use crate::error::{Error, Result};
use crate::observability::{NoOpMetrics, StoreMetrics};
use crate::store::QueryStore;
use crate::transport::BaseQuery;
use std::sync::Arc;
use std::time::Duration;

/// Fluent builder for a posts client.
///
/// Without an explicit credential the token is read from `POSTS_API_TOKEN`
/// on every request.
///
/// # Example
///
/// ```
/// use posts_api_cache::{InvalidationPolicy, PostApiClient};
/// use std::time::Duration;
///
/// let client = PostApiClient::builder("http://localhost:4000")
///     .with_token("ABC")
///     .with_keep_unused_for(Duration::from_secs(30))
///     .with_delete_invalidation(InvalidationPolicy::OnSuccess)
///     .build()
///     .unwrap();
/// assert_eq!(client.config().keep_unused_for, Duration::from_secs(30));
/// ```
pub struct PostApiClientBuilder {
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    http: Option<reqwest::Client>,
    metrics: Option<Box<dyn StoreMetrics>>,
}

impl PostApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        PostApiClientBuilder {
            config,
            credentials: None,
            http: None,
            metrics: None,
        }
    }

    /// Use a fixed bearer token.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_credentials(StaticToken::new(token))
    }

    /// Use a custom credential provider.
    pub fn with_credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    /// Idle window after which an unsubscribed entry is evicted.
    pub fn with_keep_unused_for(mut self, duration: Duration) -> Self {
        self.config.keep_unused_for = duration;
        self
    }

    /// When `delete_post` invalidates its tag.
    pub fn with_delete_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.config.delete_invalidation = policy;
        self
    }

    /// Reuse an existing HTTP client (connection pool, proxies, TLS).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn with_metrics(mut self, metrics: Box<dyn StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and assemble the client with a fresh store.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the base URL is invalid or the HTTP
    /// client cannot be created
    pub fn build(self) -> Result<PostApiClient> {
        self.config.validate()?;

        let http = match self.http {
            Some(client) => client,
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?,
        };

        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(EnvToken::default()));
        let metrics = self.metrics.unwrap_or_else(|| Box::new(NoOpMetrics));

        let store = QueryStore::with_metrics(self.config.keep_unused_for, metrics);
        let transport = BaseQuery::new(http, &self.config, credentials)?;

        info!(
            "✓ Posts client initialized for {} (keep unused for {:?})",
            self.config.base_url, self.config.keep_unused_for
        );

        Ok(PostApiClient::from_parts(transport, store, self.config))
    }
}
