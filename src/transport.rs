//! HTTP transport shared by every endpoint.

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use std::sync::Arc;

/// Issues authenticated requests against the configured base URL.
///
/// Asks the credential provider for a token on every request and maps every
/// failure onto the crate's error taxonomy. No timeout beyond the HTTP
/// client's own, no retries.
#[derive(Clone)]
pub struct BaseQuery {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl BaseQuery {
    /// # Errors
    /// Returns `Error::ConfigError` if the configured base URL is invalid
    pub fn new(
        client: Client,
        config: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Ok(BaseQuery {
            client,
            base_url: config.parsed_base_url()?,
            credentials,
        })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    ///
    /// # Errors
    /// Returns `Error::ApplicationError` for an empty segment
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(position) = segments.iter().position(|s| s.is_empty()) {
            return Err(Error::ApplicationError(format!(
                "empty path segment at position {} of {:?}",
                position, segments
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::application("invalid base URL", self.base_url.as_str()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request without a body.
    pub async fn send(&self, method: Method, segments: &[&str]) -> Result<Vec<u8>> {
        self.execute(method, segments, None).await
    }

    /// Send a request with a JSON body.
    ///
    /// # Errors
    /// Returns `Error::ApplicationError` if the body cannot be encoded
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<Vec<u8>> {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| Error::application("failed to encode request body", e))?;
        self.execute(method, segments, Some(encoded)).await
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let url = self.url(segments)?;
        let token = self
            .credentials
            .current_token()
            .map_err(|e| Error::application("failed to obtain bearer token", e))?;

        debug!("HTTP {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                Error::application(&format!("failed to build {} {}", method, url), e)
            } else {
                Error::TransportError(format!("{} {}: {}", method, url, e))
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            debug!("✗ HTTP {} {} -> {}", method, url, status);
            return Err(Error::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        debug!("✓ HTTP {} {} -> {} ({} bytes)", method, url, status, bytes.len());
        Ok(bytes.to_vec())
    }
}
