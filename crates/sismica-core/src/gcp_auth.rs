//! OAuth2 access tokens for Google Cloud APIs.
//!
//! On Cloud Run the compute metadata server hands out short-lived tokens for
//! the service account. Outside GCP a token can be supplied directly through
//! `GOOGLE_ACCESS_TOKEN` (e.g. `gcloud auth print-access-token`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::defaults;
use crate::error::{Error, Result};

/// Source of bearer tokens for Google API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for local runs and tests.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Token provider backed by the compute metadata server.
///
/// Tokens are cached until they are within
/// [`defaults::TOKEN_REFRESH_MARGIN_SECS`] of expiry.
pub struct MetadataTokenProvider {
    client: reqwest::Client,
    url: String,
    cached: RwLock<Option<CachedToken>>,
}

impl MetadataTokenProvider {
    pub fn new() -> Self {
        Self::with_url(defaults::METADATA_TOKEN_URL)
    }

    /// Use a custom token endpoint.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| Error::Config(format!("Metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Config(format!(
                "Metadata server returned {}: {}",
                status, body
            )));
        }

        let body: MetadataTokenResponse = response.json().await.map_err(|e| {
            Error::Serialization(format!("Failed to parse metadata token: {}", e))
        })?;

        debug!(
            subsystem = "auth",
            component = "metadata",
            expires_in = body.expires_in,
            "Fetched access token"
        );

        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }

    fn is_fresh(token: &CachedToken) -> bool {
        token.expires_at - Utc::now()
            > chrono::Duration::seconds(defaults::TOKEN_REFRESH_MARGIN_SECS)
    }
}

impl Default for MetadataTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Self::is_fresh(cached) {
                return Ok(cached.token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = guard.as_ref() {
            if Self::is_fresh(cached) {
                return Ok(cached.token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}

/// Static token when one is configured, otherwise the metadata server.
pub fn provider_from_config(endpoints: &EndpointConfig) -> Arc<dyn TokenProvider> {
    match endpoints.access_token.as_deref() {
        Some(token) if !token.is_empty() => Arc::new(StaticTokenProvider::new(token)),
        _ => Arc::new(MetadataTokenProvider::new()),
    }
}
