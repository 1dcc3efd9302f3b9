//! OAuth access tokens for Google APIs

use crate::config::GcpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for Google API calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString>;
}

/// A token fixed at startup (e.g. `gcloud auth print-access-token`)
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Token for the default service account, fetched from the GCE metadata server
pub struct MetadataServerToken {
    http: Client,
    endpoint: String,
    cached: RwLock<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.endpoint.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::from_response("metadata server", response).await);
        }

        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;

        debug!(expires_in = body.expires_in, "Fetched access token from metadata server");

        Ok(CachedToken {
            token: SecretString::new(body.access_token),
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
        })
    }
}

fn is_fresh(cached: &CachedToken, now: DateTime<Utc>) -> bool {
    cached.expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS) > now
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<SecretString> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if is_fresh(cached, Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if is_fresh(cached, Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}

/// Pick a token provider from configuration
pub fn from_config(config: &GcpConfig, http: Client) -> Arc<dyn TokenProvider> {
    match &config.access_token {
        Some(token) => {
            info!("Using static access token for Google APIs");
            Arc::new(StaticToken::new(token.clone()))
        }
        None => {
            info!("Using metadata server credentials for Google APIs");
            Arc::new(MetadataServerToken::new(http, config.metadata_endpoint.clone()))
        }
    }
}
