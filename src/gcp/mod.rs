//! Google Cloud clients
//!
//! Thin REST clients for the two services the gateway orchestrates:
//! - Cloud Vision: image text detection and asynchronous file annotation
//! - Cloud Storage: upload, prefix listing, download and delete

pub mod auth;
pub mod models;
pub mod storage;
pub mod vision;

pub use auth::{MetadataServerToken, StaticToken, TokenProvider};
pub use storage::{GcsClient, ObjectInfo, ObjectStore};
pub use vision::{VisionApi, VisionClient};

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::Arc;

/// Clients built once at startup and shared by every request
#[derive(Clone)]
pub struct CloudClients {
    pub storage: Arc<dyn ObjectStore>,
    pub vision: Arc<dyn VisionApi>,
}

impl CloudClients {
    /// Construct the real Google clients from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.gcp.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let tokens = auth::from_config(&config.gcp, http.clone());

        let storage = GcsClient::new(
            http.clone(),
            &config.storage.endpoint,
            config.storage.bucket.clone(),
            tokens.clone(),
        )?;

        let vision = VisionClient::new(
            http,
            config.vision.endpoint.clone(),
            config.vision.api_key.clone(),
            tokens,
        );

        Ok(Self {
            storage: Arc::new(storage),
            vision: Arc::new(vision),
        })
    }
}
