//! Cloud Vision client
//!
//! Three calls are needed: synchronous text detection for a single image,
//! submission of an asynchronous file annotation job, and polling of the
//! resulting long-running operation.

use super::auth::TokenProvider;
use super::models::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "Cloud Vision";

/// Operations the OCR pipeline needs from the vision provider
#[async_trait]
pub trait VisionApi: Send + Sync {
    /// Run TEXT_DETECTION on raw image bytes
    async fn detect_text(&self, content: &[u8]) -> Result<AnnotateImageResponse>;

    /// Start an asynchronous file annotation job
    async fn submit_batch(&self, request: AsyncAnnotateFileRequest) -> Result<Operation>;

    /// Fetch the current state of a long-running operation
    async fn get_operation(&self, name: &str) -> Result<Operation>;
}

/// Cloud Vision REST client
pub struct VisionClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    tokens: Arc<dyn TokenProvider>,
}

impl VisionClient {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            tokens,
        }
    }

    /// API key when configured, bearer token otherwise
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.api_key {
            Some(key) => Ok(request.query(&[("key", key.expose_secret().as_str())])),
            None => {
                let token = self.tokens.access_token().await?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorized(request).await?.send().await?;

        if !response.status().is_success() {
            return Err(Error::from_response(SERVICE, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("{} response: {}", SERVICE, e)))
    }
}

#[async_trait]
impl VisionApi for VisionClient {
    async fn detect_text(&self, content: &[u8]) -> Result<AnnotateImageResponse> {
        let url = format!("{}/v1/images:annotate", self.endpoint);
        debug!(bytes = content.len(), "Calling images:annotate");

        let body = BatchAnnotateImagesRequest {
            requests: vec![AnnotateImageRequest {
                image: Image {
                    content: base64::engine::general_purpose::STANDARD.encode(content),
                },
                features: vec![Feature::new(FeatureType::TextDetection)],
            }],
        };

        let response: BatchAnnotateImagesResponse =
            self.send(self.http.post(&url).json(&body)).await?;

        response
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode("images:annotate returned no responses".into()))
    }

    async fn submit_batch(&self, request: AsyncAnnotateFileRequest) -> Result<Operation> {
        let url = format!("{}/v1/files:asyncBatchAnnotate", self.endpoint);
        debug!(
            source = %request.input_config.gcs_source.uri,
            destination = %request.output_config.gcs_destination.uri,
            "Submitting files:asyncBatchAnnotate"
        );

        let body = AsyncBatchAnnotateFilesRequest {
            requests: vec![request],
        };
        self.send(self.http.post(&url).json(&body)).await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/v1/{}", self.endpoint, name.trim_start_matches('/'));
        self.send(self.http.get(&url)).await
    }
}
