//! Cloud Storage access
//!
//! `ObjectStore` is the seam the OCR pipeline talks to; `GcsClient` implements
//! it against the Cloud Storage JSON API.

use super::auth::TokenProvider;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "Cloud Storage";

/// An object as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
}

/// Minimal bucket operations used by the document path
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket every key is relative to
    fn bucket(&self) -> &str;

    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// All objects whose name starts with `prefix`, across every listing page
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    async fn download(&self, key: &str) -> Result<Bytes>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// `gs://` URI for a key in this bucket
    fn uri(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket(), key)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedObject>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    // The JSON API encodes uint64 as a string
    #[serde(default)]
    size: Option<String>,
}

/// Cloud Storage JSON API client
pub struct GcsClient {
    http: Client,
    endpoint: Url,
    bucket: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GcsClient {
    pub fn new(
        http: Client,
        endpoint: &str,
        bucket: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid storage endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            http,
            endpoint,
            bucket: bucket.into(),
            tokens,
        })
    }

    /// Build `<endpoint>/<prefix...>/b/<bucket>/o[/<object>]` with each segment escaped
    fn object_url(&self, api_prefix: &[&str], object: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("storage endpoint cannot be a base URL".into()))?;
            segments.pop_if_empty();
            segments.extend(api_prefix);
            segments.push("b").push(&self.bucket).push("o");
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token.expose_secret()))
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let url = self.object_url(&["upload", "storage", "v1"], None)?;
        debug!(bucket = %self.bucket, key, bytes = body.len(), "Uploading object");

        let request = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);

        let response = self.authorized(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(SERVICE, response).await);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let url = self.object_url(&["storage", "v1"], None)?;
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone()).query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.authorized(request).await?.send().await?;
            if !response.status().is_success() {
                return Err(Error::from_response(SERVICE, response).await);
            }

            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| Error::Decode(format!("object listing: {}", e)))?;

            objects.extend(page.items.into_iter().map(|item| ObjectInfo {
                name: item.name,
                size: item.size.and_then(|s| s.parse().ok()),
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        let url = self.object_url(&["storage", "v1"], Some(key))?;
        let request = self.http.get(url).query(&[("alt", "media")]);

        let response = self.authorized(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(SERVICE, response).await);
        }
        Ok(response.bytes().await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = self.object_url(&["storage", "v1"], Some(key))?;
        debug!(bucket = %self.bucket, key, "Deleting object");

        let response = self.authorized(self.http.delete(url)).await?.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(SERVICE, response).await);
        }
        Ok(())
    }
}
