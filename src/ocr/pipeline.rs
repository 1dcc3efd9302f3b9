//! Text extraction for uploaded files
//!
//! Images are sent inline to the synchronous text detection endpoint. PDFs go
//! through the bucket: upload, asynchronous batch job, result shard download,
//! then removal of every temporary object.

use super::keys::{sort_by_page, UploadKey};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gcp::models::*;
use crate::gcp::{ObjectInfo, ObjectStore, VisionApi};
use bytes::Bytes;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The only content type routed to the document path
pub const PDF_MIME: &str = "application/pdf";

/// Which recognition path an upload takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Exact match on `application/pdf`; everything else is treated as an image
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(PDF_MIME) => Self::Pdf,
            _ => Self::Image,
        }
    }
}

/// One file received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Tunables for the pipeline
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub upload_dir: PathBuf,
    pub batch_timeout: Duration,
    pub poll_interval: Duration,
    pub batch_size: u32,
}

impl From<&Config> for OcrSettings {
    fn from(config: &Config) -> Self {
        Self {
            upload_dir: config.server.upload_dir.clone(),
            batch_timeout: config.vision.batch_timeout(),
            poll_interval: config.vision.poll_interval(),
            batch_size: config.vision.batch_size,
        }
    }
}

/// Outcome of removing temporary objects
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates the vision and storage clients for one upload at a time
pub struct OcrService {
    storage: Arc<dyn ObjectStore>,
    vision: Arc<dyn VisionApi>,
    settings: OcrSettings,
}

impl OcrService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        vision: Arc<dyn VisionApi>,
        settings: OcrSettings,
    ) -> Self {
        Self {
            storage,
            vision,
            settings,
        }
    }

    pub fn settings(&self) -> &OcrSettings {
        &self.settings
    }

    /// Create the local spool directory
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings.upload_dir).await?;
        Ok(())
    }

    /// Spool the upload to disk, route it by content type and return its text
    pub async fn extract(&self, upload: Upload) -> Result<String> {
        let key = UploadKey::new(&upload.filename);
        let kind = DocumentKind::from_content_type(upload.content_type.as_deref());
        let path = key.local_path(&self.settings.upload_dir);

        info!(
            upload_id = %key.id(),
            filename = %key.file_name(),
            content_type = ?upload.content_type,
            bytes = upload.bytes.len(),
            ?kind,
            "Processing upload"
        );

        tokio::fs::write(&path, &upload.bytes).await?;

        let result = match kind {
            DocumentKind::Pdf => self.recognize_document(&key, &path).await,
            DocumentKind::Image => self.recognize_image(&path).await,
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), "Failed to remove spooled upload: {}", e);
        }

        result
    }

    /// Single synchronous TEXT_DETECTION call
    pub async fn recognize_image(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read(path).await?;
        let response = self.vision.detect_text(&content).await?;

        if let Some(message) = response.error_message() {
            return Err(Error::Vision(message.to_string()));
        }

        Ok(response.text().to_string())
    }

    /// Bucket round trip through an asynchronous batch annotation job
    pub async fn recognize_document(&self, key: &UploadKey, path: &Path) -> Result<String> {
        let source_key = key.object_key();
        let content = tokio::fs::read(path).await?;

        self.storage
            .upload(&source_key, Bytes::from(content), PDF_MIME)
            .await?;
        debug!(key = %source_key, "Uploaded source document");

        match self.run_batch(key).await {
            Ok(()) => {}
            Err(e @ Error::Timeout(_)) => {
                // The job may still be reading the source object
                warn!(key = %source_key, "Batch job timed out, leaving source object in place");
                return Err(e);
            }
            Err(e) => {
                self.cleanup(vec![source_key]).await;
                return Err(e);
            }
        }

        let mut shards = match self.storage.list(&key.output_prefix()).await {
            Ok(shards) => shards,
            Err(e) => {
                self.cleanup(vec![source_key]).await;
                return Err(e);
            }
        };
        sort_by_page(&mut shards);
        info!(key = %source_key, shards = shards.len(), "Batch job finished");

        let text = self.read_shards(&shards).await;

        let mut temporary: Vec<String> = shards.into_iter().map(|o| o.name).collect();
        temporary.push(source_key);
        self.cleanup(temporary).await;

        text
    }

    /// The batch request for an uploaded source object
    pub fn batch_request(&self, key: &UploadKey) -> AsyncAnnotateFileRequest {
        AsyncAnnotateFileRequest {
            input_config: InputConfig {
                gcs_source: GcsSource {
                    uri: self.storage.uri(&key.object_key()),
                },
                mime_type: PDF_MIME.to_string(),
            },
            features: vec![Feature::new(FeatureType::DocumentTextDetection)],
            output_config: OutputConfig {
                gcs_destination: GcsDestination {
                    uri: self.storage.uri(&key.output_prefix()),
                },
                batch_size: self.settings.batch_size,
            },
        }
    }

    /// Submit the job and poll it until done or the deadline passes
    async fn run_batch(&self, key: &UploadKey) -> Result<()> {
        let timeout = self.settings.batch_timeout;
        let deadline = Instant::now() + timeout;

        let mut operation = self.vision.submit_batch(self.batch_request(key)).await?;
        info!(operation = %operation.name, "Submitted batch annotation job");

        loop {
            if operation.done {
                if let Some(status) = operation.error.filter(|s| !s.message.is_empty()) {
                    return Err(Error::Vision(status.message));
                }
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(timeout));
            }

            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;

            operation = tokio::time::timeout_at(deadline, self.vision.get_operation(&operation.name))
                .await
                .map_err(|_| Error::Timeout(timeout))??;
            debug!(operation = %operation.name, done = operation.done, "Polled batch job");
        }
    }

    /// Download shards in order and concatenate every page's text
    async fn read_shards(&self, shards: &[ObjectInfo]) -> Result<String> {
        let mut text = String::new();
        for shard in shards {
            let body = self.storage.download(&shard.name).await?;
            let response: AnnotateFileResponse = serde_json::from_slice(&body)
                .map_err(|e| Error::Decode(format!("{}: {}", shard.name, e)))?;
            response.append_text(&mut text);
        }
        Ok(text)
    }

    /// Delete each key independently; failures are logged, never propagated
    pub async fn cleanup(&self, keys: Vec<String>) -> CleanupReport {
        let results = join_all(keys.iter().map(|key| self.storage.delete(key))).await;

        let mut report = CleanupReport::default();
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(()) => report.deleted.push(key),
                Err(e) => {
                    warn!(key = %key, "Failed to delete temporary object: {}", e);
                    report.failed.push((key, e));
                }
            }
        }

        if !report.is_clean() {
            warn!(
                failed = report.failed.len(),
                deleted = report.deleted.len(),
                "Temporary objects left in bucket {}",
                self.storage.bucket()
            );
        }
        report
    }
}
