//! In-memory stand-ins for Cloud Storage and Cloud Vision

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use ocr_gateway::error::{Error, Result};
use ocr_gateway::gcp::models::*;
use ocr_gateway::gcp::{ObjectInfo, ObjectStore, VisionApi};
use ocr_gateway::ocr::{OcrService, OcrSettings};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUCKET: &str = "test-bucket";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upload(String),
    List(String),
    Download(String),
    Delete(String),
}

/// Bucket kept in a BTreeMap; records every call
#[derive(Default)]
pub struct FakeStore {
    pub objects: Mutex<BTreeMap<String, Bytes>>,
    pub calls: Mutex<Vec<StoreCall>>,
    /// Deletes of keys ending with any of these fail
    pub failing_deletes: Mutex<HashSet<String>>,
    /// Return listings in reverse name order
    pub reverse_listing: bool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reversed() -> Arc<Self> {
        Arc::new(Self {
            reverse_listing: true,
            ..Default::default()
        })
    }

    pub fn put(&self, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(key.to_string(), body.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_delete_of(&self, suffix: &str) {
        self.failing_deletes.lock().unwrap().insert(suffix.to_string());
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    fn bucket(&self) -> &str {
        BUCKET
    }

    async fn upload(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        self.record(StoreCall::Upload(key.to_string()));
        self.put(key, body);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.record(StoreCall::List(prefix.to_string()));
        let mut listed: Vec<ObjectInfo> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, body)| ObjectInfo {
                name: name.clone(),
                size: Some(body.len() as u64),
            })
            .collect();
        if self.reverse_listing {
            listed.reverse();
        }
        Ok(listed)
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        self.record(StoreCall::Download(key.to_string()));
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Upstream {
                service: "fake storage",
                status: 404,
                body: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(StoreCall::Delete(key.to_string()));
        let failing = self
            .failing_deletes
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()));
        if failing {
            return Err(Error::Upstream {
                service: "fake storage",
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum VisionCall {
    DetectText(Vec<u8>),
    SubmitBatch(AsyncAnnotateFileRequest),
    GetOperation(String),
}

/// Vision fake. A batch job completes after `polls_until_done` status checks,
/// at which point it writes `shards` under the requested output prefix.
pub struct FakeVision {
    store: Arc<FakeStore>,
    pub image_response: AnnotateImageResponse,
    /// (object file name, shard body)
    pub shards: Vec<(String, Bytes)>,
    pub polls_until_done: usize,
    pub operation_error: Option<String>,
    polls: Mutex<usize>,
    destination: Mutex<Option<String>>,
    pub calls: Mutex<Vec<VisionCall>>,
}

impl FakeVision {
    pub fn new(store: Arc<FakeStore>) -> Self {
        Self {
            store,
            image_response: AnnotateImageResponse::default(),
            shards: Vec::new(),
            polls_until_done: 1,
            operation_error: None,
            polls: Mutex::new(0),
            destination: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image_text(mut self, text: &str) -> Self {
        self.image_response = AnnotateImageResponse {
            full_text_annotation: Some(TextAnnotation { text: text.to_string() }),
            ..Default::default()
        };
        self
    }

    pub fn with_image_error(mut self, message: &str) -> Self {
        self.image_response = AnnotateImageResponse {
            error: Some(Status {
                code: 3,
                message: message.to_string(),
            }),
            ..Default::default()
        };
        self
    }

    pub fn with_shard(mut self, file_name: &str, pages: &[&str]) -> Self {
        let shard = AnnotateFileResponse {
            responses: pages
                .iter()
                .map(|text| AnnotateImageResponse {
                    full_text_annotation: Some(TextAnnotation { text: text.to_string() }),
                    ..Default::default()
                })
                .collect(),
            total_pages: None,
        };
        let body = serde_json::to_vec(&shard).unwrap();
        self.shards.push((file_name.to_string(), Bytes::from(body)));
        self
    }

    pub fn with_raw_shard(mut self, file_name: &str, body: &'static [u8]) -> Self {
        self.shards.push((file_name.to_string(), Bytes::from_static(body)));
        self
    }

    pub fn never_finishing(mut self) -> Self {
        self.polls_until_done = usize::MAX;
        self
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.operation_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<VisionCall> {
        self.calls.lock().unwrap().clone()
    }

    fn write_shards(&self) {
        let destination = self.destination.lock().unwrap().clone().unwrap_or_default();
        let prefix = destination
            .strip_prefix(&format!("gs://{}/", BUCKET))
            .unwrap_or(&destination)
            .to_string();

        for (file_name, body) in &self.shards {
            self.store.put(&format!("{}{}", prefix, file_name), body.clone());
        }
    }
}

#[async_trait]
impl VisionApi for FakeVision {
    async fn detect_text(&self, content: &[u8]) -> Result<AnnotateImageResponse> {
        self.calls.lock().unwrap().push(VisionCall::DetectText(content.to_vec()));
        Ok(self.image_response.clone())
    }

    async fn submit_batch(&self, request: AsyncAnnotateFileRequest) -> Result<Operation> {
        *self.destination.lock().unwrap() = Some(request.output_config.gcs_destination.uri.clone());
        self.calls.lock().unwrap().push(VisionCall::SubmitBatch(request));
        Ok(Operation {
            name: "operations/fake-1".to_string(),
            ..Default::default()
        })
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        self.calls.lock().unwrap().push(VisionCall::GetOperation(name.to_string()));

        let done = {
            let mut polls = self.polls.lock().unwrap();
            *polls += 1;
            *polls >= self.polls_until_done
        };

        if !done {
            return Ok(Operation {
                name: name.to_string(),
                ..Default::default()
            });
        }

        if let Some(message) = &self.operation_error {
            return Ok(Operation {
                name: name.to_string(),
                done: true,
                error: Some(Status {
                    code: 13,
                    message: message.clone(),
                }),
                metadata: None,
            });
        }

        self.write_shards();
        Ok(Operation {
            name: name.to_string(),
            done: true,
            ..Default::default()
        })
    }
}

/// Short deadlines so timeout paths run quickly
pub fn settings(upload_dir: &Path) -> OcrSettings {
    OcrSettings {
        upload_dir: upload_dir.to_path_buf(),
        batch_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
        batch_size: 1,
    }
}

pub fn service(store: Arc<FakeStore>, vision: Arc<FakeVision>, upload_dir: &Path) -> OcrService {
    OcrService::new(store, vision, settings(upload_dir))
}
