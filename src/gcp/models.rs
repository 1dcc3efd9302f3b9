//! Wire types for the Cloud Vision REST API
//!
//! Only the fields the gateway reads or sends are modelled; everything else
//! in vendor payloads is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Detection feature requested from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    TextDetection,
    DocumentTextDetection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
}

impl Feature {
    pub fn new(feature_type: FeatureType) -> Self {
        Self { feature_type }
    }
}

/// Inline image payload, base64 encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateImageRequest {
    pub image: Image,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnnotateImagesRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchAnnotateImagesResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

/// google.rpc.Status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextAnnotation {
    #[serde(default)]
    pub text: String,
}

/// Where a page result came from inside a file annotation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotationContext {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub page_number: i32,
}

/// Result for one image, or one page of a file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_annotation: Option<TextAnnotation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ImageAnnotationContext>,
}

impl AnnotateImageResponse {
    /// Recognized text, empty when nothing was detected
    pub fn text(&self) -> &str {
        self.full_text_annotation
            .as_ref()
            .map(|a| a.text.as_str())
            .unwrap_or("")
    }

    /// Vendor-reported error message, if non-empty
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|s| s.message.as_str())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsSource {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsDestination {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    pub gcs_source: GcsSource,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub gcs_destination: GcsDestination,
    pub batch_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncAnnotateFileRequest {
    pub input_config: InputConfig,
    pub features: Vec<Feature>,
    pub output_config: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncBatchAnnotateFilesRequest {
    pub requests: Vec<AsyncAnnotateFileRequest>,
}

/// google.longrunning.Operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Content of one output shard written by a batch job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateFileResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i32>,
}

impl AnnotateFileResponse {
    /// Append the text of every page in this shard to `out`
    pub fn append_text(&self, out: &mut String) {
        for page in &self.responses {
            out.push_str(page.text());
        }
    }
}
