//! OCR orchestration on top of the Google clients

pub mod keys;
pub mod pipeline;

pub use keys::{page_index, sanitize_filename, sort_by_page, UploadKey};
pub use pipeline::{CleanupReport, DocumentKind, OcrService, OcrSettings, Upload, PDF_MIME};
