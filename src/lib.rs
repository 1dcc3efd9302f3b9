//! OCR upload gateway
//!
//! Accepts an uploaded image or PDF, runs it through Google Cloud Vision and
//! returns the recognized text as JSON. Images use synchronous text
//! detection; PDFs are staged in Cloud Storage and processed by an
//! asynchronous batch annotation job.

pub mod api;
pub mod config;
pub mod error;
pub mod gcp;
pub mod logging;
pub mod ocr;

pub use config::Config;
pub use error::{Error, Result};

use std::sync::Arc;

/// Wire the service together from already constructed clients
pub async fn build_app(config: &Config, clients: gcp::CloudClients) -> Result<axum::Router> {
    let service = ocr::OcrService::new(
        clients.storage,
        clients.vision,
        ocr::OcrSettings::from(config),
    );
    service.prepare().await?;

    let state = api::AppState {
        ocr: Arc::new(service),
    };
    Ok(api::build_router(state, config.server.max_upload_bytes))
}
