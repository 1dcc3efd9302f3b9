//! Error types for the OCR gateway

use std::time::Duration;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a request can run into.
///
/// The HTTP layer does not distinguish between most of these: they all end up
/// as a 500 carrying the `Display` text. Only `BadUpload` and `UploadTooLarge`
/// are the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Error reported inside an otherwise successful vendor response.
    /// The message is kept verbatim.
    #[error("{0}")]
    Vision(String),

    #[error("batch annotation did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid upload: {0}")]
    BadUpload(String),

    #[error("Upload too large: {0}")]
    UploadTooLarge(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Build an `Upstream` error from a non-success response, draining its body.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Error::Upstream {
            service,
            status,
            body: body.chars().take(500).collect(),
        }
    }
}
