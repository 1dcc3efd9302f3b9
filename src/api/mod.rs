//! HTTP surface of the OCR gateway
//!
//! - GET / - upload form
//! - POST /upload - extract text from an image or PDF
//! - GET /health - liveness

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::AppState;
pub use models::{ErrorResponse, TextResponse};
pub use routes::build_router;
