use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Html,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::api::models::{ErrorResponse, TextResponse};
use crate::error::Error;
use crate::ocr::{OcrService, Upload};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub ocr: Arc<OcrService>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(e: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        Error::BadUpload(_) => StatusCode::BAD_REQUEST,
        Error::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(e.to_string())))
}

/// Upload form
///
/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// Extract text from one uploaded image or PDF
///
/// POST /upload
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<TextResponse> {
    let start = Instant::now();

    let upload = read_upload(&mut multipart).await.map_err(|e| {
        warn!("Rejected upload: {}", e);
        error_response(&e)
    })?;
    let filename = upload.filename.clone();

    match state.ocr.extract(upload).await {
        Ok(text) => {
            info!(
                filename = %filename,
                chars = text.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Extraction succeeded"
            );
            Ok(Json(TextResponse { text }))
        }
        Err(e) => {
            error!(filename = %filename, "Extraction failed: {}", e);
            Err(error_response(&e))
        }
    }
}

fn upload_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::UploadTooLarge(e.body_text())
    } else {
        Error::BadUpload(e.body_text())
    }
}

/// First multipart field that carries a file
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(upload_error)?;

        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(Error::BadUpload("no file field in multipart body".into()))
}
