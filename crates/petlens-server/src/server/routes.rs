//! HTTP routes and handlers

use crate::state::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use petlens_core::Prediction;
use serde_json::json;
use tracing::{debug, warn, Instrument};

/// Multipart field carrying the uploaded image
pub const UPLOAD_FIELD: &str = "file";

// ============================================================================
// Prediction
// ============================================================================

/// Classify the image uploaded in the `file` part of a multipart form
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, AppError> {
    metrics::counter!("petlens_requests_total").increment(1);

    let classifier = state.classifier.clone().ok_or(AppError::ModelNotLoaded)?;

    let mut multipart = multipart.map_err(|rejection| {
        debug!("Rejected non-multipart upload: {}", rejection);
        AppError::MissingFile
    })?;
    let upload = read_upload(&mut multipart).await?;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id, bytes = upload.len());

    let prediction = classifier.classify(&upload).instrument(span).await?;

    metrics::counter!("petlens_predictions_total", "label" => prediction.prediction.clone())
        .increment(1);
    metrics::histogram!("petlens_inference_latency_us").record(prediction.latency_us as f64);

    Ok(Json(prediction))
}

/// Find the `file` part and read it
///
/// Parts without a filename are plain form values, not uploads.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        match field.file_name() {
            None => continue,
            Some("") => return Err(AppError::EmptyFilename),
            Some(_) => {}
        }

        let bytes = field.bytes().await?;
        return Ok(bytes.to_vec());
    }

    Err(AppError::MissingFile)
}

// ============================================================================
// Health and model description
// ============================================================================

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "model_loaded": state.model_loaded() }))
}

pub async fn model_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.model_info())
}

// ============================================================================
// Metrics
// ============================================================================

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

// ============================================================================
// Error handling
// ============================================================================

/// Errors returned by the prediction endpoint
///
/// Messages are shown verbatim by the upload page.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("모델이 로드되지 않았습니다. 서버 설정을 확인하세요.")]
    ModelNotLoaded,

    #[error("유효한 파일이 전송되지 않았습니다.")]
    MissingFile,

    #[error("선택된 파일이 없습니다.")]
    EmptyFilename,

    #[error("업로드한 파일이 너무 큽니다.")]
    TooLarge,

    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error(transparent)]
    Classification(#[from] petlens_core::Error),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::TooLarge;
        }
        AppError::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::ModelNotLoaded => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingFile | AppError::EmptyFilename => StatusCode::BAD_REQUEST,
            AppError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upload { status, .. } => *status,
            AppError::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::ModelNotLoaded => "model_not_loaded",
            AppError::MissingFile => "missing_file",
            AppError::EmptyFilename => "empty_filename",
            AppError::TooLarge => "too_large",
            AppError::Upload { .. } => "upload",
            AppError::Classification(err) => err.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("petlens_errors_total", "kind" => self.kind()).increment(1);

        if status.is_server_error() {
            warn!("Prediction failed: {}", self);
        } else {
            debug!("Prediction rejected: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
