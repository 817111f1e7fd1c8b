//! Application error taxonomy, mapped to HTTP once at the boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::common::response::ApiResponse;
use crate::infrastructure::storage::StorageError;
use crate::infrastructure::transcoder::TranscodeError;
use crate::modules::jobs::model::FailureDetail;

#[derive(Debug, Error)]
pub enum AppError {
    /// A mandatory destination is not configured.
    #[error("{0}")]
    Configuration(String),

    /// A required input field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Job, original input, or output set absent.
    #[error("{0}")]
    NotFound(String),

    /// A conversion is already in flight for this job.
    #[error("Conversion is still in progress")]
    InProgress { unique_key: String },

    /// The job exists but conversion was never started.
    #[error("Conversion not started")]
    NotStarted { unique_key: String },

    /// The job carries an error marker (or its state could not be probed).
    #[error("Conversion failed")]
    JobFailed {
        unique_key: String,
        detail: FailureDetail,
    },

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// A destination write failed; the job is aborted as a whole.
    #[error("Replication to {bucket} failed: {source}")]
    Replication {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::NotStarted { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InProgress { .. } => StatusCode::ACCEPTED,
            AppError::Configuration(_)
            | AppError::JobFailed { .. }
            | AppError::Transcode(_)
            | AppError::Replication { .. }
            | AppError::Storage(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn payload(&self) -> Option<Value> {
        match self {
            AppError::InProgress { unique_key } => Some(json!({
                "unique_key": unique_key,
                "status": "processing",
            })),
            AppError::NotStarted { unique_key } => Some(json!({
                "unique_key": unique_key,
                "status": "pending",
            })),
            AppError::JobFailed { unique_key, detail } => Some(json!({
                "unique_key": unique_key,
                "status": "error",
                "error_details": detail.to_json(),
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let message = self.to_string();
        let body = match self.payload() {
            Some(data) => ApiResponse::error_with(&message, data),
            None => ApiResponse::<Value>::error(&message),
        };
        (status, Json(body)).into_response()
    }
}
