use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use super::dto::*;
use super::model::JobState;
use super::orchestrator::ConversionOutcome;
use super::service::JobService;
use crate::common::error::AppError;
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::state::AppState;

/// JSON body parser with the crate's error envelope. An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}

/// Upload a video as base64 inside a JSON body
#[utoipa::path(
    post,
    path = "/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "File uploaded", body = ApiResponse<UploadResponse>),
        (status = 400, description = "Missing or malformed file"),
        (status = 500, description = "Misconfiguration or storage failure")
    ),
    tag = "Jobs"
)]
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("multipart/form-data") {
        return Err(AppError::Validation(
            "Please use base64 encoded file in JSON body".to_string(),
        ));
    }

    let req: UploadRequest = parse_body(&body)?;
    let res = JobService::upload(state, req).await?;
    Ok(ApiSuccess(ApiResponse::success(res, "File uploaded successfully"), StatusCode::OK).into_response())
}

/// Convert an uploaded video to HLS and replicate it
#[utoipa::path(
    post,
    path = "/convert",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Converted, or already completed", body = ApiResponse<ConvertResponse>),
        (status = 202, description = "Conversion already in progress", body = ApiResponse<ConvertResponse>),
        (status = 400, description = "Missing unique_key"),
        (status = 404, description = "Original file not found"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "Jobs"
)]
pub async fn convert(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let req: ConvertRequest = parse_body(&body)?;
    let (key, outcome) = JobService::convert(state, req).await?;
    let unique_key = key.to_string();

    let response = match outcome {
        ConversionOutcome::InProgress => ApiSuccess(
            ApiResponse::success(
                ConvertResponse::bare(unique_key, JobState::Processing),
                "Conversion is already in progress",
            ),
            StatusCode::ACCEPTED,
        ),
        ConversionOutcome::AlreadyCompleted(marker) => {
            let mut res = ConvertResponse::bare(unique_key, JobState::Completed);
            res.files_count = marker.map(|m| m.files_count);
            ApiSuccess(
                ApiResponse::success(res, "Conversion already completed"),
                StatusCode::OK,
            )
        }
        ConversionOutcome::Converted(summary) => ApiSuccess(
            ApiResponse::success(
                ConvertResponse {
                    unique_key,
                    status: JobState::Completed,
                    playlist_url: Some(summary.playlist_url),
                    output_location: Some(summary.output_location),
                    backup_location: summary.backup_location,
                    files_count: Some(summary.files_count),
                },
                "Conversion completed",
            ),
            StatusCode::OK,
        ),
    };

    Ok(response.into_response())
}

/// Download the converted output as a zip archive
#[utoipa::path(
    get,
    path = "/download/{unique_key}",
    params(("unique_key" = String, Path, description = "Job key returned by upload")),
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip", body = Vec<u8>),
        (status = 202, description = "Conversion still in progress"),
        (status = 400, description = "Conversion not started"),
        (status = 404, description = "Unknown key or no converted files"),
        (status = 500, description = "Conversion failed; body carries error_details")
    ),
    tag = "Jobs"
)]
pub async fn download(
    State(state): State<AppState>,
    Path(unique_key): Path<String>,
) -> Result<Response, AppError> {
    let archive = JobService::download(state, &unique_key).await?;
    let disposition = format!("attachment; filename=\"{}\"", archive.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}

/// Current job state, derived from markers
#[utoipa::path(
    get,
    path = "/status/{unique_key}",
    params(("unique_key" = String, Path, description = "Job key returned by upload")),
    responses(
        (status = 200, description = "Job state", body = ApiResponse<StatusResponse>),
        (status = 400, description = "Malformed key")
    ),
    tag = "Jobs"
)]
pub async fn status(
    State(state): State<AppState>,
    Path(unique_key): Path<String>,
) -> Result<Response, AppError> {
    let res = JobService::status(state, &unique_key).await?;
    Ok(ApiSuccess(ApiResponse::success(res, "Status retrieved"), StatusCode::OK).into_response())
}
