use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use tracing::info;
use validator::{Validate, ValidationErrors};

use super::archive::{Archive, ArchiveBuilder};
use super::dto::{ConvertRequest, StatusResponse, UploadRequest, UploadResponse};
use super::keys::{self, DEFAULT_FILENAME};
use super::model::{JobKey, JobStatus};
use super::orchestrator::{ConversionOrchestrator, ConversionOutcome, Destinations};
use super::status::StatusOracle;
use crate::common::error::AppError;
use crate::config::settings::AppConfig;
use crate::infrastructure::storage;
use crate::state::AppState;

const FALLBACK_CONTENT_TYPE: &str = "video/mp4";

pub struct JobService;

impl JobService {
    pub async fn upload(state: AppState, req: UploadRequest) -> Result<UploadResponse, AppError> {
        req.validate().map_err(validation_error)?;

        // Clients commonly wrap base64 at 76 columns
        let encoded: String = req
            .file
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let data = STANDARD
            .decode(&encoded)
            .map_err(|e| AppError::Validation(format!("file is not valid base64: {}", e)))?;

        let filename = keys::sanitize_filename(req.filename.as_deref().unwrap_or(DEFAULT_FILENAME));
        let content_type = mime_guess::from_path(&filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let key = JobKey::generate();
        let object_key = keys::original_key(&key, &filename);
        let bucket = &state.config.upload_bucket;

        state
            .store
            .put(bucket, &object_key, Bytes::from(data), &content_type)
            .await?;
        info!(unique_key = %key, key = %object_key, "Original uploaded");

        Ok(UploadResponse {
            unique_key: key.to_string(),
            location: storage::location(bucket, &object_key),
        })
    }

    pub async fn convert(
        state: AppState,
        req: ConvertRequest,
    ) -> Result<(JobKey, ConversionOutcome), AppError> {
        req.validate().map_err(validation_error)?;
        let key = JobKey::parse(req.unique_key.as_deref().unwrap_or_default())?;
        let destinations = resolve_destinations(&state.config, &req)?;

        let orchestrator = ConversionOrchestrator::new(
            state.store.clone(),
            state.transcoder.clone(),
            state.config.upload_bucket.clone(),
        );
        let outcome = orchestrator.start_conversion(&key, &destinations).await?;
        Ok((key, outcome))
    }

    pub async fn download(state: AppState, unique_key: &str) -> Result<Archive, AppError> {
        let key = JobKey::parse(unique_key)?;
        ArchiveBuilder::new(state.store.clone(), state.config.upload_bucket.clone())
            .build_archive(&key)
            .await
    }

    pub async fn status(state: AppState, unique_key: &str) -> Result<StatusResponse, AppError> {
        let key = JobKey::parse(unique_key)?;
        let status = StatusOracle::new(state.store.clone(), state.config.upload_bucket.clone())
            .check_status(&key)
            .await;

        let error_details = match &status {
            JobStatus::Failed(detail) => Some(detail.to_json()),
            _ => None,
        };
        Ok(StatusResponse {
            unique_key: key.to_string(),
            status: status.state(),
            error_details,
        })
    }
}

/// Request overrides win over configuration. The output bucket is mandatory.
fn resolve_destinations(config: &AppConfig, req: &ConvertRequest) -> Result<Destinations, AppError> {
    let non_empty = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let output_bucket = non_empty(&req.output_bucket)
        .or_else(|| config.output_bucket.clone())
        .ok_or_else(|| AppError::Configuration("Bucket configuration error: no output bucket".to_string()))?;
    // Absent falls back to configuration; an explicit null or blank opts out.
    let backup_bucket = match &req.backup_bucket {
        None => config.backup_bucket.clone(),
        Some(value) => non_empty(value),
    };

    Ok(Destinations {
        output_bucket,
        backup_bucket,
    })
}

fn validation_error(errors: ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string());
    AppError::Validation(message)
}
