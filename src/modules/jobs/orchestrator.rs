//! Drives a job from pending to completed (or error).
//!
//! One call processes one job to the end on the calling task: stage the
//! original locally, transcode, replicate to every destination in order, then
//! flip the markers. There are no retries; any failure is terminal for the
//! call and is recorded as an error marker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::keys::{self, Marker};
use super::model::{CompletedMarker, ErrorMarker, JobKey, JobStatus, ProcessingMarker};
use super::status::StatusOracle;
use crate::common::error::AppError;
use crate::infrastructure::storage::{self, BlobStore};
use crate::infrastructure::transcoder::Transcoder;

const MARKER_CONTENT_TYPE: &str = "application/json";

/// Where the converted output goes besides the primary copy.
#[derive(Debug, Clone)]
pub struct Destinations {
    pub output_bucket: String,
    pub backup_bucket: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub playlist_url: String,
    pub output_location: String,
    pub backup_location: Option<String>,
    pub files_count: usize,
}

#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    /// Another run holds the processing marker. Nothing was touched.
    InProgress,
    /// The job finished earlier; the completed marker, if readable.
    AlreadyCompleted(Option<CompletedMarker>),
    Converted(ConversionSummary),
}

/// A file in the transcoder's output directory.
struct LocalFile {
    path: PathBuf,
    /// Path relative to the output directory, `/`-separated.
    name: String,
}

pub struct ConversionOrchestrator {
    store: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    oracle: StatusOracle,
    upload_bucket: String,
}

impl ConversionOrchestrator {
    pub fn new(
        store: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        upload_bucket: impl Into<String>,
    ) -> Self {
        let upload_bucket = upload_bucket.into();
        Self {
            oracle: StatusOracle::new(store.clone(), upload_bucket.clone()),
            store,
            transcoder,
            upload_bucket,
        }
    }

    pub async fn start_conversion(
        &self,
        key: &JobKey,
        destinations: &Destinations,
    ) -> Result<ConversionOutcome, AppError> {
        // Advisory only; the conditional create below is what serializes runs.
        match self.oracle.check_status(key).await {
            JobStatus::Processing => {
                info!(unique_key = %key, "Conversion already in progress");
                return Ok(ConversionOutcome::InProgress);
            }
            JobStatus::Completed => {
                info!(unique_key = %key, "Conversion already completed");
                return Ok(ConversionOutcome::AlreadyCompleted(
                    self.oracle.completed_marker(key).await,
                ));
            }
            _ => {}
        }

        let original = self.find_original(key).await?;

        if !self.claim(key).await? {
            info!(unique_key = %key, "Lost the processing claim to a concurrent run");
            return Ok(ConversionOutcome::InProgress);
        }

        // A run that finished between our status check and our claim.
        let finished = match self.oracle.has_marker(key, Marker::Completed).await {
            Ok(finished) => finished,
            Err(e) => {
                let e = AppError::from(e);
                error!(unique_key = %key, error = %e, "Completed marker check failed after claim");
                self.record_failure(key, &e).await;
                return Err(e);
            }
        };
        if finished {
            self.release(key).await;
            return Ok(ConversionOutcome::AlreadyCompleted(
                self.oracle.completed_marker(key).await,
            ));
        }

        match self.run(key, &original, destinations).await {
            Ok(summary) => {
                info!(
                    unique_key = %key,
                    files = summary.files_count,
                    output = %summary.output_location,
                    "Conversion completed"
                );
                Ok(ConversionOutcome::Converted(summary))
            }
            Err(e) => {
                error!(unique_key = %key, error = %e, "Conversion failed");
                self.record_failure(key, &e).await;
                Err(e)
            }
        }
    }

    /// Object key of the uploaded original.
    pub async fn find_original(&self, key: &JobKey) -> Result<String, AppError> {
        self.store
            .list(&self.upload_bucket, &keys::original_prefix(key), Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Original file not found".to_string()))
    }

    /// Creates the processing marker unless one already exists.
    async fn claim(&self, key: &JobKey) -> Result<bool, AppError> {
        let marker = ProcessingMarker {
            started_at: OffsetDateTime::now_utc(),
        };
        let claimed = self
            .store
            .put_if_absent(
                &self.upload_bucket,
                &keys::marker_key(key, Marker::Processing),
                json_body(&marker)?,
                MARKER_CONTENT_TYPE,
            )
            .await?;
        if claimed {
            info!(unique_key = %key, "Processing marker written");
        }
        Ok(claimed)
    }

    async fn release(&self, key: &JobKey) {
        let processing = keys::marker_key(key, Marker::Processing);
        if let Err(e) = self.store.delete(&self.upload_bucket, &processing).await {
            warn!(unique_key = %key, error = %e, "Failed to delete processing marker");
        }
    }

    async fn run(
        &self,
        key: &JobKey,
        original: &str,
        destinations: &Destinations,
    ) -> Result<ConversionSummary, AppError> {
        // Left over from an earlier failed run; it would outrank `processing`.
        let stale_error = keys::marker_key(key, Marker::Error);
        if self.store.exists(&self.upload_bucket, &stale_error).await? {
            self.store.delete(&self.upload_bucket, &stale_error).await?;
            info!(unique_key = %key, "Cleared error marker from previous run");
        }

        let workdir = tempfile::tempdir()?;
        let original_name = keys::original_filename(original);
        let input = workdir.path().join(input_file_name(original_name));
        let size = self
            .store
            .download_to(&self.upload_bucket, original, &input)
            .await?;
        info!(unique_key = %key, original, size_bytes = size, "Original staged");

        let output_dir = workdir.path().join("output");
        tokio::fs::create_dir(&output_dir).await?;

        let hls = self.transcoder.transcode(&input, &output_dir).await?;
        let playlist_name = hls
            .playlist
            .strip_prefix(&output_dir)
            .unwrap_or(hls.playlist.as_path())
            .to_string_lossy()
            .replace('\\', "/");

        let files = local_files(&output_dir)?;
        info!(unique_key = %key, files = files.len(), "Transcode produced output set");

        self.replicate(&files, &self.upload_bucket, &keys::converted_prefix(key))
            .await?;

        let output_prefix = keys::output_prefix(key);
        let uploaded = self
            .replicate(&files, &destinations.output_bucket, &output_prefix)
            .await?;

        let backup_location = match &destinations.backup_bucket {
            Some(bucket) => {
                let prefix = keys::backup_prefix(key, OffsetDateTime::now_utc(), original_name);
                self.replicate(&files, bucket, &prefix).await?;
                Some(storage::location(bucket, &prefix))
            }
            None => None,
        };

        let completed = CompletedMarker {
            completed_at: OffsetDateTime::now_utc(),
            output_bucket: destinations.output_bucket.clone(),
            files_count: uploaded.len(),
        };
        self.store
            .put(
                &self.upload_bucket,
                &keys::marker_key(key, Marker::Completed),
                json_body(&completed)?,
                MARKER_CONTENT_TYPE,
            )
            .await?;
        // Both markers exist until this delete lands; `completed` takes precedence.
        self.release(key).await;

        let playlist_key = format!("{}{}", output_prefix, playlist_name);
        Ok(ConversionSummary {
            playlist_url: self.store.object_url(&destinations.output_bucket, &playlist_key),
            output_location: storage::location(&destinations.output_bucket, &output_prefix),
            backup_location,
            files_count: completed.files_count,
        })
    }

    /// Copies every file to `bucket` under `prefix`, in order. The first
    /// failure aborts the whole replication.
    async fn replicate(
        &self,
        files: &[LocalFile],
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let object_key = format!("{}{}", prefix, file.name);
            self.store
                .upload_from(bucket, &object_key, &file.path, keys::content_type_for(&file.name))
                .await
                .map_err(|source| AppError::Replication {
                    bucket: bucket.to_string(),
                    source,
                })?;
            uploaded.push(object_key);
        }
        info!(bucket, prefix, files = uploaded.len(), "Replicated output set");
        Ok(uploaded)
    }

    /// Error marker first, then best-effort cleanup. Neither may mask `err`.
    async fn record_failure(&self, key: &JobKey, err: &AppError) {
        let marker = ErrorMarker {
            error: err.to_string(),
            failed_at: Some(OffsetDateTime::now_utc()),
        };
        let written = match json_body(&marker) {
            Ok(body) => self
                .store
                .put(
                    &self.upload_bucket,
                    &keys::marker_key(key, Marker::Error),
                    body,
                    MARKER_CONTENT_TYPE,
                )
                .await
                .map_err(AppError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!(unique_key = %key, error = %e, "Failed to write error marker");
        }

        self.release(key).await;
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<Bytes, AppError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Local name for the staged original; keeps the extension so the
/// transcoder can sniff the container.
fn input_file_name(original_name: &str) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("input.{}", ext),
        None => "input".to_string(),
    }
}

fn local_files(dir: &Path) -> Result<Vec<LocalFile>, AppError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(LocalFile {
            path: entry.path().to_path_buf(),
            name,
        });
    }
    Ok(files)
}
