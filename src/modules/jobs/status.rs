//! Read-only derivation of a job's state from its marker objects.
//!
//! Precedence when several markers coexist: error > completed > processing >
//! pending > not_found. The orchestrator briefly leaves both `completed` and
//! `processing` in place; `completed` wins, so that window reads as done.

use std::sync::Arc;

use tracing::warn;

use super::keys::{self, Marker};
use super::model::{CompletedMarker, ErrorMarker, FailureDetail, JobKey, JobStatus};
use crate::infrastructure::storage::{BlobStore, StorageError, StorageResult};

#[derive(Clone)]
pub struct StatusOracle {
    store: Arc<dyn BlobStore>,
    bucket: String,
}

impl StatusOracle {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Never fails: a probe error becomes `Failed(Probe(..))`.
    pub async fn check_status(&self, key: &JobKey) -> JobStatus {
        match self.probe(key).await {
            Ok(status) => status,
            Err(e) => {
                warn!(unique_key = %key, error = %e, "Status probe failed");
                JobStatus::Failed(FailureDetail::Probe(e.to_string()))
            }
        }
    }

    async fn probe(&self, key: &JobKey) -> StorageResult<JobStatus> {
        let any = self
            .store
            .list(&self.bucket, &keys::job_prefix(key), Some(1))
            .await?;
        if any.is_empty() {
            return Ok(JobStatus::NotFound);
        }

        if let Some(marker) = self.error_marker(key).await? {
            return Ok(JobStatus::Failed(FailureDetail::Marker(marker)));
        }
        if self.has_marker(key, Marker::Completed).await? {
            return Ok(JobStatus::Completed);
        }
        if self.has_marker(key, Marker::Processing).await? {
            return Ok(JobStatus::Processing);
        }

        Ok(JobStatus::Pending)
    }

    pub(crate) async fn has_marker(&self, key: &JobKey, marker: Marker) -> StorageResult<bool> {
        self.store
            .exists(&self.bucket, &keys::marker_key(key, marker))
            .await
    }

    async fn error_marker(&self, key: &JobKey) -> StorageResult<Option<ErrorMarker>> {
        let marker_key = keys::marker_key(key, Marker::Error);
        if !self.store.exists(&self.bucket, &marker_key).await? {
            return Ok(None);
        }

        let body = match self.store.get(&self.bucket, &marker_key).await {
            Ok(body) => body,
            // Deleted between head and get (a retry cleared it)
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(serde_json::from_slice(&body).unwrap_or_else(|_| ErrorMarker {
            error: String::from_utf8_lossy(&body).to_string(),
            failed_at: None,
        })))
    }

    /// Contents of the completed marker, if present and readable.
    pub async fn completed_marker(&self, key: &JobKey) -> Option<CompletedMarker> {
        let body = self
            .store
            .get(&self.bucket, &keys::marker_key(key, Marker::Completed))
            .await
            .ok()?;
        serde_json::from_slice(&body).ok()
    }
}
