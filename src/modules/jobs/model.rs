use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::keys::compact_timestamp;
use crate::common::error::AppError;

/// Unique job key: `{YYYYmmddHHMMSS}-{8 hex}`. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn generate() -> Self {
        Self::generate_at(OffsetDateTime::now_utc())
    }

    pub fn generate_at(at: OffsetDateTime) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        JobKey(format!("{}-{}", compact_timestamp(at), &suffix[..8]))
    }

    /// Accepts a caller-supplied key. Anything that could escape the job
    /// prefix is rejected.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::Validation("unique_key is required".to_string()));
        }
        if raw.contains('/') || raw.contains('\\') || raw.contains("..") {
            return Err(AppError::Validation(format!("invalid unique_key: {}", raw)));
        }
        Ok(JobKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotFound,
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMarker {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompletedMarker {
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    pub output_bucket: String,
    pub files_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMarker {
    pub error: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub failed_at: Option<OffsetDateTime>,
}

/// Why a job reads as `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDetail {
    /// Recorded by a failed conversion run.
    Marker(ErrorMarker),
    /// The status probe itself failed; nothing is recorded in the store.
    Probe(String),
}

impl FailureDetail {
    pub fn message(&self) -> &str {
        match self {
            FailureDetail::Marker(marker) => &marker.error,
            FailureDetail::Probe(message) => message,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FailureDetail::Marker(marker) => {
                serde_json::to_value(marker).unwrap_or_else(|_| json!({ "error": marker.error }))
            }
            FailureDetail::Probe(message) => json!({
                "error": message,
                "source": "status_probe",
            }),
        }
    }
}

/// Derived job state, plus the diagnostic when it is `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    NotFound,
    Pending,
    Processing,
    Completed,
    Failed(FailureDetail),
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            JobStatus::NotFound => JobState::NotFound,
            JobStatus::Pending => JobState::Pending,
            JobStatus::Processing => JobState::Processing,
            JobStatus::Completed => JobState::Completed,
            JobStatus::Failed(_) => JobState::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn generated_key_has_timestamp_and_suffix() {
        let key = JobKey::generate_at(datetime!(2024-03-05 07:08:09 UTC));
        let (stamp, suffix) = key.as_str().split_once('-').unwrap();
        assert_eq!(stamp, "20240305070809");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(JobKey::generate(), JobKey::generate());
    }

    #[test]
    fn parse_rejects_path_escapes() {
        assert!(JobKey::parse("20240101000000-abcd1234").is_ok());
        assert!(JobKey::parse("").is_err());
        assert!(JobKey::parse("   ").is_err());
        assert!(JobKey::parse("../other").is_err());
        assert!(JobKey::parse("a/b").is_err());
    }

    #[test]
    fn error_marker_without_timestamp_parses() {
        let marker: ErrorMarker = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(marker.error, "boom");
        assert!(marker.failed_at.is_none());
    }

    #[test]
    fn probe_failure_is_distinguishable() {
        let detail = FailureDetail::Probe("timeout".into());
        assert_eq!(detail.to_json()["source"], "status_probe");
        assert_eq!(JobStatus::Failed(detail).state(), JobState::Error);
    }
}
