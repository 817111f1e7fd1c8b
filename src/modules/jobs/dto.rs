use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use super::model::JobState;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UploadRequest {
    /// Base64-encoded video bytes.
    #[validate(required(message = "file field is required"), length(min = 1, message = "file field is required"))]
    pub file: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub unique_key: String,
    /// `s3://bucket/key` of the stored original.
    pub location: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ConvertRequest {
    #[validate(required(message = "unique_key is required"))]
    pub unique_key: Option<String>,
    /// Overrides the configured output bucket.
    pub output_bucket: Option<String>,
    /// Overrides the configured backup bucket. An explicit `null` or `""`
    /// disables the backup for this request.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub backup_bucket: Option<Option<String>>,
}

/// Tells an absent field (`None`) apart from one sent as `null` (`Some(None)`).
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConvertResponse {
    pub unique_key: String,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_count: Option<usize>,
}

impl ConvertResponse {
    pub fn bare(unique_key: String, status: JobState) -> Self {
        Self {
            unique_key,
            status,
            playlist_url: None,
            output_location: None,
            backup_location: None,
            files_count: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub unique_key: String,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub error_details: Option<Value>,
}
