use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::config::env::{self, EnvKey};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_FFMPEG: &str = "ffmpeg";
const DEFAULT_SEGMENT_SECONDS: u32 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not configured")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub storage_backend: StorageBackend,
    pub s3: S3Settings,
    /// Bucket holding originals, markers and the primary converted copy.
    pub upload_bucket: String,
    pub output_bucket: Option<String>,
    pub backup_bucket: Option<String>,
    pub ffmpeg_path: String,
    pub hls_segment_seconds: u32,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_lookup(env::lookup)
    }

    /// Builds the configuration from an arbitrary key source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(EnvKey) -> Option<String>,
    {
        let upload_bucket =
            lookup(EnvKey::UploadBucket).ok_or(ConfigError::Missing(EnvKey::UploadBucket.as_str()))?;

        Ok(Self {
            server_port: parsed(&lookup, EnvKey::ServerPort, DEFAULT_PORT)?,
            storage_backend: parsed(&lookup, EnvKey::StorageBackend, StorageBackend::S3)?,
            s3: S3Settings {
                endpoint: lookup(EnvKey::S3Endpoint),
                region: lookup(EnvKey::S3Region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
                access_key: lookup(EnvKey::S3AccessKey),
                secret_key: lookup(EnvKey::S3SecretKey),
            },
            upload_bucket,
            output_bucket: lookup(EnvKey::OutputBucket),
            backup_bucket: lookup(EnvKey::BackupBucket),
            ffmpeg_path: lookup(EnvKey::FfmpegPath).unwrap_or_else(|| DEFAULT_FFMPEG.to_string()),
            hls_segment_seconds: parsed(&lookup, EnvKey::HlsSegmentSeconds, DEFAULT_SEGMENT_SECONDS)?,
            max_upload_bytes: parsed(&lookup, EnvKey::MaxUploadBytes, DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// Configuration for in-process use with the memory backend.
    pub fn in_memory(upload_bucket: &str, output_bucket: Option<&str>) -> Self {
        Self {
            server_port: DEFAULT_PORT,
            storage_backend: StorageBackend::Memory,
            s3: S3Settings {
                endpoint: None,
                region: DEFAULT_REGION.to_string(),
                access_key: None,
                secret_key: None,
            },
            upload_bucket: upload_bucket.to_string(),
            output_bucket: output_bucket.map(str::to_string),
            backup_bucket: None,
            ffmpeg_path: DEFAULT_FFMPEG.to_string(),
            hls_segment_seconds: DEFAULT_SEGMENT_SECONDS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn parsed<F, T>(lookup: &F, key: EnvKey, default: T) -> Result<T, ConfigError>
where
    F: Fn(EnvKey) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.as_str(),
            value: raw,
        }),
        None => Ok(default),
    }
}
