use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvKey {
    ServerPort,
    StorageBackend,
    S3Endpoint,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    UploadBucket,
    OutputBucket,
    BackupBucket,
    FfmpegPath,
    HlsSegmentSeconds,
    MaxUploadBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::StorageBackend => "STORAGE_BACKEND",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Region => "AWS_REGION",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::UploadBucket => "UPLOAD_BUCKET",
            EnvKey::OutputBucket => "OUTPUT_BUCKET",
            EnvKey::BackupBucket => "BACKUP_BUCKET",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::HlsSegmentSeconds => "HLS_SEGMENT_SECONDS",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
        }
    }
}

/// Reads a variable from the process environment. Empty values count as unset.
pub fn lookup(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}
