//! Blob store abstraction.
//!
//! Objects are addressed by `(bucket, key)`. A single store instance serves
//! every bucket the pipeline touches: the upload bucket, the output
//! destination and the optional backup destination.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::InMemoryStore;
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> StorageResult<()>;

    /// Creates the object only if no object exists under `key`.
    ///
    /// Returns `false` when another writer got there first.
    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<bool>;

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Head probe. A missing object is `Ok(false)`, not an error.
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Keys under `prefix` in lexicographic order, at most `limit` of them.
    async fn list(&self, bucket: &str, prefix: &str, limit: Option<usize>) -> StorageResult<Vec<String>>;

    /// Public URL of an object.
    fn object_url(&self, bucket: &str, key: &str) -> String;

    /// Copies an object to a local file, returning the number of bytes written.
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        let body = self.get(bucket, key).await?;
        tokio::fs::write(path, &body).await?;
        Ok(body.len() as u64)
    }

    async fn upload_from(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> StorageResult<()> {
        let body = tokio::fs::read(path).await?;
        self.put(bucket, key, Bytes::from(body), content_type).await
    }
}

/// `s3://bucket/key` form used in API responses.
pub fn location(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}
