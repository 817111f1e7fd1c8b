use std::io::{Cursor, Write};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use super::keys;
use super::model::{JobKey, JobStatus};
use super::status::StatusOracle;
use crate::common::error::AppError;
use crate::infrastructure::storage::{BlobStore, StorageError};

/// Objects fetched concurrently while assembling an archive.
const FETCH_CONCURRENCY: usize = 8;

/// A finished download bundle.
#[derive(Debug)]
pub struct Archive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub entries: usize,
}

/// Bundles a completed job's converted output into one zip.
pub struct ArchiveBuilder {
    store: Arc<dyn BlobStore>,
    oracle: StatusOracle,
    upload_bucket: String,
}

impl ArchiveBuilder {
    pub fn new(store: Arc<dyn BlobStore>, upload_bucket: impl Into<String>) -> Self {
        let upload_bucket = upload_bucket.into();
        Self {
            oracle: StatusOracle::new(store.clone(), upload_bucket.clone()),
            store,
            upload_bucket,
        }
    }

    pub async fn build_archive(&self, key: &JobKey) -> Result<Archive, AppError> {
        // Output objects are only touched once the job reads as completed.
        match self.oracle.check_status(key).await {
            JobStatus::Completed => {}
            JobStatus::NotFound => return Err(AppError::NotFound("Unique key not found".to_string())),
            JobStatus::Processing => {
                return Err(AppError::InProgress {
                    unique_key: key.to_string(),
                })
            }
            JobStatus::Pending => {
                return Err(AppError::NotStarted {
                    unique_key: key.to_string(),
                })
            }
            JobStatus::Failed(detail) => {
                return Err(AppError::JobFailed {
                    unique_key: key.to_string(),
                    detail,
                })
            }
        }

        let prefix = keys::converted_prefix(key);
        let objects = self.store.list(&self.upload_bucket, &prefix, None).await?;
        if objects.is_empty() {
            warn!(unique_key = %key, "Completed marker present but no converted files");
            return Err(AppError::NotFound("No converted files found".to_string()));
        }

        let store = &self.store;
        let bucket = self.upload_bucket.as_str();
        let prefix = prefix.as_str();
        let fetch: futures_util::future::BoxFuture<'_, Result<Vec<(&str, bytes::Bytes)>, AppError>> =
            Box::pin(stream::iter(objects.iter().map(String::as_str))
                .map(|object_key| async move {
                    let entry_name = object_key.strip_prefix(prefix).unwrap_or(object_key);
                    let data = store.get(bucket, object_key).await.map_err(|e| match e {
                        // Listed a moment ago; the output set changed underneath us
                        StorageError::NotFound(_) => {
                            AppError::NotFound(format!("Converted file vanished: {}", entry_name))
                        }
                        other => AppError::Storage(other),
                    })?;
                    Ok::<_, AppError>((entry_name, data))
                })
                .buffered(FETCH_CONCURRENCY)
                .try_collect());
        let entries = fetch.await?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (entry_name, data) in &entries {
            zip.start_file(*entry_name, options)
                .map_err(|e| AppError::Io(e.into()))?;
            zip.write_all(data)?;
        }

        let bytes = zip.finish().map_err(|e| AppError::Io(e.into()))?.into_inner();
        info!(unique_key = %key, entries = objects.len(), size_bytes = bytes.len(), "Archive built");

        Ok(Archive {
            filename: format!("{}.zip", key),
            bytes,
            entries: objects.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStore;
    use crate::modules::jobs::keys::Marker;
    use bytes::Bytes;
    use std::io::Read;

    const BUCKET: &str = "uploads";

    fn setup() -> (InMemoryStore, ArchiveBuilder, JobKey) {
        let store = InMemoryStore::new();
        let builder = ArchiveBuilder::new(Arc::new(store.clone()), BUCKET);
        (store, builder, JobKey::parse("20240101000000-0000abcd").unwrap())
    }

    async fn put(store: &InMemoryStore, key: &str, body: &'static [u8]) {
        store
            .put(BUCKET, key, Bytes::from_static(body), "application/octet-stream")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completed_job_zips_converted_prefix() {
        let (store, builder, key) = setup();
        let prefix = keys::converted_prefix(&key);
        put(&store, &keys::marker_key(&key, Marker::Completed), b"{}").await;
        put(&store, &format!("{}playlist.m3u8", prefix), b"#EXTM3U").await;
        put(&store, &format!("{}segment_000.ts", prefix), b"segment").await;

        let archive = builder.build_archive(&key).await.unwrap();
        assert_eq!(archive.filename, "20240101000000-0000abcd.zip");
        assert_eq!(archive.entries, 2);

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut playlist = String::new();
        zip.by_name("playlist.m3u8")
            .unwrap()
            .read_to_string(&mut playlist)
            .unwrap();
        assert_eq!(playlist, "#EXTM3U");
        assert!(zip.by_name("segment_000.ts").is_ok());
    }

    #[tokio::test]
    async fn completed_marker_without_files_is_not_found() {
        let (store, builder, key) = setup();
        put(&store, &keys::marker_key(&key, Marker::Completed), b"{}").await;

        let err = builder.build_archive(&key).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "No converted files found"));
    }

    #[tokio::test]
    async fn non_completed_states_map_to_their_errors() {
        let (store, builder, key) = setup();
        assert!(matches!(builder.build_archive(&key).await, Err(AppError::NotFound(_))));

        put(&store, &keys::original_key(&key, "a.mp4"), b"video").await;
        assert!(matches!(builder.build_archive(&key).await, Err(AppError::NotStarted { .. })));

        put(&store, &keys::marker_key(&key, Marker::Processing), b"{}").await;
        assert!(matches!(builder.build_archive(&key).await, Err(AppError::InProgress { .. })));

        put(&store, &keys::marker_key(&key, Marker::Error), br#"{"error":"boom"}"#).await;
        match builder.build_archive(&key).await {
            Err(AppError::JobFailed { detail, .. }) => assert_eq!(detail.message(), "boom"),
            other => panic!("unexpected {:?}", other),
        }

        let converted = keys::converted_prefix(&key);
        assert!(store.list_calls().iter().all(|(_, prefix)| prefix != &converted));
    }
}
