use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use super::{BlobStore, StorageError, StorageResult};
use crate::config::settings::S3Settings;

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    endpoint: Option<String>,
}

impl S3Store {
    pub async fn new(settings: &S3Settings) -> Self {
        let region = Region::new(settings.region.clone());

        let client = match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "static");
                let mut builder = Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials);
                if let Some(endpoint) = &settings.endpoint {
                    // Path-style addressing for MinIO and other S3-compatible stores
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                if let Some(endpoint) = &settings.endpoint {
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
        };

        info!(endpoint = ?settings.endpoint, region = %settings.region, "S3 client configured");

        Self {
            client,
            endpoint: settings.endpoint.clone(),
        }
    }
}

/// HTTP status of a failed call, when the service answered at all.
fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait]
impl BlobStore for S3Store {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        let size = body.len();
        let start = Instant::now();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, bucket, key, size_bytes = size, "S3 put failed");
                StorageError::UploadFailed(format!("{}/{}: {}", bucket, key, e))
            })?;

        info!(
            bucket,
            key,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 put successful"
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<bool> {
        let result = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            // 412: object exists. 409: a concurrent conditional write is in flight.
            Err(e) if matches!(http_status(&e), Some(412) | Some(409)) => Ok(false),
            Err(e) => Err(StorageError::UploadFailed(format!("{}/{}: {}", bucket, key, e))),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(svc) if svc.is_no_such_key() => StorageError::NotFound(format!("{}/{}", bucket, key)),
                _ => StorageError::DownloadFailed(format!("{}/{}: {}", bucket, key, e)),
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(data.into_bytes())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(svc) if svc.is_not_found() => Ok(false),
                _ => Err(StorageError::Backend(format!("head {}/{}: {}", bucket, key, e))),
            },
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("{}/{}: {}", bucket, key, e)))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: Option<usize>) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(limit) = limit {
                let remaining = limit.saturating_sub(keys.len()).min(1000);
                req = req.max_keys(remaining as i32);
            }
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let page = req
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("list {}/{}: {}", bucket, prefix, e)))?;

            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            let reached_limit = limit.is_some_and(|l| keys.len() >= l);
            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) && !reached_limit => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        }
    }

    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(svc) if svc.is_no_such_key() => StorageError::NotFound(format!("{}/{}", bucket, key)),
                _ => StorageError::DownloadFailed(format!("{}/{}: {}", bucket, key, e)),
            })?;

        let mut reader = output.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        Ok(written)
    }

    async fn upload_from(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}/{}: {}", bucket, key, e)))?;

        Ok(())
    }
}
