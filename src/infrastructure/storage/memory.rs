use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(String, String), StoredObject>,
    failing_buckets: HashSet<String>,
    unreadable_buckets: HashSet<String>,
    failing_writes: HashSet<(String, String)>,
    failing_deletes: HashSet<(String, String)>,
    failing_reads: HashSet<(String, String)>,
    list_calls: Vec<(String, String)>,
}

/// Process-local blob store.
///
/// Backs `STORAGE_BACKEND=memory` and the test suite. Writes, reads and deletes
/// can be made to fail per bucket or per object, and every `list` call is
/// recorded for later inspection.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the map is still usable.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Every subsequent write to `bucket` fails with `UploadFailed`.
    pub fn fail_writes_to(&self, bucket: &str) {
        self.lock().failing_buckets.insert(bucket.to_string());
    }

    /// Every subsequent read, head or list on `bucket` fails with a backend error.
    pub fn fail_reads_from(&self, bucket: &str) {
        self.lock().unreadable_buckets.insert(bucket.to_string());
    }

    /// Writes to this one object fail; the rest of the bucket stays writable.
    pub fn fail_writes_of(&self, bucket: &str, key: &str) {
        self.lock()
            .failing_writes
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn fail_deletes_of(&self, bucket: &str, key: &str) {
        self.lock()
            .failing_deletes
            .insert((bucket.to_string(), key.to_string()));
    }

    /// `get` and `exists` on this one object fail with a backend error.
    pub fn fail_reads_of(&self, bucket: &str, key: &str) {
        self.lock()
            .failing_reads
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.object(bucket, key).is_some()
    }

    /// All keys in `bucket` starting with `prefix`.
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// `(bucket, prefix)` of every `list` call so far.
    pub fn list_calls(&self) -> Vec<(String, String)> {
        self.lock().list_calls.clone()
    }

    fn check_readable(&self, bucket: &str) -> StorageResult<()> {
        if self.lock().unreadable_buckets.contains(bucket) {
            return Err(StorageError::Backend(format!("{}: bucket unavailable", bucket)));
        }
        Ok(())
    }

    fn check_object_readable(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.check_readable(bucket)?;
        if self
            .lock()
            .failing_reads
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StorageError::Backend(format!("{}/{}: read failed", bucket, key)));
        }
        Ok(())
    }

    fn check_writable(inner: &Inner, bucket: &str, key: &str) -> StorageResult<()> {
        if inner.failing_buckets.contains(bucket)
            || inner
                .failing_writes
                .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StorageError::UploadFailed(format!(
                "{}/{}: bucket rejected the write",
                bucket, key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        Self::check_writable(&inner, bucket, key)?;
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
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
        let mut inner = self.lock();
        Self::check_writable(&inner, bucket, key)?;
        let id = (bucket.to_string(), key.to_string());
        if inner.objects.contains_key(&id) {
            return Ok(false);
        }
        inner.objects.insert(
            id,
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(true)
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        self.check_object_readable(bucket, key)?;
        self.object(bucket, key)
            .map(|o| o.body)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.check_object_readable(bucket, key)?;
        Ok(self.contains(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        let id = (bucket.to_string(), key.to_string());
        if inner.failing_deletes.contains(&id) {
            return Err(StorageError::DeleteFailed(format!("{}/{}: delete rejected", bucket, key)));
        }
        inner.objects.remove(&id);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: Option<usize>) -> StorageResult<Vec<String>> {
        self.lock()
            .list_calls
            .push((bucket.to_string(), prefix.to_string()));
        self.check_readable(bucket)?;

        let keys = self.keys(bucket, prefix);
        Ok(match limit {
            Some(limit) => keys.into_iter().take(limit).collect(),
            None => keys,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }
}
