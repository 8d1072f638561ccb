use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{BlobRef, FileUpload};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("upload rejected: {0}")]
    Upload(String),
    #[error("delete rejected: {0}")]
    Delete(String),
}

// 1. BlobStore Contract
/// BlobStore
///
/// The contract for all interactions with file storage. Handlers never talk to the
/// storage backend directly; the gateway holds a `BlobStore` and swaps between the
/// real S3 client (`S3BlobStore`) and the in-memory `MockBlobStore` in tests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup to
    /// provision the MinIO bucket. No-op elsewhere.
    async fn ensure_bucket_exists(&self);

    /// Stores the file under a freshly generated key and returns where it lives.
    async fn upload(&self, file: FileUpload) -> Result<BlobRef, BlobError>;

    /// Removes a previously uploaded blob by its `storage_id`.
    async fn delete(&self, storage_id: &str) -> Result<(), BlobError>;
}

/// object_key
///
/// Builds a unique object key (`uploads/<uuid>.<ext>`) for an uploaded file. Only the
/// sanitized extension of the client-supplied name is kept.
pub fn object_key(file_name: &str) -> String {
    let extension = std::path::Path::new(&sanitize_key(file_name))
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("uploads/{}.{}", Uuid::new_v4(), extension)
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) from a user-provided key
/// segment to prevent path traversal.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 2. The Real Implementation (S3/MinIO)
/// S3BlobStore
///
/// Concrete implementation using the AWS SDK for S3. Works against a Dockerized
/// MinIO locally and any S3-compatible endpoint in production.
///
/// `force_path_style(true)` is required for MinIO compatibility.
#[derive(Clone)]
pub struct S3BlobStore {
    client: s3::Client,
    bucket_name: String,
    // Base URL objects are served from; the object key is appended.
    public_base_url: String,
}

impl S3BlobStore {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
            public_base_url: format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = ?e, "create_bucket skipped");
        }
    }

    async fn upload(&self, file: FileUpload) -> Result<BlobRef, BlobError> {
        let key = object_key(&file.file_name);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(&file.content_type)
            .body(ByteStream::from(file.bytes))
            .send()
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;

        tracing::info!(key = %key, "blob uploaded");

        Ok(BlobRef {
            url: format!("{}/{}", self.public_base_url, key),
            storage_id: key,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(storage_id)
            .send()
            .await
            .map_err(|e| BlobError::Delete(e.to_string()))?;

        tracing::info!(key = %storage_id, "blob deleted");
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests and Storage-less Local Runs)
/// MockBlobStore
///
/// Keeps uploaded blobs in memory. Upload and delete failures can be switched on
/// independently to exercise the gateway's failure ordering.
#[derive(Default)]
pub struct MockBlobStore {
    blobs: RwLock<HashMap<String, FileUpload>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, storage_id: &str) -> bool {
        self.blobs.read().await.contains_key(storage_id)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn ensure_bucket_exists(&self) {}

    async fn upload(&self, file: FileUpload) -> Result<BlobRef, BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Upload(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let key = object_key(&file.file_name);
        let url = format!("http://localhost:9000/mock-bucket/{key}");
        self.blobs.write().await.insert(key.clone(), file);

        Ok(BlobRef {
            url,
            storage_id: key,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Delete(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        match self.blobs.write().await.remove(storage_id) {
            Some(_) => Ok(()),
            None => Err(BlobError::Delete(format!("no such blob: {storage_id}"))),
        }
    }
}

/// StorageState
///
/// The concrete type used to share blob store access across the application state.
pub type StorageState = Arc<dyn BlobStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_keeps_only_a_clean_extension() {
        let key = object_key("../../etc/notes.PDF");
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with(".pdf"));
        assert!(!key.contains(".."));

        assert!(object_key("no-extension").ends_with(".bin"));
        assert!(object_key("weird.p?f").ends_with(".bin"));
    }

    #[test]
    fn sanitize_key_drops_traversal_segments() {
        assert_eq!(sanitize_key("a/../b/./c"), "a/b/c");
        assert_eq!(sanitize_key("//x//"), "x");
    }
}
