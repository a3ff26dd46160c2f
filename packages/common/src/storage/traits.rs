use async_trait::async_trait;

use super::error::StorageError;

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object size in bytes, when the service reports it.
    pub size: Option<u64>,
}

/// S3-compatible object storage as seen by the upload workflow.
///
/// Clients are created once at startup and shared across requests, so
/// implementations must be safe for concurrent use.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Produce a time-limited URL that allows a single `PUT` of `key`.
    ///
    /// `content_disposition` is part of the signature: the uploader must send
    /// it verbatim, and the stored object serves it back on later reads.
    async fn presign_upload(
        &self,
        key: &str,
        content_disposition: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError>;

    /// Look up an object. Returns `Ok(None)` if it does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError>;

    /// Delete an object. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
