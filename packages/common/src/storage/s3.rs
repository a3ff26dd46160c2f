use async_trait::async_trait;
use http::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::traits::{ObjectInfo, ObjectStore};

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Full endpoint URL, e.g. `https://s3.bitiful.net`.
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Address the bucket as `{endpoint}/{bucket}` instead of `{bucket}.{host}`.
    pub path_style: bool,
}

/// [`ObjectStore`] backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(settings.access_key_id.as_str()),
            Some(settings.secret_access_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("invalid credentials: {e}")))?;

        let bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Config(format!("invalid bucket: {e}")))?;

        let bucket = if settings.path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        tracing::info!(
            bucket = %settings.bucket,
            endpoint = %settings.endpoint,
            path_style = settings.path_style,
            "Object storage client configured"
        );

        Ok(Self { bucket })
    }
}

fn request_error(err: S3Error) -> StorageError {
    StorageError::Request(err.to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_disposition: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError> {
        let value = HeaderValue::from_str(content_disposition)
            .map_err(|e| StorageError::InvalidHeader(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, value);

        self.bucket
            .presign_put(key, expiry_secs, Some(headers), None)
            .await
            .map_err(request_error)
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        match self.bucket.head_object(key).await {
            Ok((_, 404)) => Ok(None),
            Ok((result, status)) if is_success(status) => Ok(Some(ObjectInfo {
                size: result
                    .content_length
                    .and_then(|len| u64::try_from(len).ok()),
            })),
            Ok((_, status)) => Err(StorageError::UnexpectedStatus {
                operation: "head",
                status,
            }),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(request_error(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = match self.bucket.delete_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(()),
            Err(e) => return Err(request_error(e)),
        };

        match response.status_code() {
            status if is_success(status) || status == 404 => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                operation: "delete",
                status,
            }),
        }
    }
}
