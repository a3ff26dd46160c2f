use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::ImageStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::entity::image;

pub use super::shared::Pagination;

/// Request body for starting an upload.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct InitiateUploadRequest {
    /// Display name, used as the download filename.
    #[schema(example = "cat.png")]
    pub name: String,
    /// Hex SHA-256 of the file content.
    #[schema(example = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")]
    pub hash: String,
    /// File size in bytes.
    #[schema(example = 1024)]
    pub size: i64,
}

/// A pre-signed upload URL for a new pending image.
#[derive(Serialize, utoipa::ToSchema)]
pub struct InitiateUploadResponse {
    /// Image ID, used to confirm the upload.
    pub id: i32,
    /// `PUT` the file bytes here.
    pub url: String,
    /// Object key.
    #[schema(example = "2024/3/5/1ASdf3k-x9Qz2a")]
    pub key: String,
    /// The URL stops working after this instant.
    pub expires_at: DateTime<Utc>,
    /// Headers that must accompany the `PUT` exactly as given.
    pub headers: BTreeMap<String, String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageResponse {
    pub id: i32,
    pub name: String,
    pub user_id: Uuid,
    pub oss_key: String,
    pub hash: String,
    pub file_size: i64,
    pub status: ImageStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Public URL of the object.
    pub url: String,
    /// Resized preview URL.
    pub preview_url: String,
}

impl ImageResponse {
    pub fn new(model: image::Model, storage: &StorageConfig) -> Self {
        Self {
            url: storage.public_url(&model.oss_key),
            preview_url: storage.preview_url(&model.oss_key),
            id: model.id,
            name: model.name,
            user_id: model.user_id,
            oss_key: model.oss_key,
            hash: model.hash,
            file_size: model.file_size,
            status: model.status,
            created_at: model.created_at,
            confirmed_at: model.confirmed_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageListResponse {
    pub data: Vec<ImageResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageListQuery {
    /// Page number (1-based). Default: 1.
    pub page: Option<u64>,
    /// Items per page (1-100). Default: 20.
    pub per_page: Option<u64>,
    /// Only keys starting with this, e.g. `2024/3/`.
    pub prefix: Option<String>,
}

/// Delete request; accepts `oss_key` or `ossKey`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct DeleteImageRequest {
    #[serde(alias = "ossKey")]
    #[schema(example = "2024/3/5/1ASdf3k-x9Qz2a")]
    pub oss_key: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteImageResponse {
    #[schema(example = true)]
    pub success: bool,
}
