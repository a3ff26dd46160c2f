use common::ImageStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One uploaded (or in-flight) image owned by a user.
///
/// `(user_id, hash)` is unique, enforced by `idx_image_user_hash`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Display name, also used for the download filename.
    pub name: String,

    #[sea_orm(indexed)]
    pub user_id: Uuid,

    #[sea_orm(unique)]
    pub oss_key: String,

    /// Lowercase hex SHA-256 of the file content.
    pub hash: String,

    pub file_size: i64,

    pub status: ImageStatus,

    pub created_at: DateTimeUtc,

    pub confirmed_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
