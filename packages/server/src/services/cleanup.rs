use common::storage::ObjectStore;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

use crate::entity::image;

use super::ImageError;

/// Delete the user's image with object key `key`.
///
/// The record goes first, scoped to the owner. If nothing matched, storage is
/// left alone and the result is [`ImageError::NotFound`]. If the record is gone
/// but the object delete fails, the result is [`ImageError::PartialCleanup`].
pub async fn delete_image(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: Uuid,
    key: &str,
) -> Result<(), ImageError> {
    let result = image::Entity::delete_many()
        .filter(image::Column::UserId.eq(user_id))
        .filter(image::Column::OssKey.eq(key))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(ImageError::NotFound);
    }

    store
        .delete(key)
        .await
        .map_err(|source| ImageError::PartialCleanup {
            key: key.to_string(),
            source,
        })?;

    info!(key = %key, "Image deleted");
    Ok(())
}
