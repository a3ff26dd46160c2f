use common::ImageStatus;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entity::image;

use super::ImageError;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// One page of a user's images.
#[derive(Debug)]
pub struct ImagePage {
    pub items: Vec<image::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl ImagePage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page)
    }
}

/// Longest accepted key prefix.
const MAX_PREFIX_LEN: usize = 128;

/// Object keys only use base62 symbols, `/` and `-`, which also keeps the
/// prefix free of `LIKE` wildcards.
fn validate_prefix(prefix: &str) -> Result<&str, ImageError> {
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(ImageError::InvalidPrefix(format!(
            "Prefix must be at most {MAX_PREFIX_LEN} characters"
        )));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '-')
    {
        return Err(ImageError::InvalidPrefix(
            "Prefix may only contain letters, digits, '/' and '-'".into(),
        ));
    }
    Ok(prefix)
}

/// List the user's confirmed images, newest first.
///
/// A page beyond the last one is returned empty.
pub async fn list_images(
    db: &DatabaseConnection,
    user_id: Uuid,
    page: Option<u64>,
    per_page: Option<u64>,
    prefix: Option<&str>,
) -> Result<ImagePage, ImageError> {
    let page = Ord::max(page.unwrap_or(1), 1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let mut select = image::Entity::find()
        .filter(image::Column::UserId.eq(user_id))
        .filter(image::Column::Status.eq(ImageStatus::Confirmed));
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        select = select.filter(image::Column::OssKey.starts_with(validate_prefix(prefix)?));
    }

    let total = select.clone().paginate(db, per_page).num_items().await?;

    let items = match (page - 1).checked_mul(per_page) {
        Some(offset) if offset < total => {
            select
                .order_by_desc(image::Column::CreatedAt)
                .order_by_desc(image::Column::Id)
                .offset(Some(offset))
                .limit(Some(per_page))
                .all(db)
                .await?
        }
        _ => Vec::new(),
    };

    Ok(ImagePage {
        items,
        page,
        per_page,
        total,
    })
}

/// Fetch one of the user's images by id, in any status.
///
/// Another user's image is reported as [`ImageError::NotFound`], same as a
/// missing one.
pub async fn get_image(
    db: &DatabaseConnection,
    user_id: Uuid,
    id: i32,
) -> Result<image::Model, ImageError> {
    image::Entity::find_by_id(id)
        .filter(image::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(ImageError::NotFound)
}
