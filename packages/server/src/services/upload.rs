use chrono::{DateTime, Utc};
use common::storage::{ObjectStore, StorageError};
use common::{ContentHash, ImageStatus, KeyGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entity::image;
use crate::models::image::InitiateUploadRequest;
use crate::utils::filename::{content_disposition_value, validate_display_name};

use super::ImageError;
use super::listing::get_image;
use super::reconcile::{PendingOutcome, reconcile_pending};

/// Knobs for upload initiation.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub keys: KeyGenerator,
    /// Lifetime of the pre-signed URL.
    pub ttl_secs: u32,
    pub max_file_size: i64,
    /// A pending record older than this is an abandoned session.
    pub pending_max_age: chrono::Duration,
}

impl UploadPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            keys: KeyGenerator::new(config.storage.key_suffix_len),
            ttl_secs: config.storage.presign_ttl_secs,
            max_file_size: config.upload.max_file_size,
            pending_max_age: config.pending_max_age(),
        }
    }
}

/// A pre-signed upload URL and what the uploader must send with it.
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    /// Must be sent verbatim as the `Content-Disposition` header of the `PUT`.
    pub content_disposition: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful upload initiation.
#[derive(Debug, Clone)]
pub struct IssuedUpload {
    pub id: i32,
    pub key: String,
    pub url: String,
    pub content_disposition: String,
    pub expires_at: DateTime<Utc>,
}

/// Columns of a new pending record.
#[derive(Debug)]
pub struct NewImage<'a> {
    pub name: &'a str,
    pub user_id: Uuid,
    pub key: &'a str,
    pub hash: &'a ContentHash,
    pub size: i64,
}

/// Look up the user's record with this content hash, if any.
pub async fn find_by_hash(
    db: &DatabaseConnection,
    user_id: Uuid,
    hash: &ContentHash,
) -> Result<Option<image::Model>, DbErr> {
    image::Entity::find()
        .filter(image::Column::UserId.eq(user_id))
        .filter(image::Column::Hash.eq(hash.to_hex()))
        .one(db)
        .await
}

/// Sign a `PUT` URL for `key`, valid for `ttl_secs` from `now`, with the
/// download filename pinned to `display_name`.
pub async fn issue_upload_url(
    store: &dyn ObjectStore,
    key: &str,
    display_name: &str,
    ttl_secs: u32,
    now: DateTime<Utc>,
) -> Result<SignedUrl, StorageError> {
    let content_disposition = content_disposition_value(display_name);
    let url = store
        .presign_upload(key, &content_disposition, ttl_secs)
        .await?;

    Ok(SignedUrl {
        url,
        content_disposition,
        expires_at: now + chrono::Duration::seconds(i64::from(ttl_secs)),
    })
}

/// Insert a pending record and return its id.
///
/// A second record with the same `(user_id, hash)` is rejected by the unique
/// index and reported as [`ImageError::DuplicateContent`].
pub async fn record_upload(
    db: &DatabaseConnection,
    new: NewImage<'_>,
    now: DateTime<Utc>,
) -> Result<i32, ImageError> {
    let row = image::ActiveModel {
        name: Set(new.name.to_string()),
        user_id: Set(new.user_id),
        oss_key: Set(new.key.to_string()),
        hash: Set(new.hash.to_hex()),
        file_size: Set(new.size),
        status: Set(ImageStatus::Pending),
        created_at: Set(now),
        confirmed_at: Set(None),
        ..Default::default()
    };

    let model = row.insert(db).await.map_err(|e| match e.sql_err() {
        // The oss_key index only trips on a key collision, which is a store
        // failure rather than a duplicate.
        Some(SqlErr::UniqueConstraintViolation(detail)) if !detail.contains("oss_key") => {
            debug!("Duplicate upload caught by unique index on insert");
            ImageError::DuplicateContent
        }
        _ => ImageError::StoreFailure(e),
    })?;

    Ok(model.id)
}

fn is_abandoned(row: &image::Model, policy: &UploadPolicy, now: DateTime<Utc>) -> bool {
    row.status == ImageStatus::Pending
        && now
            .checked_sub_signed(policy.pending_max_age)
            .is_some_and(|cutoff| row.created_at < cutoff)
}

/// Start an upload: dedup check, key generation, pending record, signed URL.
///
/// No URL is signed for duplicate content. If signing fails the pending
/// record is removed again.
pub async fn initiate_upload(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    policy: &UploadPolicy,
    user_id: Uuid,
    request: &InitiateUploadRequest,
    now: DateTime<Utc>,
) -> Result<IssuedUpload, ImageError> {
    let name = validate_display_name(&request.name)
        .map_err(|e| ImageError::InvalidName(e.message().into()))?;
    let hash = ContentHash::from_hex(&request.hash)
        .map_err(|e| ImageError::InvalidHash(e.to_string()))?;
    if request.size < 1 || request.size > policy.max_file_size {
        return Err(ImageError::InvalidSize(format!(
            "Size must be between 1 and {} bytes",
            policy.max_file_size
        )));
    }

    if let Some(existing) = find_by_hash(db, user_id, &hash).await? {
        if !is_abandoned(&existing, policy, now) {
            return Err(ImageError::DuplicateContent);
        }
        match reconcile_pending(db, store, existing, now).await? {
            PendingOutcome::Confirmed(_) => return Err(ImageError::DuplicateContent),
            PendingOutcome::Removed => debug!("Removed abandoned pending upload"),
        }
    }

    let key = policy.keys.generate(now);
    let id = record_upload(
        db,
        NewImage {
            name,
            user_id,
            key: &key,
            hash: &hash,
            size: request.size,
        },
        now,
    )
    .await?;

    let signed = match issue_upload_url(store, &key, name, policy.ttl_secs, now).await {
        Ok(signed) => signed,
        Err(e) => {
            if let Err(cleanup) = image::Entity::delete_by_id(id).exec(db).await {
                error!(
                    image_id = id,
                    error = %cleanup,
                    "Failed to remove pending record after signing failure"
                );
            }
            return Err(e.into());
        }
    };

    info!(image_id = id, key = %key, "Upload URL issued");

    Ok(IssuedUpload {
        id,
        key,
        url: signed.url,
        content_disposition: signed.content_disposition,
        expires_at: signed.expires_at,
    })
}

/// Promote a record to confirmed, taking the size from storage when known.
pub(crate) async fn mark_confirmed(
    db: &DatabaseConnection,
    row: image::Model,
    stored_size: Option<u64>,
    now: DateTime<Utc>,
) -> Result<image::Model, DbErr> {
    let mut active: image::ActiveModel = row.into();
    active.status = Set(ImageStatus::Confirmed);
    active.confirmed_at = Set(Some(now));
    if let Some(size) = stored_size.and_then(|s| i64::try_from(s).ok()) {
        active.file_size = Set(size);
    }
    active.update(db).await
}

/// Confirm that the object for the user's record `id` has been uploaded.
///
/// Already-confirmed records are returned unchanged.
pub async fn confirm_upload(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: Uuid,
    id: i32,
    now: DateTime<Utc>,
) -> Result<image::Model, ImageError> {
    let row = get_image(db, user_id, id).await?;
    if row.status == ImageStatus::Confirmed {
        return Ok(row);
    }

    let info = store
        .head(&row.oss_key)
        .await?
        .ok_or(ImageError::NotFound)?;

    Ok(mark_confirmed(db, row, info.size, now).await?)
}
