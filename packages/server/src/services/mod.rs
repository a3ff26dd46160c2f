//! Image workflows: upload initiation and confirmation, cleanup, listing and
//! the pending-upload reconciliation sweep.
//!
//! Everything here takes its database connection and object store as
//! arguments so handlers, the background sweeper and tests share one code
//! path.

pub mod cleanup;
pub mod listing;
pub mod reconcile;
pub mod upload;

use common::storage::StorageError;
use sea_orm::DbErr;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid hash: {0}")]
    InvalidHash(String),
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("invalid key prefix: {0}")]
    InvalidPrefix(String),
    /// The user already has a record with this content hash.
    #[error("content already uploaded")]
    DuplicateContent,
    /// Absent, or owned by another user.
    #[error("image not found")]
    NotFound,
    #[error("metadata store failure: {0}")]
    StoreFailure(#[from] DbErr),
    #[error("object storage failure: {0}")]
    StorageFailure(#[from] StorageError),
    /// The record was deleted but the object was not.
    #[error("record deleted but object {key} was not: {source}")]
    PartialCleanup {
        key: String,
        #[source]
        source: StorageError,
    },
}
