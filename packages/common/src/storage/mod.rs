mod error;
mod traits;

#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use traits::{ObjectInfo, ObjectStore};

#[cfg(feature = "object-storage")]
pub use s3::{S3ObjectStore, S3Settings};
