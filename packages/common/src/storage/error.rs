use std::fmt;

/// Errors that can occur during object storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The storage client could not be configured.
    Config(String),
    /// A header value could not be encoded for signing.
    InvalidHeader(String),
    /// The storage service rejected a request or could not be reached.
    Request(String),
    /// The storage service answered with an unexpected HTTP status.
    UnexpectedStatus { operation: &'static str, status: u16 },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "storage configuration error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "invalid header value: {msg}"),
            Self::Request(msg) => write!(f, "storage request failed: {msg}"),
            Self::UnexpectedStatus { operation, status } => {
                write!(f, "storage {operation} returned HTTP {status}")
            }
        }
    }
}

impl std::error::Error for StorageError {}
