//! External identity service.
//!
//! Credential checks and session issuance are delegated entirely to the
//! identity service; the server only forwards credentials and verifies the
//! session tokens it hands back.

mod gotrue;

use async_trait::async_trait;

pub use gotrue::GoTrueIdentity;

/// A session issued by the identity service.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    /// Seconds until `access_token` expires.
    pub expires_in: u64,
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}
