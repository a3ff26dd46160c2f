use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Sign-in form fields.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignInForm {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_sign_in_form(form: &SignInForm) -> Result<(), AppError> {
    if form.email.trim().is_empty() {
        return Err(AppError::Validation("Email must not be empty".into()));
    }
    if form.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Current user info.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub id: Uuid,
    #[schema(example = "alice@example.com")]
    pub email: Option<String>,
}

/// Identity-service settings that are safe to expose to browsers.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PublicAuthConfig {
    #[schema(example = "https://xyz.supabase.co")]
    pub identity_url: String,
    /// Public (anon) key of the identity service.
    pub identity_public_key: String,
}
