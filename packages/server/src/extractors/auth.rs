use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user, taken from `Authorization: Bearer <token>` or, for
/// browsers, the session cookie.
///
/// Add this as a handler parameter to require authentication.
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Find the session token in the request, header first.
pub fn session_token(parts: &Parts, cookie_name: &str) -> Result<Option<String>, AppError> {
    if let Some(header) = parts.headers.get("Authorization") {
        let token = header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::TokenInvalid)?;
        return Ok(Some(token.to_string()));
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get(cookie_name).map(|c| c.value().to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = &state.config.auth;
        let token = session_token(parts, &auth.session_cookie)?.ok_or(AppError::TokenMissing)?;

        let claims = jwt::verify(&token, &auth.jwt_secret, &auth.jwt_audience)
            .map_err(|_| AppError::TokenInvalid)?;
        let user_id = claims.user_id().map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
        })
    }
}
