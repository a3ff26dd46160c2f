use axum::{Json, extract::State, response::Redirect};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppForm;
use crate::models::auth::{MeResponse, PublicAuthConfig, SignInForm, validate_sign_in_form};
use crate::state::AppState;

/// Sign in with email and password.
#[utoipa::path(
    post,
    path = "/sign-in",
    tag = "Auth",
    operation_id = "signIn",
    summary = "Sign in",
    description = "Forwards the credentials to the identity service. On success the session token is stored in a cookie and the client is redirected to `/`.",
    request_body(content = SignInForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in; session cookie set, redirect to `/`"),
        (status = 400, description = "Bad credentials (VALIDATION_ERROR, INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 502, description = "Identity service unavailable (IDENTITY_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, form), fields(email = %form.email))]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    AppForm(form): AppForm<SignInForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    validate_sign_in_form(&form)?;

    let session = state
        .identity
        .sign_in(form.email.trim(), &form.password)
        .await?;

    let auth = &state.config.auth;
    let max_age = i64::try_from(session.expires_in).unwrap_or(i64::MAX);
    let cookie = Cookie::build((auth.session_cookie.clone(), session.access_token))
        .max_age(time::Duration::seconds(max_age))
        .path("/")
        .http_only(true)
        .secure(auth.cookie_secure)
        .same_site(SameSite::Lax);

    tracing::info!(user_id = %session.user_id, "Signed in");
    Ok((jar.add(cookie), Redirect::to("/")))
}

/// Sign out and clear the session cookie.
#[utoipa::path(
    get,
    path = "/sign-out",
    tag = "Auth",
    operation_id = "signOut",
    summary = "Sign out",
    description = "Revokes the session with the identity service (best effort), clears the session cookie and redirects to `/signin`.",
    responses(
        (status = 303, description = "Signed out; redirect to `/signin`"),
    ),
)]
#[instrument(skip(state, jar))]
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie_name = state.config.auth.session_cookie.clone();

    if let Some(token) = jar.get(&cookie_name).map(|c| c.value().to_string())
        && let Err(e) = state.identity.sign_out(&token).await
    {
        tracing::warn!(error = %e, "Identity sign-out failed, clearing cookie anyway");
    }

    let jar = jar.remove(Cookie::build(cookie_name).path("/"));
    (jar, Redirect::to("/signin"))
}

/// Return the current authenticated user's info.
#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Current user",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = %auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth_user.user_id,
        email: auth_user.email,
    })
}

/// Identity-service settings for browser clients. Never includes secrets.
#[utoipa::path(
    get,
    path = "/config",
    tag = "Auth",
    operation_id = "publicAuthConfig",
    summary = "Public identity-service settings",
    responses(
        (status = 200, description = "Public settings", body = PublicAuthConfig),
    ),
)]
pub async fn public_config(State(state): State<AppState>) -> Json<PublicAuthConfig> {
    Json(PublicAuthConfig {
        identity_url: state.config.auth.identity_url.clone(),
        identity_public_key: state.config.auth.identity_public_key.clone(),
    })
}
