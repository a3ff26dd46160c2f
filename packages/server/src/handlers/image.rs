use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::CONTENT_DISPOSITION},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{Instrument, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, JsonOrForm};
use crate::models::image::{
    DeleteImageRequest, DeleteImageResponse, ImageListQuery, ImageListResponse, ImageResponse,
    InitiateUploadRequest, InitiateUploadResponse, Pagination,
};
use crate::services::upload::UploadPolicy;
use crate::services::{cleanup, listing, upload};
use crate::state::AppState;

/// Start an upload and get a pre-signed URL.
#[utoipa::path(
    post,
    path = "/uploads",
    tag = "Images",
    operation_id = "initiateUpload",
    summary = "Start an upload",
    description = "Checks the content hash against the caller's images, reserves an object key and returns a pre-signed `PUT` URL valid for five minutes. The returned `headers` must be sent with the `PUT`. Call `POST /images/{id}/confirm` once the upload finishes.",
    request_body = InitiateUploadRequest,
    responses(
        (status = 201, description = "Upload URL issued", body = InitiateUploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Already uploaded (DUPLICATE_CONTENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, name = %payload.name))]
pub async fn initiate_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<InitiateUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let policy = UploadPolicy::from_config(&state.config);
    let issued = upload::initiate_upload(
        &state.db,
        state.object_store.as_ref(),
        &policy,
        auth_user.user_id,
        &payload,
        Utc::now(),
    )
    .await?;

    let headers = BTreeMap::from([(
        CONTENT_DISPOSITION.as_str().to_string(),
        issued.content_disposition,
    )]);

    Ok((
        StatusCode::CREATED,
        Json(InitiateUploadResponse {
            id: issued.id,
            url: issued.url,
            key: issued.key,
            expires_at: issued.expires_at,
            headers,
        }),
    ))
}

/// Confirm that an upload has finished.
#[utoipa::path(
    post,
    path = "/{id}/confirm",
    tag = "Images",
    operation_id = "confirmUpload",
    summary = "Confirm an upload",
    description = "Checks that the object exists in storage and marks the image as confirmed. Confirming twice is harmless.",
    params(("id" = i32, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image confirmed", body = ImageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image or uploaded object not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn confirm_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ImageResponse>, AppError> {
    let model = upload::confirm_upload(
        &state.db,
        state.object_store.as_ref(),
        auth_user.user_id,
        id,
        Utc::now(),
    )
    .await?;

    Ok(Json(ImageResponse::new(model, &state.config.storage)))
}

/// List the caller's images.
#[utoipa::path(
    get,
    path = "/",
    tag = "Images",
    operation_id = "listImages",
    summary = "List images",
    description = "Returns the caller's confirmed images, newest first, optionally filtered by key prefix. Pages past the end are empty.",
    params(ImageListQuery),
    responses(
        (status = 200, description = "List of images", body = ImageListResponse),
        (status = 400, description = "Invalid prefix (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = %auth_user.user_id))]
pub async fn list_images(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ImageListQuery>,
) -> Result<Json<ImageListResponse>, AppError> {
    let page = listing::list_images(
        &state.db,
        auth_user.user_id,
        query.page,
        query.per_page,
        query.prefix.as_deref(),
    )
    .await?;

    let pagination = Pagination {
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        total_pages: page.total_pages(),
    };
    let data = page
        .items
        .into_iter()
        .map(|m| ImageResponse::new(m, &state.config.storage))
        .collect();

    Ok(Json(ImageListResponse { data, pagination }))
}

/// Get one of the caller's images.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Images",
    operation_id = "getImage",
    summary = "Get an image by ID",
    description = "Returns the image in any status. Images of other users are reported as not found.",
    params(("id" = i32, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image details", body = ImageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ImageResponse>, AppError> {
    let model = listing::get_image(&state.db, auth_user.user_id, id).await?;
    Ok(Json(ImageResponse::new(model, &state.config.storage)))
}

/// Delete one of the caller's images.
#[utoipa::path(
    post,
    path = "/delete",
    tag = "Images",
    operation_id = "deleteImage",
    summary = "Delete an image",
    description = "Deletes the image record, then its object. Accepts a JSON or form body with `oss_key` (or `ossKey`).",
    request_body = DeleteImageRequest,
    responses(
        (status = 200, description = "Image deleted", body = DeleteImageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Record deleted but object left behind (PARTIAL_CLEANUP)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, key = %payload.oss_key))]
pub async fn delete_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    JsonOrForm(payload): JsonOrForm<DeleteImageRequest>,
) -> Result<Json<DeleteImageResponse>, AppError> {
    let key = payload.oss_key.trim().to_string();
    if key.is_empty() {
        return Err(AppError::Validation("oss_key must not be empty".into()));
    }

    // Runs to completion even if the client goes away between the two steps.
    let db = state.db.clone();
    let store = state.object_store.clone();
    let user_id = auth_user.user_id;
    tokio::spawn(
        async move { cleanup::delete_image(&db, store.as_ref(), user_id, &key).await }
            .in_current_span(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Delete task failed: {e}")))??;

    Ok(Json(DeleteImageResponse { success: true }))
}
