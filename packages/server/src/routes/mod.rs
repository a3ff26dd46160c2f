mod v1;

use utoipa_axum::router::OpenApiRouter;

use crate::state::AppState;

/// Path prefix of the current JSON API.
pub const API_BASE: &str = "/api/v1";

/// Every JSON endpoint, mounted under [`API_BASE`].
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(API_BASE, v1::routes())
}
