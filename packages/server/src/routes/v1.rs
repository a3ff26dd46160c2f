use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/images", image_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::sign_in))
        .routes(routes!(handlers::auth::sign_out))
        .routes(routes!(handlers::auth::me))
        .routes(routes!(handlers::auth::public_config))
}

fn image_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::image::list_images))
        .routes(routes!(handlers::image::initiate_upload))
        .routes(routes!(handlers::image::delete_image))
        .routes(routes!(handlers::image::get_image))
        .routes(routes!(handlers::image::confirm_upload))
}
