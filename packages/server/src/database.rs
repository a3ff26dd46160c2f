use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::info;

use crate::entity::image;

/// Name of the unique index backing per-user content deduplication.
pub const IMAGE_USER_HASH_INDEX: &str = "idx_image_user_hash";

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    ensure_schema(&db).await?;

    Ok(db)
}

/// Create the `image` table and its indexes if they do not exist yet.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(image::Entity);
    table.if_not_exists();
    db.execute_raw(backend.build(&table)).await?;

    // The store-level guard against two concurrent uploads of the same content
    // by the same user. Failing to create it is fatal.
    let unique = Index::create()
        .if_not_exists()
        .unique()
        .name(IMAGE_USER_HASH_INDEX)
        .table(image::Entity)
        .col(image::Column::UserId)
        .col(image::Column::Hash)
        .to_owned();
    db.execute_raw(backend.build(&unique)).await?;
    info!("Ensured index {IMAGE_USER_HASH_INDEX} exists");

    // Listing: WHERE user_id = ? AND status = 'confirmed' ORDER BY created_at DESC
    let listing = Index::create()
        .if_not_exists()
        .name("idx_image_user_created")
        .table(image::Entity)
        .col(image::Column::UserId)
        .col(image::Column::CreatedAt)
        .to_owned();
    match db.execute_raw(backend.build(&listing)).await {
        Ok(_) => info!("Ensured index idx_image_user_created exists"),
        Err(e) => tracing::warn!("Failed to create index idx_image_user_created: {}", e),
    }

    Ok(())
}
