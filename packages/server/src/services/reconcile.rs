use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::ImageStatus;
use common::storage::ObjectStore;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::{error, info};

use crate::entity::image;

use super::ImageError;
use super::upload::mark_confirmed;

/// What happened to a pending record whose upload window has closed.
#[derive(Debug)]
pub enum PendingOutcome {
    /// The object arrived; the record is now confirmed.
    Confirmed(image::Model),
    /// The object never arrived; the record was removed.
    Removed,
}

/// Counters for one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub confirmed: u64,
    pub removed: u64,
    pub failed: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.confirmed == 0 && self.removed == 0 && self.failed == 0
    }
}

/// Settle a pending record by checking whether its object exists.
///
/// Only call this once the record's upload URL has expired, otherwise an
/// in-flight upload could lose its record.
pub async fn reconcile_pending(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    row: image::Model,
    now: DateTime<Utc>,
) -> Result<PendingOutcome, ImageError> {
    match store.head(&row.oss_key).await? {
        Some(info) => Ok(PendingOutcome::Confirmed(
            mark_confirmed(db, row, info.size, now).await?,
        )),
        None => {
            image::Entity::delete_many()
                .filter(image::Column::Id.eq(row.id))
                .filter(image::Column::Status.eq(ImageStatus::Pending))
                .exec(db)
                .await?;
            Ok(PendingOutcome::Removed)
        }
    }
}

/// Settle every pending record created before `older_than`.
pub async fn sweep_pending_uploads(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    older_than: DateTime<Utc>,
) -> Result<SweepReport, DbErr> {
    let stale = image::Entity::find()
        .filter(image::Column::Status.eq(ImageStatus::Pending))
        .filter(image::Column::CreatedAt.lt(older_than))
        .order_by_asc(image::Column::CreatedAt)
        .all(db)
        .await?;

    let mut report = SweepReport::default();
    for row in stale {
        let id = row.id;
        let key = row.oss_key.clone();
        match reconcile_pending(db, store, row, Utc::now()).await {
            Ok(PendingOutcome::Confirmed(_)) => report.confirmed += 1,
            Ok(PendingOutcome::Removed) => report.removed += 1,
            Err(e) => {
                error!(image_id = id, key = %key, error = %e, "Failed to reconcile pending upload");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Settings for [`run_pending_sweeper`].
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Pending records older than this are settled.
    pub max_pending_age: chrono::Duration,
}

/// Run the pending-upload sweep as a background task.
pub async fn run_pending_sweeper(
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    config: SweeperConfig,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        max_pending_age_secs = config.max_pending_age.num_seconds(),
        "Starting pending upload sweeper"
    );

    let mut interval = tokio::time::interval(config.interval);

    loop {
        interval.tick().await;

        let Some(older_than) = Utc::now().checked_sub_signed(config.max_pending_age) else {
            continue;
        };
        match sweep_pending_uploads(&db, store.as_ref(), older_than).await {
            Ok(report) if !report.is_empty() => info!(
                confirmed = report.confirmed,
                removed = report.removed,
                failed = report.failed,
                "Pending upload sweep finished"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Pending upload sweep failed"),
        }
    }
}
