use std::sync::Arc;

use chrono::{Duration, Utc};
use common::ImageStatus;
use common::storage::ObjectStore;
use sea_orm::{ActiveModelTrait, Set};
use server::entity::image;
use server::services::reconcile::{
    PendingOutcome, SweepReport, SweeperConfig, reconcile_pending, run_pending_sweeper,
    sweep_pending_uploads,
};

use crate::common::TestApp;

#[tokio::test]
async fn sweep_settles_only_stale_pending_records() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.new_user();
    let now = Utc::now();
    let stale = now - Duration::minutes(30);

    app.insert_image(user_id, "stale/arrived", b"1", ImageStatus::Pending, stale)
        .await;
    app.store.put_object("stale/arrived", 4096);
    app.insert_image(user_id, "stale/abandoned", b"2", ImageStatus::Pending, stale)
        .await;
    app.insert_image(user_id, "fresh/in-flight", b"3", ImageStatus::Pending, now)
        .await;
    app.insert_image(user_id, "old/confirmed", b"4", ImageStatus::Confirmed, stale)
        .await;

    let report = sweep_pending_uploads(&app.db, app.store.as_ref(), now - Duration::minutes(6))
        .await
        .unwrap();

    assert_eq!(
        report,
        SweepReport {
            confirmed: 1,
            removed: 1,
            failed: 0,
        }
    );

    let arrived = app.find_image("stale/arrived").await.unwrap();
    assert_eq!(arrived.status, ImageStatus::Confirmed);
    assert_eq!(arrived.file_size, 4096);
    assert!(arrived.confirmed_at.is_some());

    assert!(app.find_image("stale/abandoned").await.is_none());
    assert_eq!(
        app.find_image("fresh/in-flight").await.unwrap().status,
        ImageStatus::Pending
    );
    assert!(app.find_image("old/confirmed").await.is_some());
}

#[tokio::test]
async fn storage_errors_leave_records_for_the_next_pass() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.new_user();
    let stale = Utc::now() - Duration::hours(1);
    app.insert_image(user_id, "stale/unknown", b"1", ImageStatus::Pending, stale)
        .await;
    app.store.fail_head(true);

    let report = sweep_pending_uploads(&app.db, app.store.as_ref(), Utc::now())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.confirmed + report.removed, 0);
    assert_eq!(
        app.find_image("stale/unknown").await.unwrap().status,
        ImageStatus::Pending
    );

    app.store.fail_head(false);
    let report = sweep_pending_uploads(&app.db, app.store.as_ref(), Utc::now())
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(app.image_count().await, 0);
}

#[tokio::test]
async fn background_sweeper_runs_until_aborted() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.new_user();
    let stale = Utc::now() - Duration::hours(1);
    app.insert_image(user_id, "stale/arrived", b"1", ImageStatus::Pending, stale)
        .await;
    app.store.put_object("stale/arrived", 64);

    let store: Arc<dyn ObjectStore> = app.store.clone();
    let sweeper = tokio::spawn(run_pending_sweeper(
        app.db.clone(),
        store,
        SweeperConfig {
            interval: std::time::Duration::from_millis(10),
            max_pending_age: Duration::minutes(6),
        },
    ));

    let mut status = ImageStatus::Pending;
    for _ in 0..200 {
        status = app.find_image("stale/arrived").await.unwrap().status;
        if status == ImageStatus::Confirmed {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, ImageStatus::Confirmed);

    sweeper.abort();
    let joined = sweeper.await;
    assert!(joined.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn empty_sweep_reports_nothing() {
    let app = TestApp::spawn().await;

    let report = sweep_pending_uploads(&app.db, app.store.as_ref(), Utc::now())
        .await
        .unwrap();

    assert!(report.is_empty());
}

#[tokio::test]
async fn reconcile_confirms_when_object_exists() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.new_user();
    let row = app
        .insert_image(user_id, "k/exists", b"abc", ImageStatus::Pending, Utc::now())
        .await;
    app.store.put_object("k/exists", 3);

    let outcome = reconcile_pending(&app.db, app.store.as_ref(), row, Utc::now())
        .await
        .unwrap();

    match outcome {
        PendingOutcome::Confirmed(model) => {
            assert_eq!(model.status, ImageStatus::Confirmed);
            assert_eq!(model.oss_key, "k/exists");
        }
        PendingOutcome::Removed => panic!("expected the record to be confirmed"),
    }
}

#[tokio::test]
async fn reconcile_never_removes_a_confirmed_record() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.new_user();
    let row = app
        .insert_image(user_id, "k/raced", b"abc", ImageStatus::Pending, Utc::now())
        .await;
    // The client confirms after the sweep loaded the row.
    let mut active: image::ActiveModel = row.clone().into();
    active.status = Set(ImageStatus::Confirmed);
    active.update(&app.db).await.unwrap();

    let outcome = reconcile_pending(&app.db, app.store.as_ref(), row, Utc::now())
        .await
        .unwrap();

    assert!(matches!(outcome, PendingOutcome::Removed));
    assert_eq!(
        app.find_image("k/raced").await.unwrap().status,
        ImageStatus::Confirmed
    );
}
