use chrono::{Duration, Utc};
use common::ImageStatus;

use crate::common::{TestApp, routes};

mod list {
    use super::*;

    #[tokio::test]
    async fn returns_own_confirmed_images_newest_first() {
        let app = TestApp::spawn().await;
        let (alice, token) = app.new_user();
        let (bob, _) = app.new_user();
        let t0 = Utc::now() - Duration::hours(3);

        app.insert_image(alice, "a/oldest", b"1", ImageStatus::Confirmed, t0)
            .await;
        app.insert_image(alice, "a/newest", b"2", ImageStatus::Confirmed, t0 + Duration::hours(2))
            .await;
        app.insert_image(alice, "a/middle", b"3", ImageStatus::Confirmed, t0 + Duration::hours(1))
            .await;
        app.insert_image(alice, "a/pending", b"4", ImageStatus::Pending, t0 + Duration::hours(3))
            .await;
        app.insert_image(bob, "b/theirs", b"5", ImageStatus::Confirmed, t0 + Duration::hours(4))
            .await;

        let res = app.get_with_token(routes::IMAGES, &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        let keys: Vec<&str> = res.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["oss_key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, ["a/newest", "a/middle", "a/oldest"]);
        assert_eq!(res.body["pagination"]["total"], 3);
    }

    #[tokio::test]
    async fn items_carry_public_and_preview_urls() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.new_user();
        app.insert_image(user_id, "2024/3/5/abc", b"x", ImageStatus::Confirmed, Utc::now())
            .await;

        let res = app.get_with_token(routes::IMAGES, &token).await;

        let item = &res.body["data"][0];
        assert_eq!(item["url"], "https://pics.storage.test/2024/3/5/abc");
        assert_eq!(
            item["preview_url"],
            "https://pics.storage.test/2024/3/5/abc?w=50&h=50&mode=clip"
        );
    }

    #[tokio::test]
    async fn paginates() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.new_user();
        let t0 = Utc::now() - Duration::hours(1);
        for i in 0..3 {
            app.insert_image(
                user_id,
                &format!("k{i}"),
                format!("content {i}").as_bytes(),
                ImageStatus::Confirmed,
                t0 + Duration::minutes(i),
            )
            .await;
        }

        let first = app
            .get_with_token(&format!("{}?page=1&per_page=2", routes::IMAGES), &token)
            .await;
        assert_eq!(first.body["data"].as_array().unwrap().len(), 2);
        assert_eq!(first.body["data"][0]["oss_key"], "k2");
        assert_eq!(first.body["pagination"]["total_pages"], 2);

        let second = app
            .get_with_token(&format!("{}?page=2&per_page=2", routes::IMAGES), &token)
            .await;
        assert_eq!(second.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(second.body["data"][0]["oss_key"], "k0");
    }

    #[tokio::test]
    async fn out_of_range_paging_is_clamped() {
        let app = TestApp::spawn().await;
        let (_, token) = app.new_user();

        let res = app
            .get_with_token(&format!("{}?page=0&per_page=1000", routes::IMAGES), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["page"], 1);
        assert_eq!(res.body["pagination"]["per_page"], 100);
        assert_eq!(res.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.new_user();
        app.insert_image(user_id, "k0", b"x", ImageStatus::Confirmed, Utc::now())
            .await;

        let res = app
            .get_with_token(
                &format!("{}?page={}&per_page=100", routes::IMAGES, u64::MAX),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 0);
        assert_eq!(res.body["pagination"]["page"], u64::MAX);
        assert_eq!(res.body["pagination"]["total"], 1);

        let res = app
            .get_with_token(&format!("{}?page=2&per_page=1", routes::IMAGES), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn filters_by_key_prefix() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.new_user();
        let now = Utc::now();
        app.insert_image(user_id, "2024/3/5/a", b"1", ImageStatus::Confirmed, now)
            .await;
        app.insert_image(user_id, "2024/3/6/b", b"2", ImageStatus::Confirmed, now)
            .await;
        app.insert_image(user_id, "2024/4/1/c", b"3", ImageStatus::Confirmed, now)
            .await;

        let res = app
            .get_with_token(&format!("{}?prefix=2024/3/", routes::IMAGES), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["pagination"]["total"], 2);
        let mut keys: Vec<&str> = res.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["oss_key"].as_str().unwrap())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["2024/3/5/a", "2024/3/6/b"]);
    }

    #[tokio::test]
    async fn prefix_with_wildcards_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.new_user();

        let res = app
            .get_with_token(&format!("{}?prefix=%25", routes::IMAGES), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::IMAGES).await;

        assert_eq!(res.status, 401);
    }
}

mod detail {
    use super::*;

    #[tokio::test]
    async fn returns_own_image_in_any_status() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.new_user();
        let row = app
            .insert_image(user_id, "2024/3/5/p", b"x", ImageStatus::Pending, Utc::now())
            .await;

        let res = app.get_with_token(&routes::image(row.id), &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["id"], row.id);
        assert_eq!(res.body["status"], "pending");
    }

    #[tokio::test]
    async fn other_users_image_is_indistinguishable_from_missing() {
        let app = TestApp::spawn().await;
        let (owner, _) = app.new_user();
        let (_, intruder) = app.new_user();
        let row = app
            .insert_image(owner, "2024/3/5/private", b"x", ImageStatus::Confirmed, Utc::now())
            .await;

        let theirs = app.get_with_token(&routes::image(row.id), &intruder).await;
        let missing = app.get_with_token(&routes::image(row.id + 100), &intruder).await;

        assert_eq!(theirs.status, 404);
        assert_eq!(missing.status, 404);
        assert_eq!(theirs.body, missing.body);
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::image(1)).await;

        assert_eq!(res.status, 401);
    }
}
