//! Feed Tests
//!
//! Covers the follow-graph feed and the content/date filtered feed.

#![cfg(feature = "db-tests")]

mod common;

use axum::http::StatusCode;
use common::{app, unique};
use time::OffsetDateTime;
use uuid::Uuid;

#[tokio::test]
async fn unfiltered_feed_shows_followed_authors_only() {
    let app = app().await;
    let reader = app.create_user("feed_reader").await;
    let followed = app.create_user("feed_followed").await;
    let stranger = app.create_user("feed_stranger").await;
    app.follow(&reader, &followed).await;

    let wanted = app.create_post_for_user(followed.id, "hello world").await;
    let unwanted = app.create_post_for_user(stranger.id, "hello world").await;
    let own = app.create_post_for_user(reader.id, "hello world").await;

    let resp = app.get("/v1/feed", Some(&reader.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let ids = resp.item_ids();
    assert_eq!(ids, vec![wanted.to_string()]);
    assert!(!ids.contains(&unwanted.to_string()));
    assert!(!ids.contains(&own.to_string()));
}

#[tokio::test]
async fn content_filter_excludes_non_matching_followed_posts() {
    let app = app().await;
    let reader = app.create_user("feed_xyz_r").await;
    let author = app.create_user("feed_xyz_a").await;
    app.follow(&reader, &author).await;
    let post_id = app.create_post_for_user(author.id, "hello world").await;

    let resp = app.get("/v1/feed", Some(&reader.access_token)).await;
    assert!(resp.item_ids().contains(&post_id.to_string()));

    let marker = Uuid::new_v4().simple().to_string();
    let resp = app
        .get(
            &format!("/v1/feed?content=xyz{}", marker),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.item_ids().is_empty());
}

#[tokio::test]
async fn content_filter_ignores_follow_graph() {
    let app = app().await;
    let reader = app.create_user("feed_any_r").await;
    let stranger = app.create_user("feed_any_s").await;
    let marker = unique("Needle");
    let content = format!("a post about {} and more", marker);
    let post_id = app.create_post_for_user(stranger.id, &content).await;
    app.create_post_for_user(stranger.id, "unrelated chatter").await;

    let resp = app
        .get(
            &format!("/v1/feed?content={}", marker.to_lowercase()),
            Some(&reader.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.item_ids(), vec![post_id.to_string()]);
}

#[tokio::test]
async fn blank_content_falls_back_to_following() {
    let app = app().await;
    let reader = app.create_user("feed_blank_r").await;
    let stranger = app.create_user("feed_blank_s").await;
    app.create_post_for_user(stranger.id, "not followed").await;

    let resp = app
        .get("/v1/feed?content=%20%20", Some(&reader.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.item_ids().is_empty());
}

#[tokio::test]
async fn date_filter_matches_utc_day() {
    let app = app().await;
    let reader = app.create_user("feed_date_r").await;
    let author = app.create_user("feed_date_a").await;
    let marker = unique("dated");

    let old_id: Uuid = sqlx::query_scalar(
        "INSERT INTO posts (author_id, content, created_at) \
         VALUES ($1, $2, '2023-08-27T23:30:00Z') RETURNING id",
    )
    .bind(author.id)
    .bind(&marker)
    .fetch_one(app.pool())
    .await
    .unwrap();
    let today_id = app.create_post_for_user(author.id, &marker).await;

    let resp = app
        .get(
            &format!("/v1/feed?created_at=2023-08-27&content={}", marker),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.item_ids(), vec![old_id.to_string()]);

    let today = OffsetDateTime::now_utc().date();
    let resp = app
        .get(
            &format!("/v1/feed?created_at={}&content={}", today, marker),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.item_ids(), vec![today_id.to_string()]);
}

#[tokio::test]
async fn invalid_date_is_rejected() {
    let app = app().await;
    let reader = app.create_user("feed_bad_date").await;

    let resp = app
        .get("/v1/feed?created_at=27-08-2023", Some(&reader.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["fields"]["created_at"].is_array());
}

#[tokio::test]
async fn feed_paginates_with_cursor() {
    let app = app().await;
    let reader = app.create_user("feed_page_r").await;
    let author = app.create_user("feed_page_a").await;
    app.follow(&reader, &author).await;

    let mut posts = Vec::new();
    for i in 0..3 {
        posts.push(app.create_post_for_user(author.id, &format!("post {}", i)).await);
    }

    let first = app.get("/v1/feed?limit=2", Some(&reader.access_token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(
        first.item_ids(),
        vec![posts[2].to_string(), posts[1].to_string()]
    );
    let cursor = first.json()["next_cursor"].as_str().unwrap().to_string();

    // Pagination parameters never switch the feed out of following mode
    let second = app
        .get(
            &format!("/v1/feed?limit=2&cursor={}", cursor),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.item_ids(), vec![posts[0].to_string()]);
    assert!(second.json()["next_cursor"].is_null());
}

#[tokio::test]
async fn feed_rejects_bad_pagination() {
    let app = app().await;
    let reader = app.create_user("feed_bad_pag").await;

    for path in ["/v1/feed?limit=0", "/v1/feed?limit=500", "/v1/feed?cursor=garbage"] {
        let resp = app.get(path, Some(&reader.access_token)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{path}");
    }
}
