//! Social Graph Tests
//!
//! Covers follow, unfollow, the follow toggle and follower listings.

#![cfg(feature = "db-tests")]

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Follow / unfollow
// ===========================================================================

#[tokio::test]
async fn follow_user() {
    let app = app().await;
    let user_a = app.create_user("fol_a").await;
    let user_b = app.create_user("fol_b").await;

    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["following"], true);
    assert_eq!(body["message"], "user followed");
}

#[tokio::test]
async fn follow_twice_is_conflict() {
    let app = app().await;
    let user_a = app.create_user("fol_dup_a").await;
    let user_b = app.create_user("fol_dup_b").await;
    let path = format!("/v1/users/{}/follow", user_b.id);

    let resp = app
        .post_json(&path, json!({}), Some(&user_a.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(&path, json!({}), Some(&user_a.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "already following");

    let edges: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followee_id = $2",
    )
    .bind(user_a.id)
    .bind(user_b.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(edges, 1);
}

#[tokio::test]
async fn follow_self_is_rejected() {
    let app = app().await;
    let user = app.create_user("fol_self").await;

    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow", user.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot follow yourself");

    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow/toggle", user.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_unknown_user() {
    let app = app().await;
    let user = app.create_user("fol_ghost").await;

    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unfollow_user() {
    let app = app().await;
    let user_a = app.create_user("unf_a").await;
    let user_b = app.create_user("unf_b").await;
    app.follow(&user_a, &user_b).await;

    let resp = app
        .delete(
            &format!("/v1/users/{}/follow", user_b.id),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // Following again works once the edge is gone
    app.follow(&user_a, &user_b).await;
}

#[tokio::test]
async fn unfollow_when_not_following_is_conflict() {
    let app = app().await;
    let user_a = app.create_user("unf_none_a").await;
    let user_b = app.create_user("unf_none_b").await;

    let resp = app
        .delete(
            &format!("/v1/users/{}/follow", user_b.id),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "not following");
}

#[tokio::test]
async fn unfollow_unknown_user() {
    let app = app().await;
    let user = app.create_user("unf_ghost").await;

    let resp = app
        .delete(
            &format!("/v1/users/{}/follow", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Toggle
// ===========================================================================

#[tokio::test]
async fn toggle_follow_alternates() {
    let app = app().await;
    let user_a = app.create_user("tog_a").await;
    let user_b = app.create_user("tog_b").await;
    let path = format!("/v1/users/{}/follow/toggle", user_b.id);

    let expected = [
        (true, "user followed"),
        (false, "user unfollowed"),
        (true, "user followed"),
    ];
    for (following, message) in expected {
        let resp = app
            .post_json(&path, json!({}), Some(&user_a.access_token))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json();
        assert_eq!(body["following"], following);
        assert_eq!(body["message"], message);
    }

    // Toggle and the explicit endpoints share one edge
    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn toggle_follow_unknown_user() {
    let app = app().await;
    let user = app.create_user("tog_ghost").await;

    let resp = app
        .post_json(
            &format!("/v1/users/{}/follow/toggle", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Listings
// ===========================================================================

#[tokio::test]
async fn list_followers_and_following() {
    let app = app().await;
    let star = app.create_user("lst_star").await;
    let fan_1 = app.create_user("lst_fan1").await;
    let fan_2 = app.create_user("lst_fan2").await;
    app.follow(&fan_1, &star).await;
    app.follow(&fan_2, &star).await;

    let resp = app
        .get(
            &format!("/v1/users/{}/followers", star.id),
            Some(&fan_1.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    // Newest follower first
    assert_eq!(
        resp.item_ids(),
        vec![fan_2.id.to_string(), fan_1.id.to_string()]
    );
    assert!(resp.json()["items"][0]["followed_at"].is_string());

    let resp = app
        .get(
            &format!("/v1/users/{}/following", fan_1.id),
            Some(&fan_1.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.item_ids(), vec![star.id.to_string()]);
}

#[tokio::test]
async fn list_followers_paginates() {
    let app = app().await;
    let star = app.create_user("pag_star").await;
    let mut fans = Vec::new();
    for i in 0..3 {
        let fan = app.create_user(&format!("pag_fan{}", i)).await;
        app.follow(&fan, &star).await;
        fans.push(fan);
    }

    let first = app
        .get(
            &format!("/v1/users/{}/followers?limit=2", star.id),
            Some(&star.access_token),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.item_ids().len(), 2);
    let cursor = first.json()["next_cursor"].as_str().unwrap().to_string();

    let second = app
        .get(
            &format!("/v1/users/{}/followers?limit=2&cursor={}", star.id, cursor),
            Some(&star.access_token),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.item_ids(), vec![fans[0].id.to_string()]);
    assert!(second.json()["next_cursor"].is_null());
}

#[tokio::test]
async fn list_followers_of_unknown_user() {
    let app = app().await;
    let user = app.create_user("lst_ghost").await;

    let resp = app
        .get(
            &format!("/v1/users/{}/followers", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
