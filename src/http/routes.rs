use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/verify", post(handlers::verify_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route("/auth/change-password", post(handlers::change_password))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/follow", delete(handlers::unfollow_user))
        .route("/users/:id/follow/toggle", post(handlers::toggle_follow))
        .route("/users/:id/followers", get(handlers::list_followers))
        .route("/users/:id/following", get(handlers::list_following))
        // The authenticated user's own account
        .route("/me", get(handlers::get_current_user))
        .route("/me", patch(handlers::update_profile))
        .route("/me", delete(handlers::delete_account))
        .route("/me/likes", get(handlers::list_liked_posts))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/likes", get(handlers::list_post_likes))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route("/posts/:id/comments", post(handlers::create_comment))
        .route(
            "/posts/:id/comments/:comment_id",
            get(handlers::get_comment),
        )
        .route(
            "/posts/:id/comments/:comment_id",
            patch(handlers::update_comment),
        )
        .route(
            "/posts/:id/comments/:comment_id",
            delete(handlers::delete_comment),
        )
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed", get(handlers::home_feed))
}

pub fn search() -> Router<AppState> {
    Router::new().route("/search/users", get(handlers::search_users))
}
