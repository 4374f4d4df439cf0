use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::Comment;

/// Post projection with author username and aggregate counters. Callers append
/// their own `WHERE`/`ORDER BY` clauses.
pub const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username AS author_username, \
        p.content, p.created_at, \
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count \
     FROM posts p \
     JOIN users u ON u.id = p.author_id";

/// A post with counters instead of child collections. This is the shape used
/// in lists and the read-only detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes_count: i64,
    pub comments_count: i64,
}

impl Post {
    pub fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            likes_count: row.get("likes_count"),
            comments_count: row.get("comments_count"),
        }
    }
}

/// Full post as its author sees it.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes_count: i64,
    pub comments: Vec<Comment>,
}

impl PostDetail {
    pub fn new(post: Post, comments: Vec<Comment>) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            author_username: post.author_username,
            content: post.content,
            created_at: post.created_at,
            likes_count: post.likes_count,
            comments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PostView {
    Owner(PostDetail),
    Reader(Post),
}

#[derive(Debug, Clone, Serialize)]
pub struct LikedPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(with = "time::serde::rfc3339")]
    pub liked_at: OffsetDateTime,
}
