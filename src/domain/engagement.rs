use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}

impl LikeToggle {
    pub fn is_liked(self) -> bool {
        matches!(self, Self::Liked)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Liked => "post liked",
            Self::Unliked => "post unliked",
        }
    }
}

pub const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
        c.content, c.created_at \
     FROM comments c \
     JOIN users u ON u.id = c.author_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum CommentView {
    Owner(Comment),
    Reader(Comment),
}
