use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::{Comment, Like, LikeToggle, COMMENT_SELECT};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Unlike when a like exists, like otherwise. `None` when the post does
    /// not exist. The (post_id, user_id) unique key keeps racing toggles from
    /// creating duplicate likes.
    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<LikeToggle>> {
        let mut tx = self.db.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        if removed.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(Some(LikeToggle::Unliked));
        }

        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, post_id) \
             SELECT $1, $2 \
             WHERE EXISTS (SELECT 1 FROM posts WHERE id = $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let post_exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
                    .bind(post_id)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.rollback().await?;
            // Lost a race with a concurrent like: the like is in place.
            return Ok(post_exists.then_some(LikeToggle::Liked));
        }

        tx.commit().await?;
        Ok(Some(LikeToggle::Liked))
    }

    pub async fn list_likes(
        &self,
        post_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Like>> {
        let rows = match cursor {
            Some((created_at, like_id)) => {
                sqlx::query(
                    "SELECT id, user_id, post_id, created_at \
                     FROM likes \
                     WHERE post_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(post_id)
                .bind(created_at)
                .bind(like_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, post_id, created_at \
                     FROM likes \
                     WHERE post_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let likes = rows
            .iter()
            .map(|row| Like {
                id: row.get("id"),
                user_id: row.get("user_id"),
                post_id: row.get("post_id"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(likes)
    }

    /// `None` when the post does not exist.
    pub async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (post_id, author_id, content) \
                SELECT $1, $2, $3 \
                WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1) \
                RETURNING id, post_id, author_id, content, created_at \
             ) \
             SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                    c.content, c.created_at \
             FROM inserted_comment c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Comment::from_row))
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let rows = match cursor {
            Some((created_at, comment_id)) => {
                sqlx::query(&format!(
                    "{} WHERE c.post_id = $1 \
                       AND (c.created_at < $2 OR (c.created_at = $2 AND c.id < $3)) \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $4",
                    COMMENT_SELECT
                ))
                .bind(post_id)
                .bind(created_at)
                .bind(comment_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE c.post_id = $1 \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $2",
                    COMMENT_SELECT
                ))
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(Comment::from_row).collect())
    }

    /// Every comment on a post, oldest first. Backs the author's detail view.
    pub async fn all_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Comment::from_row).collect())
    }

    pub async fn get_comment(&self, post_id: Uuid, comment_id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "{} WHERE c.id = $1 AND c.post_id = $2",
            COMMENT_SELECT
        ))
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Comment::from_row))
    }

    pub async fn update_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        author_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "WITH updated_comment AS ( \
                UPDATE comments \
                SET content = $4 \
                WHERE id = $1 AND post_id = $2 AND author_id = $3 \
                RETURNING id, post_id, author_id, content, created_at \
             ) \
             SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                    c.content, c.created_at \
             FROM updated_comment c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(comment_id)
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Comment::from_row))
    }

    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        author_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM comments WHERE id = $1 AND post_id = $2 AND author_id = $3",
        )
        .bind(comment_id)
        .bind(post_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
