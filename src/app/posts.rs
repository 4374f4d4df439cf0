use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::post::{LikedPost, Post, POST_SELECT};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, content: String) -> Result<Post> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (author_id, content) \
                VALUES ($1, $2) \
                RETURNING id, author_id, content, created_at \
             ) \
             SELECT p.id, p.author_id, u.username AS author_username, p.content, p.created_at, \
                    0::BIGINT AS likes_count, 0::BIGINT AS comments_count \
             FROM inserted_post p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(author_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Post::from_row(&row))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = $1", POST_SELECT))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(Post::from_row))
    }

    /// Only rewrites the post when `author_id` wrote it.
    pub async fn update_content(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: String,
    ) -> Result<Option<Post>> {
        let row = sqlx::query(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET content = $3 \
                WHERE id = $1 AND author_id = $2 \
                RETURNING id, author_id, content, created_at \
             ) \
             SELECT p.id, p.author_id, u.username AS author_username, p.content, p.created_at, \
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count \
             FROM updated_post p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Post::from_row))
    }

    pub async fn delete_post(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_user(
        &self,
        author_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "{} WHERE p.author_id = $1 \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                    POST_SELECT
                ))
                .bind(author_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE p.author_id = $1 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                    POST_SELECT
                ))
                .bind(author_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(Post::from_row).collect())
    }

    /// Posts liked by `user_id`, most recently liked first.
    pub async fn list_liked(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<LikedPost>> {
        let rows = match cursor {
            Some((liked_at, post_id)) => {
                sqlx::query(&format!(
                    "{} WHERE liked.user_id = $1 \
                       AND (liked.created_at < $2 OR (liked.created_at = $2 AND p.id < $3)) \
                     ORDER BY liked.created_at DESC, p.id DESC \
                     LIMIT $4",
                    LIKED_SELECT
                ))
                .bind(user_id)
                .bind(liked_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE liked.user_id = $1 \
                     ORDER BY liked.created_at DESC, p.id DESC \
                     LIMIT $2",
                    LIKED_SELECT
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let posts = rows
            .iter()
            .map(|row| LikedPost {
                post: Post::from_row(row),
                liked_at: row.get("liked_at"),
            })
            .collect();

        Ok(posts)
    }
}

const LIKED_SELECT: &str = "SELECT p.id, p.author_id, u.username AS author_username, \
        p.content, p.created_at, liked.created_at AS liked_at, \
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count \
     FROM likes liked \
     JOIN posts p ON p.id = liked.post_id \
     JOIN users u ON u.id = p.author_id";
