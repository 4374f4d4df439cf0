use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::social_graph::{FollowOutcome, FollowToggle, SocialUserEdge, UnfollowOutcome};
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a follow edge. The primary key on (follower_id, followee_id)
    /// settles concurrent duplicates; the loser sees `AlreadyFollowing`.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<FollowOutcome> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) \
             SELECT $1, $2 \
             WHERE EXISTS (SELECT 1 FROM users WHERE id = $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(FollowOutcome::Followed);
        }
        if self.user_exists(followee_id).await? {
            Ok(FollowOutcome::AlreadyFollowing)
        } else {
            Ok(FollowOutcome::UserNotFound)
        }
    }

    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<UnfollowOutcome> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            return Ok(UnfollowOutcome::Unfollowed);
        }
        if self.user_exists(followee_id).await? {
            Ok(UnfollowOutcome::NotFollowing)
        } else {
            Ok(UnfollowOutcome::UserNotFound)
        }
    }

    /// Remove the edge if present, otherwise create it. `None` when the
    /// target user does not exist.
    pub async fn toggle_follow(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<Option<FollowToggle>> {
        let mut tx = self.db.pool().begin().await?;

        let removed = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(Some(FollowToggle::Unfollowed));
        }

        let target_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(followee_id)
                .fetch_one(&mut *tx)
                .await?;
        if !target_exists {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(FollowToggle::Followed))
    }

    pub async fn list_followers(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        self.list_edges(EdgeSide::Followers, user_id, cursor, limit).await
    }

    pub async fn list_following(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        self.list_edges(EdgeSide::Following, user_id, cursor, limit).await
    }

    async fn list_edges(
        &self,
        side: EdgeSide,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        // `anchor` is the fixed end of the edge, `other` the listed user.
        let (anchor, other) = match side {
            EdgeSide::Followers => ("followee_id", "follower_id"),
            EdgeSide::Following => ("follower_id", "followee_id"),
        };

        let rows = match cursor {
            Some((created_at, other_id)) => {
                sqlx::query(&format!(
                    "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.bio, \
                            u.avatar_key, u.date_of_birth, u.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.{other} \
                     WHERE f.{anchor} = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.{other} < $3)) \
                     ORDER BY f.created_at DESC, f.{other} DESC \
                     LIMIT $4"
                ))
                .bind(user_id)
                .bind(created_at)
                .bind(other_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.bio, \
                            u.avatar_key, u.date_of_birth, u.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.{other} \
                     WHERE f.{anchor} = $1 \
                     ORDER BY f.created_at DESC, f.{other} DESC \
                     LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let items = rows
            .iter()
            .map(|row| SocialUserEdge {
                user: User::from_row(row),
                followed_at: row.get("followed_at"),
            })
            .collect();

        Ok(items)
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }
}

#[derive(Debug, Clone, Copy)]
enum EdgeSide {
    Followers,
    Following,
}
