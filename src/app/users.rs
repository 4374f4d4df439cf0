use anyhow::Result;
use sqlx::{Postgres, QueryBuilder, Row};
use time::Date;
use uuid::Uuid;

use crate::domain::user::{PublicUser, User, USER_COLUMNS};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

/// Partial profile update.
///
/// `None` leaves a column unchanged; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub avatar_key: Option<Option<String>>,
    pub date_of_birth: Option<Option<Date>>,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicUser>> {
        let row = sqlx::query(&format!(
            "SELECT {}, \
                (SELECT COUNT(*) FROM follows WHERE followee_id = users.id) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = users.id) AS following_count, \
                (SELECT COUNT(*) FROM posts WHERE author_id = users.id) AS posts_count \
             FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = row.map(|row| {
            let mut profile = PublicUser::from(User::from_row(&row));
            profile.followers_count = row.get("followers_count");
            profile.following_count = row.get("following_count");
            profile.posts_count = row.get("posts_count");
            profile
        });

        Ok(profile)
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<Option<User>> {
        let row = match build_profile_update(user_id, update) {
            Some(mut query) => query.build().fetch_optional(self.db.pool()).await?,
            None => {
                sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                    .bind(user_id)
                    .fetch_optional(self.db.pool())
                    .await?
            }
        };

        Ok(row.as_ref().map(User::from_row))
    }

    /// Deleting the user cascades to posts, comments, likes, follows and tokens.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }
}

/// Builds an UPDATE touching only the columns present in `update`.
/// Returns `None` when there is nothing to change.
fn build_profile_update(
    user_id: Uuid,
    update: ProfileUpdate,
) -> Option<QueryBuilder<'static, Postgres>> {
    let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET ");
    let mut touched = false;
    {
        let mut set = query.separated(", ");
        if let Some(username) = update.username {
            set.push("username = ").push_bind_unseparated(username);
            touched = true;
        }
        if let Some(email) = update.email {
            set.push("email = ").push_bind_unseparated(email);
            touched = true;
        }
        if let Some(first_name) = update.first_name {
            set.push("first_name = ").push_bind_unseparated(first_name);
            touched = true;
        }
        if let Some(last_name) = update.last_name {
            set.push("last_name = ").push_bind_unseparated(last_name);
            touched = true;
        }
        if let Some(bio) = update.bio {
            set.push("bio = ").push_bind_unseparated(bio);
            touched = true;
        }
        if let Some(avatar_key) = update.avatar_key {
            set.push("avatar_key = ").push_bind_unseparated(avatar_key);
            touched = true;
        }
        if let Some(date_of_birth) = update.date_of_birth {
            set.push("date_of_birth = ").push_bind_unseparated(date_of_birth);
            touched = true;
        }
    }
    if !touched {
        return None;
    }

    query
        .push(" WHERE id = ")
        .push_bind(user_id)
        .push(" RETURNING ")
        .push(USER_COLUMNS);
    Some(query)
}
