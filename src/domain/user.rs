use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::calendar;

/// Columns selected whenever a full `User` is loaded.
pub const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, avatar_key, date_of_birth, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_key: Option<String>,
    #[serde(default, with = "calendar::iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            bio: row.get("bio"),
            avatar_key: row.get("avatar_key"),
            date_of_birth: row.get("date_of_birth"),
            created_at: row.get("created_at"),
        }
    }
}

/// Profile as seen by other users: no email, plus graph counters.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_key: Option<String>,
    #[serde(with = "calendar::iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            avatar_key: user.avatar_key,
            date_of_birth: user.date_of_birth,
            created_at: user.created_at,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
        }
    }
}

/// Compact row returned by user search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    #[serde(skip)]
    pub created_at: OffsetDateTime,
}
