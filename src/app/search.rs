use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::SearchUser;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SearchService {
    db: Db,
}

impl SearchService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Users whose first name, last name or username contains any
    /// whitespace-separated token of `query`, case-insensitively.
    pub async fn search_users(
        &self,
        query: &str,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SearchUser>> {
        let patterns = search_patterns(query);
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let rows = match cursor {
            Some((created_at, user_id)) => {
                sqlx::query(
                    "SELECT id, username, first_name, last_name, bio, created_at \
                     FROM users \
                     WHERE (first_name ILIKE ANY($1) OR last_name ILIKE ANY($1) OR username ILIKE ANY($1)) \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(&patterns)
                .bind(created_at)
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, username, first_name, last_name, bio, created_at \
                     FROM users \
                     WHERE first_name ILIKE ANY($1) OR last_name ILIKE ANY($1) OR username ILIKE ANY($1) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(&patterns)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let users = rows
            .iter()
            .map(|row| SearchUser {
                id: row.get("id"),
                username: row.get("username"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                bio: row.get("bio"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(users)
    }
}

/// One `%token%` ILIKE pattern per whitespace-separated token.
pub fn search_patterns(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| format!("%{}%", escape_like_pattern(token)))
        .collect()
}

/// Escape LIKE metacharacters; Postgres treats backslash as the default escape.
pub fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
