use anyhow::Result;
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::app::search::escape_like_pattern;
use crate::domain::post::{Post, POST_SELECT};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

/// Optional feed filters. With no filter the feed follows the social graph;
/// with any filter it searches every post and ignores the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    content: Option<String>,
    created_on: Option<Date>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Following,
    Filtered,
}

impl FeedFilter {
    pub fn new(content: Option<String>, created_on: Option<Date>) -> Self {
        let content = content
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self {
            content,
            created_on,
        }
    }

    pub fn mode(&self) -> FeedMode {
        if self.content.is_none() && self.created_on.is_none() {
            FeedMode::Following
        } else {
            FeedMode::Filtered
        }
    }
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_feed(
        &self,
        user_id: Uuid,
        filter: &FeedFilter,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let mut query = build_feed_query(user_id, filter, cursor, limit);
        let rows = query.build().fetch_all(self.db.pool()).await?;
        Ok(rows.iter().map(Post::from_row).collect())
    }
}

fn build_feed_query(
    user_id: Uuid,
    filter: &FeedFilter,
    cursor: Option<(OffsetDateTime, Uuid)>,
    limit: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(POST_SELECT);
    query.push(" WHERE ");

    match filter.mode() {
        FeedMode::Following => {
            query
                .push("p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ")
                .push_bind(user_id)
                .push(")");
        }
        FeedMode::Filtered => {
            query.push("TRUE");
            if let Some(content) = &filter.content {
                query
                    .push(" AND p.content ILIKE ")
                    .push_bind(format!("%{}%", escape_like_pattern(content)));
            }
            if let Some(created_on) = filter.created_on {
                query
                    .push(" AND (p.created_at AT TIME ZONE 'UTC')::date = ")
                    .push_bind(created_on);
            }
        }
    }

    if let Some((created_at, post_id)) = cursor {
        query
            .push(" AND (p.created_at < ")
            .push_bind(created_at)
            .push(" OR (p.created_at = ")
            .push_bind(created_at)
            .push(" AND p.id < ")
            .push_bind(post_id)
            .push("))");
    }

    query
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(limit);
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn blank_content_is_no_filter() {
        assert_eq!(FeedFilter::new(None, None).mode(), FeedMode::Following);
        assert_eq!(
            FeedFilter::new(Some("   ".into()), None).mode(),
            FeedMode::Following
        );
        assert_eq!(
            FeedFilter::new(Some(" hello ".into()), None),
            FeedFilter {
                content: Some("hello".into()),
                created_on: None
            }
        );
    }

    #[test]
    fn any_filter_switches_to_filtered_mode() {
        assert_eq!(
            FeedFilter::new(Some("xyz".into()), None).mode(),
            FeedMode::Filtered
        );
        assert_eq!(
            FeedFilter::new(None, Some(date!(2023 - 08 - 27))).mode(),
            FeedMode::Filtered
        );
    }

    #[test]
    fn following_query_uses_graph_only() {
        let query = build_feed_query(Uuid::new_v4(), &FeedFilter::default(), None, 31);
        let sql = query.sql();
        assert!(sql.contains("SELECT followee_id FROM follows WHERE follower_id = $1"));
        assert!(!sql.contains("ILIKE"));
        assert!(sql.ends_with("ORDER BY p.created_at DESC, p.id DESC LIMIT $2"));
    }

    #[test]
    fn filtered_query_ignores_graph() {
        let filter = FeedFilter::new(Some("hello".into()), Some(date!(2023 - 08 - 27)));
        let cursor = Some((OffsetDateTime::now_utc(), Uuid::new_v4()));
        let query = build_feed_query(Uuid::new_v4(), &filter, cursor, 31);
        let sql = query.sql();
        assert!(!sql.contains("follows"));
        assert!(sql.contains("p.content ILIKE $1"));
        assert!(sql.contains("::date = $2"));
        assert!(sql.contains("p.created_at < $3"));
        assert!(sql.ends_with("LIMIT $6"));
    }
}
