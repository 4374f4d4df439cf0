use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::http::AppError;

const DEFAULT_LIMIT: i64 = 30;
const MAX_LIMIT: i64 = 200;

pub type Cursor = (OffsetDateTime, Uuid);

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl PaginationQuery {
    /// Validated `(limit, cursor)`.
    pub fn parse(self) -> Result<(i64, Option<Cursor>), AppError> {
        Ok((page_limit(self.limit)?, parse_cursor(self.cursor)?))
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> ListResponse<T> {
    /// Build a page from a query that fetched `limit + 1` rows; the extra row
    /// only signals that another page exists.
    pub fn from_overfetch(mut items: Vec<T>, limit: i64, key: impl Fn(&T) -> Cursor) -> Self {
        let next_cursor = if items.len() > limit as usize {
            items.truncate(limit as usize);
            items.last().map(&key)
        } else {
            None
        };

        Self {
            items,
            next_cursor: encode_cursor(next_cursor),
        }
    }
}

pub fn page_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

pub fn parse_cursor(cursor: Option<String>) -> Result<Option<Cursor>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .rsplit_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

pub fn encode_cursor(cursor: Option<Cursor>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn cursor_survives_encoding() {
        let id = Uuid::new_v4();
        let at = datetime!(2024-03-01 12:30:45.123456 UTC);
        let encoded = encode_cursor(Some((at, id))).unwrap();
        assert_eq!(parse_cursor(Some(encoded)).unwrap(), Some((at, id)));
    }

    #[test]
    fn malformed_cursors_are_bad_requests() {
        for raw in ["", "nope", "2024-03-01T00:00:00Z/not-a-uuid", "yesterday/00000000-0000-0000-0000-000000000000"] {
            assert!(parse_cursor(Some(raw.to_string())).is_err(), "{raw}");
        }
        assert_eq!(parse_cursor(None).unwrap(), None);
    }

    #[test]
    fn limit_bounds() {
        assert_eq!(page_limit(None).unwrap(), 30);
        assert_eq!(page_limit(Some(200)).unwrap(), 200);
        assert!(page_limit(Some(0)).is_err());
        assert!(page_limit(Some(201)).is_err());
    }

    #[test]
    fn overfetch_sets_next_cursor_from_last_kept_item() {
        let at = datetime!(2024-03-01 00:00 UTC);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let page = ListResponse::from_overfetch(ids.clone(), 2, |id| (at, *id));
        assert_eq!(page.items, ids[..2].to_vec());
        assert_eq!(page.next_cursor, encode_cursor(Some((at, ids[1]))));

        let last = ListResponse::from_overfetch(ids[..2].to_vec(), 2, |id| (at, *id));
        assert_eq!(last.items.len(), 2);
        assert!(last.next_cursor.is_none());
    }
}
