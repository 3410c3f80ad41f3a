use crate::application::pagination::{decode_cursor_parts, encode_cursor_parts, quote_filter_value};
use crate::domain::bookmarks::BookmarkListRow;

/// Keyset position in the newest-first bookmark listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkCursor {
    pub created_at: String,
    pub id: String,
}

impl BookmarkCursor {
    pub fn after(row: &BookmarkListRow) -> Self {
        Self {
            created_at: row.created_at.clone(),
            id: row.id.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        encode_cursor_parts(&[self.created_at.as_str(), self.id.as_str()])
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let parts = decode_cursor_parts(raw)?;
        let [created_at, id, ..] = parts.as_slice() else {
            return None;
        };
        if created_at.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            created_at: created_at.clone(),
            id: id.clone(),
        })
    }

    pub fn conditions(&self) -> Vec<String> {
        let created_at = quote_filter_value(&self.created_at);
        let id = quote_filter_value(&self.id);
        vec![
            format!("created_at.lt.{created_at}"),
            format!("and(created_at.eq.{created_at},id.lt.{id})"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let cursor = BookmarkCursor {
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
            id: "0b8f7c4e-8a53-4d1f-9d0f-45d5b9f0f6aa".to_string(),
        };
        assert_eq!(BookmarkCursor::decode(&cursor.encode()), Some(cursor));
    }

    #[test]
    fn rejects_short_or_blank_cursors() {
        assert_eq!(BookmarkCursor::decode("2024-05-01"), None);
        assert_eq!(BookmarkCursor::decode("|abc"), None);
    }

    #[test]
    fn conditions_walk_backwards_in_time() {
        let cursor = BookmarkCursor {
            created_at: "2024-05-01".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(
            cursor.conditions(),
            vec![
                "created_at.lt.2024-05-01".to_string(),
                "and(created_at.eq.2024-05-01,id.lt.abc)".to_string(),
            ]
        );
    }
}
