//! Comment records and the vocabulary shared by listing and moderation.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Moderation state of a comment.
///
/// Older rows carry `approved`/`rejected`; both are folded into the current
/// states when read and never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    #[serde(alias = "approved")]
    Active,
    Flagged,
    #[serde(alias = "rejected")]
    Deleted,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Active => "active",
            CommentStatus::Flagged => "flagged",
            CommentStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown comment status `{0}`")]
pub struct UnknownCommentStatus(pub String);

impl FromStr for CommentStatus {
    type Err = UnknownCommentStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(CommentStatus::Pending),
            "active" | "approved" => Ok(CommentStatus::Active),
            "flagged" => Ok(CommentStatus::Flagged),
            "deleted" | "rejected" => Ok(CommentStatus::Deleted),
            _ => Err(UnknownCommentStatus(value.to_string())),
        }
    }
}

/// Sort orders offered by the comment listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl CommentSort {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentSort::Newest => "newest",
            CommentSort::Oldest => "oldest",
            CommentSort::Popular => "popular",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newest" => Some(CommentSort::Newest),
            "oldest" => Some(CommentSort::Oldest),
            "popular" => Some(CommentSort::Popular),
            _ => None,
        }
    }

    /// PostgREST `order` parameter matching the keyset conditions for this sort.
    pub fn order_clause(self) -> &'static str {
        match self {
            CommentSort::Newest => "created_at.desc,id.desc",
            CommentSort::Oldest => "created_at.asc,id.asc",
            CommentSort::Popular => "reaction_count.desc.nullslast,created_at.desc,id.desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub wp_post_id: i64,
    pub body: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub edition_code: Option<String>,
    pub status: CommentStatus,
    /// Timestamp text exactly as the store returned it; cursors embed it verbatim.
    pub created_at: String,
    #[serde(default)]
    pub reaction_count: Option<i64>,
}

impl Comment {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_statuses_are_normalized_on_read() {
        let approved: CommentStatus = serde_json::from_str("\"approved\"").expect("alias");
        let rejected: CommentStatus = serde_json::from_str("\"rejected\"").expect("alias");
        assert_eq!(approved, CommentStatus::Active);
        assert_eq!(rejected, CommentStatus::Deleted);

        assert_eq!(
            serde_json::to_string(&CommentStatus::Active).expect("serialize"),
            "\"active\""
        );
    }

    #[test]
    fn status_parse_accepts_aliases_case_insensitively() {
        assert_eq!("Approved".parse::<CommentStatus>(), Ok(CommentStatus::Active));
        assert_eq!(" rejected ".parse::<CommentStatus>(), Ok(CommentStatus::Deleted));
        let err = "spam".parse::<CommentStatus>().expect_err("unknown status");
        assert_eq!(err, UnknownCommentStatus("spam".to_string()));
        assert_eq!(err.to_string(), "unknown comment status `spam`");
    }

    #[test]
    fn comment_row_tolerates_missing_optional_columns() {
        let raw = serde_json::json!({
            "id": "6f1f0a2c-2b7e-4d4c-9d39-6f3f6a1e2b10",
            "wp_post_id": 42,
            "body": "Great read",
            "user_id": "0b8f7c4e-8a53-4d1f-9d0f-45d5b9f0f6aa",
            "status": "approved",
            "created_at": "2024-05-01T10:00:00.123456+00:00"
        });
        let comment: Comment = serde_json::from_value(raw).expect("comment");
        assert_eq!(comment.status, CommentStatus::Active);
        assert_eq!(comment.reaction_count, None);
        assert_eq!(comment.edition_code, None);
    }
}
