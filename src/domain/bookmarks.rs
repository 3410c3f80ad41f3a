//! Bookmark rows, read state, and the per-user counter row.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    #[default]
    Unread,
    Read,
}

impl ReadState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadState::Unread => "unread",
            ReadState::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unread" => Some(ReadState::Unread),
            "read" => Some(ReadState::Read),
            _ => None,
        }
    }
}

/// Treats a stored `null` the same as an explicit `unread`.
pub fn deserialize_read_state<'de, D>(deserializer: D) -> Result<ReadState, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ReadState>::deserialize(deserializer)?.unwrap_or_default())
}

/// A bookmark as listed back to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkListRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: String,
    #[serde(default)]
    pub collection_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_read_state")]
    pub read_state: ReadState,
    pub created_at: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub edition_code: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
}

impl BookmarkListRow {
    pub fn is_unread(&self) -> bool {
        self.read_state == ReadState::Unread
    }
}

/// Stored aggregate behind `bookmark_user_counters`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookmarkCounters {
    pub user_id: Uuid,
    pub total_count: i64,
    pub unread_count: i64,
    #[serde(default)]
    pub collection_unread_counts: BTreeMap<String, i64>,
}

impl BookmarkCounters {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> BookmarkStats {
        BookmarkStats {
            total: self.total_count,
            unread: self.unread_count,
            collections: self.collection_unread_counts.clone(),
        }
    }
}

/// Counter view returned alongside bookmark responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookmarkStats {
    pub total: i64,
    pub unread: i64,
    pub collections: BTreeMap<String, i64>,
}
