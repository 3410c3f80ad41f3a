use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::repos::{
    BookmarkCountersRepo, BookmarkListQuery, BookmarkPatch, BookmarkSelector, BookmarksRepo,
    CollectionFilter, CreateBookmarkParams, RepoError,
};
use crate::domain::bookmarks::{
    BookmarkCounters, BookmarkListRow, ReadState, deserialize_read_state,
};

use super::postgrest::{Params, PostgrestClient, in_filter, or_filter};

const TABLE: &str = "bookmarks";
const COUNTERS_TABLE: &str = "bookmark_user_counters";
const COLUMNS: &str =
    "id,user_id,post_id,collection_id,read_state,created_at,slug,title,edition_code,featured_image";

/// Row shape as stored; converted to the camelCase list row.
#[derive(Debug, Deserialize)]
struct BookmarkRecord {
    id: Uuid,
    user_id: Uuid,
    post_id: String,
    #[serde(default)]
    collection_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_read_state")]
    read_state: ReadState,
    created_at: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    edition_code: Option<String>,
    #[serde(default)]
    featured_image: Option<String>,
}

impl From<BookmarkRecord> for BookmarkListRow {
    fn from(record: BookmarkRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            post_id: record.post_id,
            collection_id: record.collection_id,
            read_state: record.read_state,
            created_at: record.created_at,
            slug: record.slug,
            title: record.title,
            edition_code: record.edition_code,
            featured_image: record.featured_image,
        }
    }
}

fn rows(records: Vec<BookmarkRecord>) -> Vec<BookmarkListRow> {
    records.into_iter().map(BookmarkListRow::from).collect()
}

#[derive(Serialize)]
struct InsertBookmark<'a> {
    user_id: Uuid,
    post_id: &'a str,
    collection_id: Option<Uuid>,
    read_state: ReadState,
    slug: Option<&'a str>,
    title: Option<&'a str>,
    edition_code: Option<&'a str>,
    featured_image: Option<&'a str>,
}

#[derive(Serialize, Default)]
struct PatchBookmark {
    #[serde(skip_serializing_if = "Option::is_none")]
    read_state: Option<ReadState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_id: Option<Option<Uuid>>,
}

#[derive(Serialize, Deserialize)]
struct CounterRecord {
    user_id: Uuid,
    total_count: i64,
    unread_count: i64,
    #[serde(default)]
    collection_unread_counts: Option<BTreeMap<String, i64>>,
}

#[derive(Clone)]
pub struct SupabaseBookmarksRepo {
    client: PostgrestClient,
}

impl SupabaseBookmarksRepo {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

pub(crate) fn list_params(user_id: Uuid, query: &BookmarkListQuery) -> Params {
    let mut params: Params = vec![
        ("select", COLUMNS.to_string()),
        ("user_id", format!("eq.{user_id}")),
        ("order", "created_at.desc,id.desc".to_string()),
        ("limit", query.limit.to_string()),
    ];
    if query.offset > 0 {
        params.push(("offset", query.offset.to_string()));
    }
    match query.collection {
        Some(CollectionFilter::Uncollected) => {
            params.push(("collection_id", "is.null".to_string()));
        }
        Some(CollectionFilter::Collection(id)) => {
            params.push(("collection_id", format!("eq.{id}")));
        }
        None => {}
    }
    let mut groups = Vec::new();
    match query.read_state {
        // Legacy rows store `null` for unread.
        Some(ReadState::Unread) => {
            groups.push("or(read_state.is.null,read_state.eq.unread)".to_string());
        }
        Some(ReadState::Read) => params.push(("read_state", "eq.read".to_string())),
        None => {}
    }
    if !query.cursor_conditions.is_empty() {
        groups.push(format!("or{}", or_filter(&query.cursor_conditions)));
    }
    if !groups.is_empty() {
        params.push(("and", format!("({})", groups.join(","))));
    }
    params
}

#[async_trait]
impl BookmarksRepo for SupabaseBookmarksRepo {
    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        query: &BookmarkListQuery,
    ) -> Result<Vec<BookmarkListRow>, RepoError> {
        let records: Vec<BookmarkRecord> =
            self.client.select(TABLE, &list_params(user_id, query)).await?;
        Ok(rows(records))
    }

    async fn find_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BookmarkListRow>, RepoError> {
        let records: Vec<BookmarkRecord> = self
            .client
            .select(
                TABLE,
                &[
                    ("select", COLUMNS.to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("id", format!("eq.{id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows(records).into_iter().next())
    }

    async fn insert_bookmark(
        &self,
        params: CreateBookmarkParams,
    ) -> Result<BookmarkListRow, RepoError> {
        let body = InsertBookmark {
            user_id: params.user_id,
            post_id: &params.post_id,
            collection_id: params.collection_id,
            read_state: ReadState::Unread,
            slug: params.slug.as_deref(),
            title: params.title.as_deref(),
            edition_code: params.edition_code.as_deref(),
            featured_image: params.featured_image.as_deref(),
        };
        let records: Vec<BookmarkRecord> = self.client.insert(TABLE, &body).await?;
        rows(records).into_iter().next().ok_or(RepoError::NotFound)
    }

    async fn update_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &BookmarkPatch,
    ) -> Result<BookmarkListRow, RepoError> {
        let body = PatchBookmark {
            read_state: patch.read_state,
            collection_id: patch.collection_id,
        };
        let records: Vec<BookmarkRecord> = self
            .client
            .update(
                TABLE,
                &[
                    ("user_id", format!("eq.{user_id}")),
                    ("id", format!("eq.{id}")),
                ],
                &body,
            )
            .await?;
        rows(records).into_iter().next().ok_or(RepoError::NotFound)
    }

    async fn delete_bookmarks(
        &self,
        user_id: Uuid,
        selector: &BookmarkSelector,
    ) -> Result<Vec<BookmarkListRow>, RepoError> {
        let filter = match selector {
            BookmarkSelector::Ids(ids) => ("id", in_filter(ids)),
            BookmarkSelector::PostId(post_id) => ("post_id", format!("eq.{post_id}")),
        };
        let records: Vec<BookmarkRecord> = self
            .client
            .delete(TABLE, &[("user_id", format!("eq.{user_id}")), filter])
            .await?;
        Ok(rows(records))
    }
}

#[async_trait]
impl BookmarkCountersRepo for SupabaseBookmarksRepo {
    async fn load_counters(&self, user_id: Uuid) -> Result<Option<BookmarkCounters>, RepoError> {
        let records: Vec<CounterRecord> = self
            .client
            .select(
                COUNTERS_TABLE,
                &[
                    (
                        "select",
                        "user_id,total_count,unread_count,collection_unread_counts".to_string(),
                    ),
                    ("user_id", format!("eq.{user_id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(records.into_iter().next().map(|record| BookmarkCounters {
            user_id: record.user_id,
            total_count: record.total_count,
            unread_count: record.unread_count,
            collection_unread_counts: record.collection_unread_counts.unwrap_or_default(),
        }))
    }

    async fn save_counters(&self, counters: &BookmarkCounters) -> Result<(), RepoError> {
        let record = CounterRecord {
            user_id: counters.user_id,
            total_count: counters.total_count,
            unread_count: counters.unread_count,
            collection_unread_counts: Some(counters.collection_unread_counts.clone()),
        };
        self.client
            .upsert(COUNTERS_TABLE, "user_id", &record)
            .await
    }
}
