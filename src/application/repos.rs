//! Repository traits describing persistence and upstream content adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::bookmarks::{BookmarkCounters, BookmarkListRow, ReadState};
use crate::domain::comments::{Comment, CommentSort, CommentStatus};
use crate::domain::home::{FeedSource, HomePost};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// Rows to fetch for one comment page.
#[derive(Debug, Clone)]
pub struct CommentListQuery {
    pub wp_post_id: i64,
    pub edition_code: Option<String>,
    pub status: CommentStatus,
    pub sort: CommentSort,
    /// Keyset conditions to OR together; empty means from the top.
    pub cursor_conditions: Vec<String>,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub wp_post_id: i64,
    pub edition_code: Option<String>,
    pub user_id: Uuid,
    pub body: String,
    pub status: CommentStatus,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_comments(&self, query: &CommentListQuery) -> Result<Vec<Comment>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError>;

    async fn insert_comment(&self, params: CreateCommentParams) -> Result<Comment, RepoError>;

    async fn update_comment_body(&self, id: Uuid, body: &str) -> Result<Comment, RepoError>;

    async fn update_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFilter {
    Uncollected,
    Collection(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct BookmarkListQuery {
    pub collection: Option<CollectionFilter>,
    pub read_state: Option<ReadState>,
    pub cursor_conditions: Vec<String>,
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct CreateBookmarkParams {
    pub user_id: Uuid,
    pub post_id: String,
    pub collection_id: Option<Uuid>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub edition_code: Option<String>,
    pub featured_image: Option<String>,
}

/// Partial update; `collection_id: Some(None)` clears the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub read_state: Option<ReadState>,
    pub collection_id: Option<Option<Uuid>>,
}

impl BookmarkPatch {
    pub fn is_empty(&self) -> bool {
        self.read_state.is_none() && self.collection_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkSelector {
    Ids(Vec<Uuid>),
    PostId(String),
}

#[async_trait]
pub trait BookmarksRepo: Send + Sync {
    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        query: &BookmarkListQuery,
    ) -> Result<Vec<BookmarkListRow>, RepoError>;

    async fn find_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BookmarkListRow>, RepoError>;

    async fn insert_bookmark(
        &self,
        params: CreateBookmarkParams,
    ) -> Result<BookmarkListRow, RepoError>;

    async fn update_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &BookmarkPatch,
    ) -> Result<BookmarkListRow, RepoError>;

    /// Deletes the selected rows and returns them as they were before deletion.
    async fn delete_bookmarks(
        &self,
        user_id: Uuid,
        selector: &BookmarkSelector,
    ) -> Result<Vec<BookmarkListRow>, RepoError>;
}

#[async_trait]
pub trait BookmarkCountersRepo: Send + Sync {
    async fn load_counters(&self, user_id: Uuid) -> Result<Option<BookmarkCounters>, RepoError>;

    async fn save_counters(&self, counters: &BookmarkCounters) -> Result<(), RepoError>;
}

/// Upstream CMS providing the home feed candidate lists.
#[async_trait]
pub trait HomeContentSource: Send + Sync {
    async fn fetch_posts(&self, source: FeedSource, limit: usize)
    -> Result<Vec<HomePost>, RepoError>;
}
