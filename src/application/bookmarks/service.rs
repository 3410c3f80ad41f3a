use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::bookmarks::counters::{
    BookmarkCounterDelta, build_addition_counter_delta, build_removal_counter_delta,
    build_update_counter_delta,
};
use crate::application::bookmarks::cursor::BookmarkCursor;
use crate::application::pagination::{Pagination, PaginationInput, derive_pagination, page_offset};
use crate::application::repos::{
    BookmarkCountersRepo, BookmarkListQuery, BookmarkPatch, BookmarkSelector, BookmarksRepo,
    CollectionFilter, CreateBookmarkParams, RepoError,
};
use crate::domain::bookmarks::{BookmarkCounters, BookmarkListRow, BookmarkStats, ReadState};
use crate::domain::error::DomainError;
use crate::domain::users::AuthUser;

#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmarkPolicy {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for BookmarkPolicy {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookmarkListRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub collection: Option<CollectionFilter>,
    pub read_state: Option<ReadState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarksPage {
    pub items: Vec<BookmarkListRow>,
    pub pagination: Pagination,
    pub stats: Option<BookmarkStats>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBookmark {
    pub post_id: String,
    pub collection_id: Option<Uuid>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub edition_code: Option<String>,
    pub featured_image: Option<String>,
}

/// Changed bookmark plus the counters after the change.
///
/// `stats` is `None` when the counter row could not be updated; the bookmark
/// change itself still went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkMutation {
    pub bookmark: BookmarkListRow,
    pub stats: Option<BookmarkStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedBookmarks {
    pub removed: Vec<BookmarkListRow>,
    pub stats: Option<BookmarkStats>,
}

#[derive(Clone)]
pub struct BookmarkService {
    bookmarks: Arc<dyn BookmarksRepo>,
    counters: Arc<dyn BookmarkCountersRepo>,
    policy: BookmarkPolicy,
}

impl BookmarkService {
    pub fn new(
        bookmarks: Arc<dyn BookmarksRepo>,
        counters: Arc<dyn BookmarkCountersRepo>,
        policy: BookmarkPolicy,
    ) -> Self {
        Self {
            bookmarks,
            counters,
            policy,
        }
    }

    pub async fn list(
        &self,
        user: &AuthUser,
        request: BookmarkListRequest,
    ) -> Result<BookmarksPage, BookmarkError> {
        let page = request.page.unwrap_or(1).max(1);
        let limit = request
            .limit
            .unwrap_or(self.policy.default_page_size)
            .clamp(1, self.policy.max_page_size.max(1));

        let cursor = request.cursor.as_deref().and_then(BookmarkCursor::decode);
        let (cursor_conditions, offset) = match &cursor {
            Some(cursor) => (cursor.conditions(), 0),
            None => (Vec::new(), page_offset(page, limit)),
        };

        let query = BookmarkListQuery {
            collection: request.collection,
            read_state: request.read_state,
            cursor_conditions,
            offset,
            limit: limit.saturating_add(1),
        };
        let rows = self.bookmarks.list_bookmarks(user.id, &query).await?;

        let encoder = |row: &BookmarkListRow| BookmarkCursor::after(row).encode();
        let sliced =
            derive_pagination(PaginationInput::new(page, limit, rows).with_cursor_encoder(&encoder));

        let stats = match self.stats(user).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(
                    target = "noa::bookmarks",
                    user_id = %user.id,
                    error = %err,
                    "failed to load bookmark counters"
                );
                None
            }
        };

        Ok(BookmarksPage {
            items: sliced.items,
            pagination: sliced.pagination,
            stats,
        })
    }

    pub async fn stats(&self, user: &AuthUser) -> Result<BookmarkStats, BookmarkError> {
        let counters = self
            .counters
            .load_counters(user.id)
            .await?
            .unwrap_or_else(|| BookmarkCounters::empty(user.id));
        Ok(counters.stats())
    }

    pub async fn add(
        &self,
        user: &AuthUser,
        input: NewBookmark,
    ) -> Result<BookmarkMutation, BookmarkError> {
        let post_id = input.post_id.trim();
        if post_id.is_empty() {
            return Err(DomainError::validation("postId must not be empty").into());
        }

        let bookmark = self
            .bookmarks
            .insert_bookmark(CreateBookmarkParams {
                user_id: user.id,
                post_id: post_id.to_string(),
                collection_id: input.collection_id,
                slug: input.slug,
                title: input.title,
                edition_code: input.edition_code,
                featured_image: input.featured_image,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    BookmarkError::from(DomainError::conflict("post is already bookmarked"))
                }
                other => BookmarkError::from(other),
            })?;

        let stats = self
            .record_delta(user, Some(build_addition_counter_delta(&bookmark)))
            .await;
        Ok(BookmarkMutation { bookmark, stats })
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        patch: BookmarkPatch,
    ) -> Result<BookmarkMutation, BookmarkError> {
        if patch.is_empty() {
            return Err(DomainError::validation("nothing to update").into());
        }

        let previous = self
            .bookmarks
            .find_bookmark(user.id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("bookmark"))?;
        let bookmark = self.bookmarks.update_bookmark(user.id, id, &patch).await?;

        let stats = self
            .record_delta(user, build_update_counter_delta(&previous, &bookmark))
            .await;
        Ok(BookmarkMutation { bookmark, stats })
    }

    pub async fn remove(
        &self,
        user: &AuthUser,
        selector: BookmarkSelector,
    ) -> Result<RemovedBookmarks, BookmarkError> {
        match &selector {
            BookmarkSelector::Ids(ids) if ids.is_empty() => {
                return Err(DomainError::validation("no bookmark ids given").into());
            }
            BookmarkSelector::PostId(post_id) if post_id.trim().is_empty() => {
                return Err(DomainError::validation("postId must not be empty").into());
            }
            _ => {}
        }

        let removed = self.bookmarks.delete_bookmarks(user.id, &selector).await?;
        let stats = self
            .record_delta(user, build_removal_counter_delta(&removed))
            .await;
        Ok(RemovedBookmarks { removed, stats })
    }

    /// Applies `delta` to the stored counters and returns the resulting stats.
    ///
    /// Read-modify-write with no retry: concurrent mutations for the same user
    /// can lose an update.
    async fn record_delta(
        &self,
        user: &AuthUser,
        delta: Option<BookmarkCounterDelta>,
    ) -> Option<BookmarkStats> {
        let result = match delta {
            Some(delta) => self.apply_delta(user.id, &delta).await,
            None => {
                debug!(target = "noa::bookmarks", user_id = %user.id, "no counter change");
                self.counters
                    .load_counters(user.id)
                    .await
                    .map(|counters| counters.unwrap_or_else(|| BookmarkCounters::empty(user.id)))
            }
        };

        match result {
            Ok(counters) => Some(counters.stats()),
            Err(err) => {
                warn!(
                    target = "noa::bookmarks",
                    user_id = %user.id,
                    error = %err,
                    "failed to update bookmark counters"
                );
                None
            }
        }
    }

    async fn apply_delta(
        &self,
        user_id: Uuid,
        delta: &BookmarkCounterDelta,
    ) -> Result<BookmarkCounters, RepoError> {
        let mut counters = self
            .counters
            .load_counters(user_id)
            .await?
            .unwrap_or_else(|| BookmarkCounters::empty(user_id));
        counters.apply(delta);
        self.counters.save_counters(&counters).await?;
        Ok(counters)
    }
}
