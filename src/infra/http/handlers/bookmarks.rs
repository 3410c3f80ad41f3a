//! Bookmark handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::bookmarks::{BookmarkListRequest, NewBookmark};
use crate::application::repos::{BookmarkPatch, BookmarkSelector, CollectionFilter};
use crate::domain::bookmarks::ReadState;
use crate::domain::users::AuthUser;
use crate::infra::http::error::ApiError;
use crate::infra::http::state::AppState;

use super::{bookmark_to_api, double_option};

const UNCOLLECTED: [&str; 2] = ["__uncollected__", "uncollected"];

#[derive(Debug, Deserialize)]
pub struct BookmarkListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub collection: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookmarkBody {
    pub post_id: String,
    #[serde(default)]
    pub collection_id: Option<Uuid>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub edition_code: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookmarkBody {
    #[serde(default)]
    pub read_state: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub collection_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBookmarksQuery {
    pub ids: Option<String>,
    pub post_id: Option<String>,
}

fn parse_collection(raw: Option<&str>) -> Result<Option<CollectionFilter>, ApiError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if UNCOLLECTED.contains(&value) {
        return Ok(Some(CollectionFilter::Uncollected));
    }
    Uuid::parse_str(value)
        .map(|id| Some(CollectionFilter::Collection(id)))
        .map_err(|_| {
            ApiError::bad_request(
                "invalid collection",
                Some("expected a collection id or `__uncollected__`".to_string()),
            )
        })
}

fn parse_read_state(raw: Option<&str>) -> Result<Option<ReadState>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => ReadState::parse(value).map(Some).ok_or_else(|| {
            ApiError::bad_request(
                "invalid read state",
                Some("expected read or unread".to_string()),
            )
        }),
    }
}

fn parse_selector(query: RemoveBookmarksQuery) -> Result<BookmarkSelector, ApiError> {
    if let Some(ids) = query.ids.as_deref().filter(|ids| !ids.trim().is_empty()) {
        let ids = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(Uuid::parse_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ApiError::bad_request("invalid bookmark id", Some(err.to_string())))?;
        return Ok(BookmarkSelector::Ids(ids));
    }
    match query.post_id {
        Some(post_id) if !post_id.trim().is_empty() => {
            Ok(BookmarkSelector::PostId(post_id.trim().to_string()))
        }
        _ => Err(ApiError::bad_request(
            "nothing to remove",
            Some("pass `ids` or `postId`".to_string()),
        )),
    }
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<BookmarkListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collection = parse_collection(query.collection.as_deref())?;
    let read_state = parse_read_state(query.status.as_deref())?;

    let page = state
        .bookmarks
        .list(
            &user,
            BookmarkListRequest {
                page: query.page,
                limit: query.limit,
                cursor: query.cursor.filter(|value| !value.is_empty()),
                collection,
                read_state,
            },
        )
        .await
        .map_err(bookmark_to_api)?;

    Ok(Json(page))
}

pub async fn bookmark_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .bookmarks
        .stats(&user)
        .await
        .map_err(bookmark_to_api)?;
    Ok(Json(stats))
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateBookmarkBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mutation = state
        .bookmarks
        .add(
            &user,
            NewBookmark {
                post_id: body.post_id,
                collection_id: body.collection_id,
                slug: body.slug,
                title: body.title,
                edition_code: body.edition_code,
                featured_image: body.featured_image,
            },
        )
        .await
        .map_err(bookmark_to_api)?;
    Ok((StatusCode::CREATED, Json(mutation)))
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBookmarkBody>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = BookmarkPatch {
        read_state: parse_read_state(body.read_state.as_deref())?,
        collection_id: body.collection_id,
    };
    let mutation = state
        .bookmarks
        .update(&user, id, patch)
        .await
        .map_err(bookmark_to_api)?;
    Ok(Json(mutation))
}

pub async fn remove_bookmarks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RemoveBookmarksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let selector = parse_selector(query)?;
    let removed = state
        .bookmarks
        .remove(&user, selector)
        .await
        .map_err(bookmark_to_api)?;
    Ok(Json(removed))
}
