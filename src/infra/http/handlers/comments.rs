//! Comment handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::application::comments::{CommentListRequest, NewComment};
use crate::domain::comments::{CommentSort, CommentStatus};
use crate::domain::users::AuthUser;
use crate::infra::http::RATE_LIMITED_METRIC;
use crate::infra::http::error::ApiError;
use crate::infra::http::state::AppState;

use super::comment_to_api;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    pub post_id: Option<String>,
    pub edition: Option<String>,
    pub sort: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentBody {
    pub post_id: i64,
    #[serde(default)]
    pub edition_code: Option<String>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentStatusBody {
    pub status: String,
}

fn parse_post_id(raw: Option<&str>) -> Result<i64, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("postId is required", None))?;
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ApiError::bad_request(
                "postId must be a positive integer",
                Some(format!("got `{raw}`")),
            )
        })
}

fn parse_sort(raw: Option<&str>) -> Result<CommentSort, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(CommentSort::default()),
        Some(value) => CommentSort::parse(value).ok_or_else(|| {
            ApiError::bad_request(
                "unknown sort",
                Some("expected newest, oldest or popular".to_string()),
            )
        }),
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let wp_post_id = parse_post_id(query.post_id.as_deref())?;
    let sort = parse_sort(query.sort.as_deref())?;

    let page = state
        .comments
        .list(CommentListRequest {
            wp_post_id,
            edition_code: query.edition.filter(|value| !value.trim().is_empty()),
            sort,
            cursor: query.cursor.filter(|value| !value.is_empty()),
            limit: query.limit,
        })
        .await
        .map_err(comment_to_api)?;

    Ok(Json(page))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateCommentBody>,
) -> Result<Response, ApiError> {
    let decision = state.comment_limiter.allow(&user.id.to_string());
    if !decision.allowed {
        counter!(RATE_LIMITED_METRIC, "route" => "comments").increment(1);
        info!(
            target = "noa::http::rate_limit",
            user_id = %user.id,
            "comment creation rate limited"
        );
        return Ok(ApiError::rate_limited(
            state.comment_limiter.retry_after_secs(),
        ));
    }

    let comment = state
        .comments
        .create(
            &user,
            NewComment {
                wp_post_id: body.post_id,
                edition_code: body.edition_code,
                body: body.body,
            },
        )
        .await
        .map_err(comment_to_api)?;

    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<EditCommentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .comments
        .edit(&user, id, &body.body)
        .await
        .map_err(comment_to_api)?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .comments
        .delete(&user, id)
        .await
        .map_err(comment_to_api)?;
    Ok(Json(comment))
}

pub async fn moderate_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<CommentStatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let status = body
        .status
        .parse::<CommentStatus>()
        .map_err(|err| ApiError::bad_request("unknown comment status", Some(err.to_string())))?;

    let comment = state
        .comments
        .moderate(&user, id, status)
        .await
        .map_err(comment_to_api)?;
    Ok(Json(comment))
}
