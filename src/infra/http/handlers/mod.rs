//! HTTP handlers grouped by resource, plus the shared error conversions.

mod bookmarks;
mod comments;
mod health;
mod home_feed;

pub use bookmarks::*;
pub use comments::*;
pub use health::*;
pub use home_feed::*;

use axum::http::StatusCode;
use serde::{Deserialize, Deserializer};

use crate::application::bookmarks::BookmarkError;
use crate::application::comments::CommentError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UPSTREAM_TIMEOUT,
            "Upstream timeout",
            None,
        ),
        RepoError::Upstream(message) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM,
            "Upstream error",
            Some(message),
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

pub(crate) fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::NotFound { entity } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(format!("{entity} not found")),
        ),
        DomainError::Validation { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        DomainError::Forbidden { action } => ApiError::forbidden(Some(action.to_string())),
        DomainError::Conflict { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Conflicting state",
            Some(message),
        ),
    }
}

pub(crate) fn comment_to_api(err: CommentError) -> ApiError {
    match err {
        CommentError::Domain(err) => domain_to_api(err),
        CommentError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn bookmark_to_api(err: BookmarkError) -> ApiError {
    match err {
        BookmarkError::Domain(err) => domain_to_api(err),
        BookmarkError::Repo(err) => repo_to_api(err),
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
