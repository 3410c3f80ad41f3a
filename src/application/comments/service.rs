use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::comments::cursor::{CommentCursor, build_cursor_conditions};
use crate::application::pagination::{PaginationInput, derive_pagination};
use crate::application::repos::{CommentListQuery, CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::comments::{Comment, CommentSort, CommentStatus};
use crate::domain::error::DomainError;
use crate::domain::users::AuthUser;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentPolicy {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_body_chars: usize,
    /// New comments start as `pending` instead of `active`.
    pub require_moderation: bool,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 50,
            max_body_chars: 2000,
            require_moderation: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentListRequest {
    pub wp_post_id: i64,
    pub edition_code: Option<String>,
    pub sort: CommentSort,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsPage {
    pub comments: Vec<Comment>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub wp_post_id: i64,
    pub edition_code: Option<String>,
    pub body: String,
}

#[derive(Clone)]
pub struct CommentService {
    repo: Arc<dyn CommentsRepo>,
    policy: CommentPolicy,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentsRepo>, policy: CommentPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> CommentPolicy {
        self.policy
    }

    pub async fn list(&self, request: CommentListRequest) -> Result<CommentsPage, CommentError> {
        let sort = request.sort;
        let cursor = request.cursor.as_deref().and_then(|raw| {
            let decoded = CommentCursor::decode(raw);
            if decoded.is_none() {
                debug!(
                    target = "noa::comments",
                    cursor = raw,
                    "ignoring malformed comment cursor"
                );
            }
            decoded
        });

        let limit = request
            .limit
            .unwrap_or(self.policy.default_page_size)
            .clamp(1, self.policy.max_page_size.max(1));

        let query = CommentListQuery {
            wp_post_id: request.wp_post_id,
            edition_code: normalize_edition(request.edition_code),
            status: CommentStatus::Active,
            sort,
            cursor_conditions: build_cursor_conditions(sort, cursor.as_ref()),
            limit: limit.saturating_add(1),
        };
        let rows = self.repo.list_comments(&query).await?;

        let encoder = move |comment: &Comment| CommentCursor::after(sort, comment).encode();
        let page = derive_pagination(PaginationInput::new(1, limit, rows).with_cursor_encoder(&encoder));

        Ok(CommentsPage {
            comments: page.items,
            next_cursor: page.pagination.next_cursor,
            has_more: page.pagination.has_more,
        })
    }

    pub async fn create(&self, user: &AuthUser, input: NewComment) -> Result<Comment, CommentError> {
        if input.wp_post_id <= 0 {
            return Err(DomainError::validation("postId must be a positive integer").into());
        }
        let body = self.validated_body(&input.body)?;
        let status = if self.policy.require_moderation {
            CommentStatus::Pending
        } else {
            CommentStatus::Active
        };

        let comment = self
            .repo
            .insert_comment(CreateCommentParams {
                wp_post_id: input.wp_post_id,
                edition_code: normalize_edition(input.edition_code),
                user_id: user.id,
                body,
                status,
            })
            .await?;

        info!(
            target = "noa::comments",
            comment_id = %comment.id,
            post_id = comment.wp_post_id,
            status = %comment.status,
            "comment created"
        );
        Ok(comment)
    }

    pub async fn edit(&self, user: &AuthUser, id: Uuid, body: &str) -> Result<Comment, CommentError> {
        let existing = self.load(id).await?;
        if !existing.is_owned_by(user.id) {
            return Err(DomainError::forbidden("edit comment").into());
        }
        if existing.status == CommentStatus::Deleted {
            return Err(DomainError::conflict("deleted comments cannot be edited").into());
        }

        let body = self.validated_body(body)?;
        Ok(self.repo.update_comment_body(id, &body).await?)
    }

    /// Soft delete. Deleting an already deleted comment returns it unchanged.
    pub async fn delete(&self, user: &AuthUser, id: Uuid) -> Result<Comment, CommentError> {
        let existing = self.load(id).await?;
        if !existing.is_owned_by(user.id) && !user.role.can_moderate() {
            return Err(DomainError::forbidden("delete comment").into());
        }
        if existing.status == CommentStatus::Deleted {
            return Ok(existing);
        }

        let comment = self
            .repo
            .update_comment_status(id, CommentStatus::Deleted)
            .await?;
        info!(target = "noa::comments", comment_id = %id, user_id = %user.id, "comment deleted");
        Ok(comment)
    }

    pub async fn moderate(
        &self,
        user: &AuthUser,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, CommentError> {
        if !user.role.can_moderate() {
            return Err(DomainError::forbidden("moderate comment").into());
        }
        let existing = self.load(id).await?;
        if existing.status == status {
            return Ok(existing);
        }

        let comment = self.repo.update_comment_status(id, status).await?;
        info!(
            target = "noa::comments",
            comment_id = %id,
            moderator = %user.id,
            from = %existing.status,
            to = %status,
            "comment status changed"
        );
        Ok(comment)
    }

    async fn load(&self, id: Uuid) -> Result<Comment, CommentError> {
        self.repo
            .find_comment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment").into())
    }

    fn validated_body(&self, body: &str) -> Result<String, DomainError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("comment body must not be empty"));
        }
        if trimmed.chars().count() > self.policy.max_body_chars {
            return Err(DomainError::validation(format!(
                "comment body exceeds {} characters",
                self.policy.max_body_chars
            )));
        }
        Ok(trimmed.to_string())
    }
}

fn normalize_edition(edition: Option<String>) -> Option<String> {
    edition
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}
