use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::application::repos::{CommentListQuery, CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::comments::{Comment, CommentStatus};

use super::postgrest::{Params, PostgrestClient, or_filter};

const TABLE: &str = "comments";
const COLUMNS: &str = "id,wp_post_id,body,user_id,edition_code,status,created_at,reaction_count";

#[derive(Clone)]
pub struct SupabaseCommentsRepo {
    client: PostgrestClient,
}

impl SupabaseCommentsRepo {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct InsertComment<'a> {
    wp_post_id: i64,
    edition_code: Option<&'a str>,
    user_id: Uuid,
    body: &'a str,
    status: CommentStatus,
}

pub(crate) fn list_params(query: &CommentListQuery) -> Params {
    let mut params: Params = vec![
        ("select", COLUMNS.to_string()),
        ("wp_post_id", format!("eq.{}", query.wp_post_id)),
        ("status", format!("eq.{}", query.status.as_str())),
        ("order", query.sort.order_clause().to_string()),
        ("limit", query.limit.to_string()),
    ];
    if let Some(edition) = &query.edition_code {
        params.push(("edition_code", format!("eq.{edition}")));
    }
    if !query.cursor_conditions.is_empty() {
        params.push(("or", or_filter(&query.cursor_conditions)));
    }
    params
}

fn single(rows: Vec<Comment>) -> Result<Comment, RepoError> {
    rows.into_iter().next().ok_or(RepoError::NotFound)
}

#[async_trait]
impl CommentsRepo for SupabaseCommentsRepo {
    async fn list_comments(&self, query: &CommentListQuery) -> Result<Vec<Comment>, RepoError> {
        self.client.select(TABLE, &list_params(query)).await
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        let rows: Vec<Comment> = self
            .client
            .select(
                TABLE,
                &[
                    ("select", COLUMNS.to_string()),
                    ("id", format!("eq.{id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_comment(&self, params: CreateCommentParams) -> Result<Comment, RepoError> {
        let body = InsertComment {
            wp_post_id: params.wp_post_id,
            edition_code: params.edition_code.as_deref(),
            user_id: params.user_id,
            body: &params.body,
            status: params.status,
        };
        single(self.client.insert(TABLE, &body).await?)
    }

    async fn update_comment_body(&self, id: Uuid, body: &str) -> Result<Comment, RepoError> {
        single(
            self.client
                .update(
                    TABLE,
                    &[("id", format!("eq.{id}"))],
                    &serde_json::json!({ "body": body }),
                )
                .await?,
        )
    }

    async fn update_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError> {
        single(
            self.client
                .update(
                    TABLE,
                    &[("id", format!("eq.{id}"))],
                    &serde_json::json!({ "status": status }),
                )
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::comments::cursor::{CommentCursor, build_cursor_conditions};
    use crate::domain::comments::CommentSort;

    #[test]
    fn list_params_carry_order_and_cursor() {
        let cursor = CommentCursor::Newest {
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
            id: "abc".to_string(),
        };
        let query = CommentListQuery {
            wp_post_id: 42,
            edition_code: Some("ng".to_string()),
            status: CommentStatus::Active,
            sort: CommentSort::Newest,
            cursor_conditions: build_cursor_conditions(CommentSort::Newest, Some(&cursor)),
            limit: 21,
        };
        let params = list_params(&query);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("order").as_deref(), Some("created_at.desc,id.desc"));
        assert_eq!(get("status").as_deref(), Some("eq.active"));
        assert_eq!(get("limit").as_deref(), Some("21"));
        assert_eq!(get("edition_code").as_deref(), Some("eq.ng"));
        assert_eq!(
            get("or").as_deref(),
            Some(
                "(created_at.lt.2024-05-01T10:00:00+00:00,and(created_at.eq.2024-05-01T10:00:00+00:00,id.lt.abc))"
            )
        );
    }

    #[test]
    fn legacy_statuses_are_read_as_current_ones() {
        let row = serde_json::json!({
            "id": "9a0a7f34-2e45-4f0e-9bb4-3a9a4a58f1c1",
            "wp_post_id": 42,
            "body": "hi",
            "user_id": "0b8f7c4e-8a53-4d1f-9d0f-45d5b9f0f6aa",
            "edition_code": null,
            "status": "approved",
            "created_at": "2024-05-01T10:00:00+00:00",
            "reaction_count": null
        });
        let comment: Comment = serde_json::from_value(row).expect("comment");
        assert_eq!(comment.status, CommentStatus::Active);
    }
}
